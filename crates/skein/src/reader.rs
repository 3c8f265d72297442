//! The S-expression reader (§6 "Reader contract").
//!
//! The core spec treats the reader as an external collaborator with a narrow
//! contract: text in, a sequence of [`Value`] trees out. It is kept in this
//! crate rather than the REPL binary (unlike the doc comment on
//! [`crate::error`] once suggested) so that both the REPL and the fuzz/bench
//! harnesses can drive "parse arbitrary text" without depending on a binary
//! crate — mirroring how the grounding corpus keeps its own source-parsing
//! integration inside its core library crate rather than its CLI.
//!
//! [`Reader::read`] consumes one form at a time from a cursor over the
//! source text, so a REPL can read several complete forms out of one buffer
//! and learn precisely how much of the buffer is still a dangling partial
//! form (§6 "switches to a continuation prompt").

use std::fmt;

use crate::heap::Heap;
use crate::intern::intern;
use crate::value::Value;

/// Errors the reader can raise (§6, §7): `Unclosed` for EOF inside an open
/// `(`/`"`, `Syntax` for anything else malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// EOF was reached before a closing `)` or `"` was found. A REPL uses
    /// this specifically to decide whether to keep reading more input
    /// instead of reporting a hard failure (§6).
    Unclosed { offset: usize },
    /// Any other malformed token or form, with a byte offset into the
    /// source for diagnostics.
    Syntax { offset: usize, message: String },
}

pub type ReaderResult<T> = Result<T, ReaderError>;

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclosed { offset } => write!(f, "unexpected end of input at offset {offset}"),
            Self::Syntax { offset, message } => write!(f, "syntax error at offset {offset}: {message}"),
        }
    }
}

impl std::error::Error for ReaderError {}

/// A cursor over source text that reads one [`Value`] form at a time.
pub struct Reader<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Reader<'s> {
    #[must_use]
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    /// Byte offset of the first byte not yet consumed. After a clean `Ok(None)`
    /// this is the length of the source (modulo trailing whitespace/comments);
    /// after an `Unclosed` error it marks where the dangling form began, which
    /// a REPL can use to keep the unconsumed suffix for the next prompt.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_atmosphere(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(c) = self.peek() {
                        self.bump();
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Reads the next complete form, or `Ok(None)` if only whitespace and
    /// comments remain.
    pub fn read(&mut self, heap: &mut Heap) -> ReaderResult<Option<Value>> {
        self.skip_atmosphere();
        if self.peek().is_none() {
            return Ok(None);
        }
        self.read_form(heap).map(Some)
    }

    fn read_form(&mut self, heap: &mut Heap) -> ReaderResult<Value> {
        self.skip_atmosphere();
        let start = self.pos;
        match self.peek() {
            None => Err(ReaderError::Unclosed { offset: start }),
            Some('(') => {
                self.bump();
                self.read_list(heap, ')')
            }
            Some(')') | Some(']') => Err(ReaderError::Syntax { offset: start, message: "unexpected close paren".to_string() }),
            Some('#') if self.peek2() == Some('(') => {
                self.bump();
                self.bump();
                self.read_vector(heap)
            }
            Some('#') => self.read_hash(start),
            Some('"') => self.read_string(start),
            Some('\'') => {
                self.bump();
                self.read_abbreviation(heap, "quote")
            }
            Some('`') => {
                self.bump();
                self.read_abbreviation(heap, "quasiquote")
            }
            Some(',') if self.peek2() == Some('@') => {
                self.bump();
                self.bump();
                self.read_abbreviation(heap, "unquote-splicing")
            }
            Some(',') => {
                self.bump();
                self.read_abbreviation(heap, "unquote")
            }
            Some(_) => self.read_atom(start),
        }
    }

    fn read_abbreviation(&mut self, heap: &mut Heap, tag: &str) -> ReaderResult<Value> {
        let datum = self.read_form(heap)?;
        let inner = Value::Pair(heap.alloc_pair(datum, Value::Null));
        Ok(Value::Pair(heap.alloc_pair(Value::Symbol(intern(tag)), inner)))
    }

    /// Reads the elements of `(...)` up to (and consuming) the matching `)`,
    /// including proper support for a dotted tail `(a b . c)`.
    fn read_list(&mut self, heap: &mut Heap, close: char) -> ReaderResult<Value> {
        let mut items = Vec::new();
        let mut tail = Value::Null;
        loop {
            self.skip_atmosphere();
            match self.peek() {
                None => return Err(ReaderError::Unclosed { offset: self.pos }),
                Some(c) if c == close => {
                    self.bump();
                    break;
                }
                Some('.') if self.is_dot_separator() => {
                    self.bump();
                    tail = self.read_form(heap)?;
                    self.skip_atmosphere();
                    match self.peek() {
                        Some(c) if c == close => {
                            self.bump();
                        }
                        None => return Err(ReaderError::Unclosed { offset: self.pos }),
                        Some(_) => {
                            return Err(ReaderError::Syntax { offset: self.pos, message: "expected one close paren after dotted tail".to_string() });
                        }
                    }
                    break;
                }
                Some(_) => items.push(self.read_form(heap)?),
            }
        }
        let mut list = tail;
        for item in items.into_iter().rev() {
            list = Value::Pair(heap.alloc_pair(item, list));
        }
        Ok(list)
    }

    /// A `.` only introduces a dotted tail when it stands alone as a token
    /// (followed by whitespace/paren/EOF); `.5` and `...` are symbols/numbers.
    fn is_dot_separator(&self) -> bool {
        match self.peek2() {
            None => true,
            Some(c) => c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']'),
        }
    }

    fn read_vector(&mut self, heap: &mut Heap) -> ReaderResult<Value> {
        let list = self.read_list(heap, ')')?;
        let items = list.list_to_vec(heap).ok_or_else(|| ReaderError::Syntax { offset: self.pos, message: "improper list inside #(...)".to_string() })?;
        Ok(Value::Vector(heap.alloc_vector(items)))
    }

    fn read_hash(&mut self, start: usize) -> ReaderResult<Value> {
        self.bump(); // '#'
        match self.peek() {
            Some('t') => {
                self.consume_token();
                Ok(Value::Bool(true))
            }
            Some('f') => {
                self.consume_token();
                Ok(Value::Bool(false))
            }
            Some('\\') => {
                self.bump();
                self.read_char_literal(start)
            }
            _ => Err(ReaderError::Syntax { offset: start, message: "unsupported # syntax".to_string() }),
        }
    }

    fn read_char_literal(&mut self, start: usize) -> ReaderResult<Value> {
        let Some(first) = self.bump() else {
            return Err(ReaderError::Unclosed { offset: start });
        };
        // A lone letter followed by another token char means a named character
        // (#\newline, #\space, #\tab); otherwise it's that one literal char.
        if first.is_alphabetic() && self.peek().is_some_and(is_symbol_continue) {
            let mut name = String::from(first);
            while self.peek().is_some_and(is_symbol_continue) {
                name.push(self.bump().expect("peek confirmed a char is present"));
            }
            match name.as_str() {
                "newline" => Ok(Value::Char('\n')),
                "space" => Ok(Value::Char(' ')),
                "tab" => Ok(Value::Char('\t')),
                "nul" | "null" => Ok(Value::Char('\0')),
                other => Err(ReaderError::Syntax { offset: start, message: format!("unknown character name: {other}") }),
            }
        } else {
            Ok(Value::Char(first))
        }
    }

    fn read_string(&mut self, start: usize) -> ReaderResult<Value> {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(ReaderError::Unclosed { offset: start }),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    None => return Err(ReaderError::Unclosed { offset: start }),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(c @ ('"' | '\\')) => text.push(c),
                    Some(other) => text.push(other),
                },
                Some(c) => text.push(c),
            }
        }
        Ok(Value::Str(text.into()))
    }

    fn consume_token(&mut self) {
        while self.peek().is_some_and(is_symbol_continue) {
            self.bump();
        }
    }

    fn read_atom(&mut self, start: usize) -> ReaderResult<Value> {
        while self.peek().is_some_and(is_symbol_continue) {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        Ok(parse_atom(text))
    }
}

/// `subsequent adds digits and +-.@` on top of the identifier-initial set
/// (§6): used both to extend an identifier and to find where a bare token
/// (including a numeric literal) ends.
fn is_symbol_continue(c: char) -> bool {
    c.is_alphanumeric() || "!$%&*/:<=>?^_~+-.@".contains(c)
}

/// Classifies a bare token as a boolean-like keyword (handled earlier), an
/// integer, a float, or — falling through — a symbol (§6).
fn parse_atom(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        return Value::Int(n);
    }
    if looks_like_float(text) {
        if let Ok(x) = text.parse::<f64>() {
            return Value::Float(x);
        }
    }
    Value::Symbol(intern(text))
}

/// A float token is digits, an optional sign, and a required `.` (§6
/// "floating-point (digits `.` digits)"); this keeps `...` and `-` themselves
/// classified as symbols instead of failing to parse as numbers silently.
fn looks_like_float(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    body.contains('.') && body.chars().all(|c| c.is_ascii_digit() || c == '.') && body.chars().any(|c| c.is_ascii_digit())
}

/// Reads every complete top-level form in `src`. Convenience for tests and
/// batch-mode execution, where there is no notion of a dangling suffix to
/// preserve across prompts (§10.4).
pub fn read_all(src: &str, heap: &mut Heap) -> ReaderResult<Vec<Value>> {
    let mut reader = Reader::new(src);
    let mut forms = Vec::new();
    while let Some(form) = reader.read(heap)? {
        forms.push(form);
    }
    Ok(forms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(src: &str) -> Value {
        let mut heap = Heap::new();
        let forms = read_all(src, &mut heap).unwrap();
        assert_eq!(forms.len(), 1, "expected exactly one form in {src:?}");
        forms.into_iter().next().unwrap()
    }

    #[test]
    fn reads_self_evaluating_atoms() {
        assert_eq!(read_one("42"), Value::Int(42));
        assert_eq!(read_one("-17"), Value::Int(-17));
        assert_eq!(read_one("2.5"), Value::Float(2.5));
        assert_eq!(read_one("#t"), Value::Bool(true));
        assert_eq!(read_one("#f"), Value::Bool(false));
    }

    #[test]
    fn reads_a_string_with_escapes() {
        let mut heap = Heap::new();
        let forms = read_all(r#""hi\n\"there\"""#, &mut heap).unwrap();
        assert_eq!(forms, vec![Value::Str("hi\n\"there\"".into())]);
    }

    #[test]
    fn reads_a_proper_list() {
        let mut heap = Heap::new();
        let forms = read_all("(+ 1 2)", &mut heap).unwrap();
        let items = forms[0].list_to_vec(&heap).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], Value::Int(1));
        assert_eq!(items[2], Value::Int(2));
    }

    #[test]
    fn reads_a_dotted_pair() {
        let mut heap = Heap::new();
        let forms = read_all("(1 . 2)", &mut heap).unwrap();
        match forms[0] {
            Value::Pair(id) => {
                assert_eq!(heap.car(id), Value::Int(1));
                assert_eq!(heap.cdr(id), Value::Int(2));
            }
            _ => panic!("expected a pair"),
        }
    }

    #[test]
    fn reads_a_vector() {
        let mut heap = Heap::new();
        let forms = read_all("#(1 2 3)", &mut heap).unwrap();
        match forms[0] {
            Value::Vector(id) => assert_eq!(heap.vector_to_vec(id), vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            _ => panic!("expected a vector"),
        }
    }

    #[test]
    fn reads_named_characters() {
        assert_eq!(read_one("#\\a"), Value::Char('a'));
        assert_eq!(read_one("#\\newline"), Value::Char('\n'));
        assert_eq!(read_one("#\\space"), Value::Char(' '));
    }

    #[test]
    fn quote_abbreviation_expands_to_a_tagged_list() {
        let mut heap = Heap::new();
        let forms = read_all("'x", &mut heap).unwrap();
        let items = forms[0].list_to_vec(&heap).unwrap();
        assert_eq!(items[0], Value::Symbol(intern("quote")));
        assert_eq!(items[1], Value::Symbol(intern("x")));
    }

    #[test]
    fn quasiquote_and_unquote_splicing_expand() {
        let mut heap = Heap::new();
        let forms = read_all("`(a ,b ,@c)", &mut heap).unwrap();
        let items = forms[0].list_to_vec(&heap).unwrap();
        assert_eq!(items[0], Value::Symbol(intern("quasiquote")));
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let mut heap = Heap::new();
        let forms = read_all("1 ; this is a comment\n2", &mut heap).unwrap();
        assert_eq!(forms, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn unterminated_string_is_unclosed() {
        let mut heap = Heap::new();
        assert!(matches!(read_all("\"abc", &mut heap), Err(ReaderError::Unclosed { .. })));
    }

    #[test]
    fn unterminated_list_is_unclosed() {
        let mut heap = Heap::new();
        assert!(matches!(read_all("(+ 1 2", &mut heap), Err(ReaderError::Unclosed { .. })));
    }

    #[test]
    fn stray_close_paren_is_a_syntax_error() {
        let mut heap = Heap::new();
        assert!(matches!(read_all(")", &mut heap), Err(ReaderError::Syntax { .. })));
    }

    #[test]
    fn multiple_top_level_forms_are_all_read() {
        let mut heap = Heap::new();
        let forms = read_all("1 2 3", &mut heap).unwrap();
        assert_eq!(forms, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }
}
