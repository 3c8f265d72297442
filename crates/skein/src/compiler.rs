//! Compiles S-expressions (represented as [`Value`] trees already read onto
//! the heap) into the instruction arena (§4.1 "Compilation rules").
//!
//! `compile` never looks at an environment to resolve a variable reference —
//! that's the payoff of runtime symbol lookup (§9.1 in the design notes):
//! the compiler only needs the global environment to pre-declare top-level
//! `define` targets via `Env::declare`, so forward references between
//! top-level definitions compile successfully. Tail position is exactly "the
//! instruction I'm about to jump to is the shared `Return`", checked with
//! `CodeIdx` equality rather than a separately threaded flag (§9.4).

use crate::code::{CodeIdx, Inst, Params, Program};
use crate::env::Env;
use crate::error::{CompileError, CompileResult};
use crate::heap::{Heap, HeapId};
use crate::value::Value;

pub struct Compiler<'a> {
    program: &'a mut Program,
    heap: &'a Heap,
    global: &'a Env,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub fn new(program: &'a mut Program, heap: &'a Heap, global: &'a Env) -> Self {
        Self { program, heap, global }
    }

    /// Compiles one top-level form, terminating in `Halt`.
    pub fn compile_top_level(&mut self, expr: &Value) -> CompileResult<CodeIdx> {
        let halt = self.program.halt();
        self.compile(expr, halt, true)
    }

    fn compile(&mut self, expr: &Value, next: CodeIdx, at_top_level: bool) -> CompileResult<CodeIdx> {
        match expr {
            Value::Symbol(sym) => Ok(self.program.push(Inst::Refer { var: *sym, next })),
            Value::Pair(id) => self.compile_form(*id, next, at_top_level),
            Value::Null => Err(CompileError::MalformedSyntax { form: "()", detail: "the empty list is not self-evaluating; quote it".to_string() }),
            literal => Ok(self.program.push(Inst::Constant { val: literal.clone(), next })),
        }
    }

    fn compile_form(&mut self, id: HeapId, next: CodeIdx, at_top_level: bool) -> CompileResult<CodeIdx> {
        if let Value::Symbol(op) = self.heap.car(id) {
            let name = crate::intern::resolve(op);
            match &*name {
                "quote" => return self.compile_quote(id, next),
                "if" => return self.compile_if(id, next, at_top_level),
                "lambda" => return self.compile_lambda(id, next),
                "set!" => return self.compile_set(id, next),
                "define" => return self.compile_define(id, next, at_top_level),
                "begin" => return self.compile_begin(id, next, at_top_level),
                "call/cc" | "call-with-current-continuation" => return self.compile_call_cc(id, next),
                _ => {}
            }
        }
        self.compile_application(id, next)
    }

    fn form_items(&self, id: HeapId, form: &'static str) -> CompileResult<Vec<Value>> {
        Value::Pair(id).list_to_vec(self.heap).ok_or(CompileError::MalformedSyntax { form, detail: "improper argument list".to_string() })
    }

    fn compile_quote(&mut self, id: HeapId, next: CodeIdx) -> CompileResult<CodeIdx> {
        let items = self.form_items(id, "quote")?;
        let [_, datum] = items.as_slice() else {
            return Err(CompileError::MalformedSyntax { form: "quote", detail: "expected exactly one datum".to_string() });
        };
        Ok(self.program.push(Inst::Constant { val: datum.clone(), next }))
    }

    fn compile_if(&mut self, id: HeapId, next: CodeIdx, at_top_level: bool) -> CompileResult<CodeIdx> {
        let items = self.form_items(id, "if")?;
        let (test, conseq, alt) = match items.as_slice() {
            [_, test, conseq] => (test, conseq, None),
            [_, test, conseq, alt] => (test, conseq, Some(alt)),
            _ => return Err(CompileError::MalformedSyntax { form: "if", detail: "expected (if test conseq [alt])".to_string() }),
        };
        let then_code = self.compile(conseq, next, false)?;
        let else_code = match alt {
            Some(alt) => self.compile(alt, next, false)?,
            None => self.program.push(Inst::Constant { val: Value::Unassigned, next }),
        };
        let test_next = self.program.push(Inst::Test { then_branch: then_code, else_branch: else_code });
        self.compile(test, test_next, false)
    }

    fn compile_set(&mut self, id: HeapId, next: CodeIdx) -> CompileResult<CodeIdx> {
        let items = self.form_items(id, "set!")?;
        let [_, var, expr] = items.as_slice() else {
            return Err(CompileError::MalformedSyntax { form: "set!", detail: "expected (set! var expr)".to_string() });
        };
        let Value::Symbol(sym) = var else {
            return Err(CompileError::MalformedSyntax { form: "set!", detail: "the first argument must be a symbol".to_string() });
        };
        let assign_next = self.program.push(Inst::Assign { var: *sym, next });
        self.compile(expr, assign_next, false)
    }

    /// `(define var expr)` or `(define (name . params) body...)` (§4.1 rule
    /// 7, §10.3's supplemented procedure-definition sugar).
    fn compile_define(&mut self, id: HeapId, next: CodeIdx, at_top_level: bool) -> CompileResult<CodeIdx> {
        if !at_top_level {
            return Err(CompileError::DefineNotAtTopLevel);
        }
        let items = self.form_items(id, "define")?;
        let [_, target, rest @ ..] = items.as_slice() else {
            return Err(CompileError::MalformedSyntax { form: "define", detail: "expected (define var expr) or (define (name . params) body...)".to_string() });
        };
        let (sym, value_expr) = match target {
            Value::Symbol(sym) => {
                let [value_expr] = rest else {
                    return Err(CompileError::MalformedSyntax { form: "define", detail: "expected exactly one initializer expression".to_string() });
                };
                (*sym, value_expr.clone())
            }
            Value::Pair(head_id) => {
                let Value::Symbol(sym) = self.heap.car(*head_id) else {
                    return Err(CompileError::MalformedSyntax { form: "define", detail: "procedure name must be a symbol".to_string() });
                };
                let params_spec = self.heap.cdr(*head_id);
                if rest.is_empty() {
                    return Err(CompileError::MalformedSyntax { form: "define", detail: "procedure body must not be empty".to_string() });
                }
                self.global.declare(sym);
                let assign_next = self.program.push(Inst::Assign { var: sym, next });
                let code = self.compile_lambda_from_parts(&params_spec, rest, assign_next)?;
                return Ok(code);
            }
            _ => return Err(CompileError::MalformedSyntax { form: "define", detail: "expected a symbol or (name . params)".to_string() }),
        };
        self.global.declare(sym);
        let assign_next = self.program.push(Inst::Assign { var: sym, next });
        self.compile(&value_expr, assign_next, false)
    }

    fn compile_begin(&mut self, id: HeapId, next: CodeIdx, at_top_level: bool) -> CompileResult<CodeIdx> {
        let items = self.form_items(id, "begin")?;
        let body = &items[1..];
        if body.is_empty() {
            return Err(CompileError::MalformedSyntax { form: "begin", detail: "expected at least one expression".to_string() });
        }
        self.compile_sequence(body, next, at_top_level)
    }

    fn compile_sequence(&mut self, exprs: &[Value], next: CodeIdx, at_top_level: bool) -> CompileResult<CodeIdx> {
        let (last, init) = exprs.split_last().expect("compile_sequence is never called with an empty body");
        let mut code = self.compile(last, next, at_top_level)?;
        for expr in init.iter().rev() {
            code = self.compile(expr, code, at_top_level)?;
        }
        Ok(code)
    }

    fn compile_lambda(&mut self, id: HeapId, next: CodeIdx) -> CompileResult<CodeIdx> {
        let items = self.form_items(id, "lambda")?;
        let [_, params_spec, body @ ..] = items.as_slice() else {
            return Err(CompileError::MalformedSyntax { form: "lambda", detail: "expected (lambda params body...)".to_string() });
        };
        if body.is_empty() {
            return Err(CompileError::MalformedSyntax { form: "lambda", detail: "body must not be empty".to_string() });
        }
        self.compile_lambda_from_parts(params_spec, body, next)
    }

    /// Shared by `lambda` and `(define (name . params) body...)` sugar
    /// (§10.3): both just need a `Close` over a freshly compiled body.
    fn compile_lambda_from_parts(&mut self, params_spec: &Value, body: &[Value], next: CodeIdx) -> CompileResult<CodeIdx> {
        if body.is_empty() {
            return Err(CompileError::MalformedSyntax { form: "lambda", detail: "body must not be empty".to_string() });
        }
        let params = parse_params(params_spec, self.heap)?;
        let ret = self.program.ret();
        let body_code = self.compile_sequence(body, ret, false)?;
        Ok(self.program.push(Inst::Close { params, body: body_code, next }))
    }

    fn compile_application(&mut self, id: HeapId, next: CodeIdx) -> CompileResult<CodeIdx> {
        let items = self.form_items(id, "application")?;
        let Some((func, args)) = items.split_first() else {
            return Err(CompileError::MalformedSyntax { form: "application", detail: "expected at least an operator".to_string() });
        };
        let apply = self.program.apply();
        let mut code = self.compile(func, apply, false)?;
        for arg in args.iter().rev() {
            let argument_idx = self.program.push(Inst::Argument { next: code });
            code = self.compile(arg, argument_idx, false)?;
        }
        if next == self.program.ret() {
            Ok(code)
        } else {
            Ok(self.program.push(Inst::Frame { ret: next, next: code }))
        }
    }

    /// `(call/cc f)` (§4.1 rule 8): reifies the stack with `Conti`, pushes
    /// it as `f`'s sole argument, then evaluates and applies `f` exactly
    /// like a one-argument application — `Conti` stands in for the
    /// "evaluate this argument expression" step a normal argument would use.
    fn compile_call_cc(&mut self, id: HeapId, next: CodeIdx) -> CompileResult<CodeIdx> {
        let items = self.form_items(id, "call/cc")?;
        let [_, func] = items.as_slice() else {
            return Err(CompileError::MalformedSyntax { form: "call/cc", detail: "expected exactly one procedure argument".to_string() });
        };
        let apply = self.program.apply();
        let func_code = self.compile(func, apply, false)?;
        let argument_idx = self.program.push(Inst::Argument { next: func_code });
        let conti_idx = self.program.push(Inst::Conti { next: argument_idx });
        if next == self.program.ret() {
            Ok(conti_idx)
        } else {
            Ok(self.program.push(Inst::Frame { ret: next, next: conti_idx }))
        }
    }
}

/// Parses a `lambda` parameter spec (§4.1 rule 4, §10.3 variadic sugar):
/// a proper list of symbols, a dotted list ending in a rest symbol, or a
/// bare symbol standing for "bind everything to this one name".
fn parse_params(spec: &Value, heap: &Heap) -> CompileResult<Params> {
    match spec {
        Value::Null => Ok(Params { fixed: Vec::new(), rest: None }),
        Value::Symbol(sym) => Ok(Params { fixed: Vec::new(), rest: Some(*sym) }),
        Value::Pair(_) => {
            let mut fixed = Vec::new();
            let mut cur = spec.clone();
            loop {
                match cur {
                    Value::Null => return Ok(Params { fixed, rest: None }),
                    Value::Symbol(sym) => return Ok(Params { fixed, rest: Some(sym) }),
                    Value::Pair(id) => {
                        let Value::Symbol(sym) = heap.car(id) else {
                            return Err(CompileError::MalformedSyntax { form: "lambda", detail: "parameter names must be symbols".to_string() });
                        };
                        fixed.push(sym);
                        cur = heap.cdr(id);
                    }
                    _ => return Err(CompileError::MalformedSyntax { form: "lambda", detail: "malformed parameter list".to_string() }),
                }
            }
        }
        _ => Err(CompileError::MalformedSyntax { form: "lambda", detail: "parameter spec must be a symbol, list, or dotted list".to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::intern;
    use crate::vm::Vm;

    fn eval(src_expr: Value, heap: Heap) -> Value {
        let mut program = Program::new();
        let global = Env::root();
        crate::primitives::install(&global);
        let entry = Compiler::new(&mut program, &heap, &global).compile_top_level(&src_expr).unwrap();
        let mut vm = Vm::new(&program, entry, global, heap);
        vm.run().unwrap()
    }

    #[test]
    fn self_evaluating_literal() {
        assert_eq!(eval(Value::Int(42), Heap::new()), Value::Int(42));
    }

    #[test]
    fn quote_returns_the_datum_unevaluated() {
        let mut heap = Heap::new();
        let sym = intern("skein-compiler-test-x");
        let datum = Value::Symbol(sym);
        let quote_sym = Value::Symbol(intern("quote"));
        let inner = Value::Pair(heap.alloc_pair(datum.clone(), Value::Null));
        let form = Value::Pair(heap.alloc_pair(quote_sym, inner));
        assert_eq!(eval(form, heap), datum);
    }

    #[test]
    fn quote_returns_a_heap_allocated_list_unevaluated() {
        // A quoted compound datum must survive the trip through `Constant`
        // and still resolve against the *same* heap at runtime: a regression
        // test for constructing the VM against a fresh, disconnected heap.
        let mut program = Program::new();
        let global = Env::root();
        crate::primitives::install(&global);
        let mut heap = Heap::new();
        let list_form = list(&mut heap, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let quote_sym = Value::Symbol(intern("quote"));
        let inner = Value::Pair(heap.alloc_pair(list_form, Value::Null));
        let form = Value::Pair(heap.alloc_pair(quote_sym, inner));
        let entry = Compiler::new(&mut program, &heap, &global).compile_top_level(&form).unwrap();
        let mut vm = Vm::new(&program, entry, global, heap);
        let result = vm.run().unwrap();
        let Value::Pair(id) = result else { panic!("expected a pair") };
        assert_eq!(vm.heap().car(id), Value::Int(1));
        let Value::Pair(tail) = vm.heap().cdr(id) else { panic!("expected a pair") };
        assert_eq!(vm.heap().car(tail), Value::Int(2));
    }

    #[test]
    fn if_picks_the_right_branch() {
        let mut heap = Heap::new();
        let form = list(&mut heap, vec![sym("if"), Value::Bool(true), Value::Int(1), Value::Int(2)]);
        assert_eq!(eval(form, heap), Value::Int(1));
    }

    #[test]
    fn define_then_reference_at_top_level() {
        let mut program = Program::new();
        let global = Env::root();
        crate::primitives::install(&global);
        let mut heap = Heap::new();

        let define_form = list(&mut heap, vec![sym("define"), sym("skein-compiler-test-answer"), Value::Int(99)]);
        let entry1 = Compiler::new(&mut program, &heap, &global).compile_top_level(&define_form).unwrap();
        let mut vm = Vm::new(&program, entry1, global.clone(), heap);
        vm.run().unwrap();

        let ref_form = sym("skein-compiler-test-answer");
        let entry2 = Compiler::new(&mut program, vm.heap(), &global).compile_top_level(&ref_form).unwrap();
        vm.restart_at(entry2, global);
        assert_eq!(vm.run(), Ok(Value::Int(99)));
    }

    #[test]
    fn define_outside_top_level_is_rejected() {
        let mut program = Program::new();
        let global = Env::root();
        let mut heap = Heap::new();
        let inner_define = list(&mut heap, vec![sym("define"), sym("skein-compiler-test-nested"), Value::Int(1)]);
        let lambda_body = vec![inner_define];
        let mut lambda_items = vec![sym("lambda"), Value::Null];
        lambda_items.extend(lambda_body);
        let lambda_form = list(&mut heap, lambda_items);
        let result = Compiler::new(&mut program, &heap, &global).compile_top_level(&lambda_form);
        assert_eq!(result, Err(CompileError::DefineNotAtTopLevel));
    }

    #[test]
    fn application_calls_a_lambda() {
        let mut heap = Heap::new();
        let lambda_form = list(&mut heap, vec![sym("lambda"), list(&mut heap, vec![sym("skein-compiler-test-n")]), sym("skein-compiler-test-n")]);
        let call_form = list(&mut heap, vec![lambda_form, Value::Int(5)]);
        assert_eq!(eval(call_form, heap), Value::Int(5));
    }

    fn sym(name: &str) -> Value {
        Value::Symbol(intern(name))
    }

    fn list(heap: &mut Heap, items: Vec<Value>) -> Value {
        Value::vec_to_list(heap, items)
    }
}
