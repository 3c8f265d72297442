//! Error types for the reader, the compiler, and the virtual machine.
//!
//! Mirrors the error taxonomy of §7: the reader, compiler, and VM each own
//! their own error enum ([`crate::reader::ReaderError`], [`CompileError`],
//! [`VmError`]); [`SkeinError`] unifies the three the way the grounding
//! corpus's own REPL error type unifies parse/compile/runtime failures
//! (§10.2), so a driver that reads, compiles, and runs in one call can
//! return a single error type without losing which stage failed. Nothing
//! here panics in non-test code; every fallible operation returns a
//! `Result` all the way out to the caller.

use std::fmt;

use crate::intern::SymbolId;
use crate::reader::ReaderError;
use crate::value::Value;

/// Result alias for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Result alias for VM execution.
pub type VmResult<T> = Result<T, VmError>;

/// Errors the compiler can raise (§4.1 "Errors", §7).
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A special form was used with the wrong shape (e.g. `(if a b)`, `(lambda x)`
    /// with a malformed parameter list, or an application whose argument list is
    /// improper).
    MalformedSyntax { form: &'static str, detail: String },
    /// `define` appeared somewhere other than the top level (§4.1 rule 7, §10.3).
    DefineNotAtTopLevel,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedSyntax { form, detail } => write!(f, "malformed {form}: {detail}"),
            Self::DefineNotAtTopLevel => write!(f, "define used outside the top level"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Errors the VM can raise while stepping (§4.3 "Failure semantics", §7).
///
/// Every variant carries enough to let a REPL print something useful; none of
/// them carry the full VM snapshot (§4.3 says the snapshot is "available to the
/// caller" — here that's simply the fact that `Vm::run` returns the error instead
/// of unwinding, leaving the VM's registers exactly as they were at the failing
/// step for the caller to inspect if it wants to).
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// `refer`/`assign` found no binding for this symbol in any enclosing frame.
    UnboundVariable(SymbolId),
    /// `apply` found a value in `a` that is neither a closure nor a primitive.
    NotApplicable(Value),
    /// A primitive rejected one of its operands.
    TypeError(String),
    /// A closure (or continuation) was applied to the wrong number of arguments.
    ArityMismatch { expected: String, got: usize },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundVariable(sym) => write!(f, "unbound variable: {}", crate::intern::resolve(*sym)),
            Self::NotApplicable(val) => write!(f, "not applicable: {val}"),
            Self::TypeError(msg) => write!(f, "type error: {msg}"),
            Self::ArityMismatch { expected, got } => {
                write!(f, "arity mismatch: expected {expected} argument(s), got {got}")
            }
        }
    }
}

impl std::error::Error for VmError {}

/// A single error type spanning every pipeline stage (§7), for callers (a
/// REPL, a test helper) that read, compile, and run in one step and want one
/// `Result` to match on.
#[derive(Debug, Clone, PartialEq)]
pub enum SkeinError {
    Read(ReaderError),
    Compile(CompileError),
    Run(VmError),
}

impl fmt::Display for SkeinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(err) => write!(f, "{err}"),
            Self::Compile(err) => write!(f, "{err}"),
            Self::Run(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SkeinError {}

impl From<ReaderError> for SkeinError {
    fn from(err: ReaderError) -> Self {
        Self::Read(err)
    }
}

impl From<CompileError> for SkeinError {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

impl From<VmError> for SkeinError {
    fn from(err: VmError) -> Self {
        Self::Run(err)
    }
}
