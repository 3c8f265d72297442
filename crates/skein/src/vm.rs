//! The register virtual machine (§4.3 "Virtual machine semantics").
//!
//! Five registers: `a` (accumulator), `x` (the next instruction to run),
//! `e` (the current environment), `r` (the argument rib under construction),
//! `s` (the call stack). [`Vm::step`] executes exactly one instruction and
//! is the whole interpreter; [`Vm::run`] just calls it in a loop until
//! `Halt`. Keeping `step` separate from `run` is what lets a REPL single-step
//! a program for debugging, or a test assert on `stack_depth()` mid-run
//! without needing a breakpoint mechanism.

use smallvec::SmallVec;

use crate::code::{CodeIdx, Inst, Program};
use crate::env::Env;
use crate::error::{VmError, VmResult};
use crate::heap::{ClosureData, Heap};
use crate::value::Value;

/// Most Skein calls pass a handful of arguments; `SmallVec` keeps that
/// common case off the heap while still falling back to one for the rare
/// wide call (§10.1's "reference to a native function taking a cell list").
type Args = SmallVec<[Value; 4]>;

/// The call stack, as a persistent linked list of frames (§4.3, §9.1).
///
/// Represented as an `Rc` chain rather than a `Vec` because `call/cc`
/// reifies an arbitrary stack *snapshot* as a value (§4.1 rule 8): applying
/// a continuation later must restore exactly that snapshot without
/// disturbing whatever the stack looks like at the time it's invoked, which
/// a shared, immutable chain gives for free and a mutable `Vec` would not.
#[derive(Debug, Clone)]
pub struct Stack(Option<std::rc::Rc<StackFrame>>);

#[derive(Debug)]
struct StackFrame {
    ret: CodeIdx,
    env: Env,
    rib: Value,
    parent: Stack,
}

impl Stack {
    #[must_use]
    pub fn empty() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn push(&self, ret: CodeIdx, env: Env, rib: Value) -> Self {
        Self(Some(std::rc::Rc::new(StackFrame { ret, env, rib, parent: self.clone() })))
    }

    /// Pops the top frame, returning its fields and the remaining stack.
    #[must_use]
    pub fn pop(&self) -> Option<(CodeIdx, Env, Value, Stack)> {
        self.0.as_ref().map(|frame| (frame.ret, frame.env.clone(), frame.rib.clone(), frame.parent.clone()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Number of frames currently pushed — used by tests to assert that
    /// tail calls run in bounded stack space (§4.1 "Tail calls", §8 scenario
    /// on unbounded tail recursion).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut n = 0;
        let mut cur = self.clone();
        while let Some(frame) = cur.0 {
            n += 1;
            cur = frame.parent.clone();
        }
        n
    }
}

/// Conses `val` onto the front of a proper list stored as a `Value`,
/// allocating the new pair on `heap`.
fn cons(heap: &mut Heap, val: Value, rest: Value) -> Value {
    Value::Pair(heap.alloc_pair(val, rest))
}

/// Collects a rib (built by repeated `Argument` instructions) into argument
/// order. The compiler threads arguments through `Argument` right-to-left
/// (§9.2 in the design notes), so the rib holds them reversed; this is the
/// one place that un-reverses it, so every other part of the VM can treat
/// `r` as "this closure's arguments, in source order".
fn rib_to_args(heap: &Heap, rib: &Value) -> Args {
    let mut reversed = Args::new();
    let mut cur = rib.clone();
    while let Value::Pair(id) = cur {
        reversed.push(heap.car(id));
        cur = heap.cdr(id);
    }
    reversed.reverse();
    reversed
}

fn bind_params(params: &crate::code::Params, args: Args, heap: &mut Heap) -> VmResult<Vec<(crate::intern::SymbolId, Value)>> {
    if params.rest.is_none() && args.len() != params.fixed.len() {
        return Err(VmError::ArityMismatch { expected: params.arity_description(), got: args.len() });
    }
    if params.rest.is_some() && args.len() < params.fixed.len() {
        return Err(VmError::ArityMismatch { expected: params.arity_description(), got: args.len() });
    }
    let mut args = args.into_vec();
    let rest_args = args.split_off(params.fixed.len());
    let mut bindings: Vec<_> = params.fixed.iter().copied().zip(args).collect();
    if let Some(rest_sym) = params.rest {
        bindings.push((rest_sym, Value::vec_to_list(heap, rest_args)));
    }
    Ok(bindings)
}

/// The virtual machine's execution state, primarily useful for a REPL
/// deciding whether it's safe to call `run` again (§4.3 "VM states").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    Running,
    Halted,
}

/// A heap-allocated register machine executing compiled [`Program`] code.
pub struct Vm<'p> {
    program: &'p Program,
    heap: Heap,
    a: Value,
    x: CodeIdx,
    e: Env,
    r: Value,
    s: Stack,
    state: VmState,
}

impl<'p> Vm<'p> {
    /// Builds a VM over `heap`, taking ownership of it. `heap` must be the
    /// same arena the reader and compiler built `program`'s constants
    /// against (§1): any `Constant` holding a `Pair`/`Vector`/`Closure`
    /// embeds a `HeapId` into a *specific* arena, and indexing that id into
    /// a different `Heap` would read garbage or panic. A fresh `Heap::new()`
    /// here is only correct for programs compiled with no constants backed
    /// by heap data (no quoted pairs, no vector literals).
    #[must_use]
    pub fn new(program: &'p Program, entry: CodeIdx, global_env: Env, heap: Heap) -> Self {
        Self { program, heap, a: Value::Null, x: entry, e: global_env, r: Value::Null, s: Stack::empty(), state: VmState::Ready }
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable access to the VM's heap, so a REPL can keep reading further
    /// top-level forms into the same arena this VM is already running
    /// against (§6).
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    #[must_use]
    pub fn state(&self) -> VmState {
        self.state
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.s.depth()
    }

    /// Re-points the VM at `entry`, keeping its heap and global bindings —
    /// how a REPL runs the next top-level form against the same session.
    pub fn restart_at(&mut self, entry: CodeIdx, env: Env) {
        self.x = entry;
        self.e = env;
        self.r = Value::Null;
        self.s = Stack::empty();
        self.a = Value::Null;
        self.state = VmState::Ready;
    }

    /// Runs until `Halt` or a failing instruction, returning the final
    /// accumulator value.
    pub fn run(&mut self) -> VmResult<Value> {
        self.state = VmState::Running;
        loop {
            if let Some(result) = self.step()? {
                self.state = VmState::Halted;
                return Ok(result);
            }
        }
    }

    /// Executes exactly one instruction. `Ok(Some(value))` means `Halt` was
    /// reached with `value` in the accumulator; `Ok(None)` means keep
    /// stepping.
    pub fn step(&mut self) -> VmResult<Option<Value>> {
        match self.program.get(self.x).clone() {
            Inst::Halt => return Ok(Some(self.a.clone())),
            Inst::Refer { var, next } => {
                self.a = self.e.lookup(var)?;
                self.x = next;
            }
            Inst::Constant { val, next } => {
                self.a = val;
                self.x = next;
            }
            Inst::Close { params, body, next } => {
                let id = self.heap.alloc_closure(ClosureData { params, body, env: self.e.clone(), captured_stack: None });
                self.a = Value::Closure(id);
                self.x = next;
            }
            Inst::Test { then_branch, else_branch } => {
                self.x = if self.a.is_truthy() { then_branch } else { else_branch };
            }
            Inst::Assign { var, next } => {
                self.e.assign(var, self.a.clone())?;
                self.x = next;
            }
            Inst::Conti { next } => {
                let id = self.heap.alloc_closure(ClosureData {
                    params: crate::code::Params { fixed: vec![self.program.nuate_var()], rest: None },
                    body: self.program.nuate(),
                    env: Env::root(),
                    captured_stack: Some(self.s.clone()),
                });
                self.a = Value::Closure(id);
                self.x = next;
            }
            Inst::Nuate { var } => {
                self.a = self.e.lookup(var)?;
                self.x = self.program.ret();
            }
            Inst::Frame { ret, next } => {
                self.s = self.s.push(ret, self.e.clone(), self.r.clone());
                self.r = Value::Null;
                self.x = next;
            }
            Inst::Argument { next } => {
                self.r = cons(&mut self.heap, self.a.clone(), self.r.clone());
                self.x = next;
            }
            Inst::Apply => self.apply()?,
            Inst::Return => {
                let (x, e, r, s) = self.s.pop().ok_or_else(|| {
                    VmError::TypeError("return with an empty call stack".to_string())
                })?;
                self.x = x;
                self.e = e;
                self.r = r;
                self.s = s;
            }
        }
        Ok(None)
    }

    fn apply(&mut self) -> VmResult<()> {
        match self.a.clone() {
            Value::Closure(id) => {
                let data = self.heap.closure(id).clone();
                let args = rib_to_args(&self.heap, &self.r);
                let bindings = bind_params(&data.params, args, &mut self.heap)?;
                self.e = data.env.extend(bindings);
                self.x = data.body;
                self.r = Value::Null;
                if let Some(saved_stack) = data.captured_stack {
                    self.s = saved_stack;
                }
                Ok(())
            }
            Value::Primitive(prim) => {
                let args = rib_to_args(&self.heap, &self.r);
                self.a = prim.call(&mut self.heap, &args)?;
                self.r = Value::Null;
                self.x = self.program.ret();
                Ok(())
            }
            other => Err(VmError::NotApplicable(other)),
        }
    }
}
