#![doc = include_str!("../../../README.md")]

pub mod code;
pub mod compiler;
pub mod env;
pub mod error;
pub mod heap;
pub mod intern;
pub mod primitives;
pub mod reader;
pub mod value;
pub mod vm;

pub use code::{CodeIdx, Inst, Params, Program};
pub use compiler::Compiler;
pub use env::Env;
pub use error::{CompileError, CompileResult, SkeinError, VmError, VmResult};
pub use heap::{Heap, HeapId, HeapStats};
pub use intern::{SymbolId, intern, resolve};
pub use primitives::Prim;
pub use reader::{Reader, ReaderError, ReaderResult, read_all};
pub use value::Value;
pub use vm::{Stack, Vm, VmState};

/// Builds a fresh global environment with every primitive bound (§6, §10.1).
#[must_use]
pub fn new_global_env() -> Env {
    let env = Env::root();
    primitives::install(&env);
    env
}
