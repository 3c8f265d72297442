//! Fuzz target: read, compile, and execute arbitrary text.
//!
//! Exercises the full pipeline under a hard step cap. Skein's VM has no
//! built-in resource tracker (§5: reclamation/resource tuning is a
//! Non-goal), so this target calls `Vm::step` directly in a bounded loop
//! instead of `Vm::run`, which would hang forever on a fuzzer-discovered
//! infinite tail loop. Findings here indicate real safety issues: panics or
//! memory corruption, not legitimate non-termination.

#![no_main]

use libfuzzer_sys::fuzz_target;
use skein::{Compiler, Heap, Program, Vm, new_global_env, reader};

const MAX_STEPS: usize = 100_000;

fuzz_target!(|data: &[u8]| {
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };

    // Skip excessively large inputs — most parser/runtime bugs reproduce
    // with small inputs, and large ones just slow the fuzzer down.
    if code.len() > 4096 {
        return;
    }

    let mut heap = Heap::new();
    let Ok(forms) = reader::read_all(code, &mut heap) else {
        return;
    };

    let global = new_global_env();
    let mut program = Program::new();
    for form in &forms {
        let Ok(entry) = Compiler::new(&mut program, &heap, &global).compile_top_level(form) else {
            continue;
        };
        let mut vm = Vm::new(&program, entry, global.clone(), std::mem::take(&mut heap));
        for _ in 0..MAX_STEPS {
            match vm.step() {
                Ok(Some(_)) | Err(_) => break,
                Ok(None) => {}
            }
        }
        heap = std::mem::take(vm.heap_mut());
    }
});
