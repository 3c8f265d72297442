//! Fuzz target: read and compile arbitrary text (no execution).
//!
//! Exercises only the reader and the compiler, skipping the VM. Runs much
//! faster than `fuzz_parse_run` and is effective for finding panics in the
//! reader's token scanning and the compiler's special-form handling.
//!
//! A crash here indicates a bug in read/compile — these should never panic
//! regardless of input, only return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use skein::{Compiler, Heap, Program, new_global_env, reader};

fuzz_target!(|data: &[u8]| {
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };

    // Skip excessively large inputs.
    if code.len() > 8192 {
        return;
    }

    let mut heap = Heap::new();
    let Ok(forms) = reader::read_all(code, &mut heap) else {
        return;
    };

    let global = new_global_env();
    let mut program = Program::new();
    for form in &forms {
        let _ = Compiler::new(&mut program, &heap, &global).compile_top_level(form);
    }
});
