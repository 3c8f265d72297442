//! Benchmarks for runtime arithmetic and tail-call dispatch.
//!
//! These benchmark bodies are written so the VM cannot short-circuit them
//! at compile time (no single `Constant` fold reaches `Halt` directly): each
//! one threads state through at least one non-tail-call-eligible lambda
//! application or a bounded tail loop, so the measured time reflects actual
//! `Vm::step` dispatch rather than a single `constant` instruction.

// Use codspeed-criterion-compat when running on CodSpeed (CI), real criterion otherwise (for flamegraphs).
#[cfg(codspeed)]
use codspeed_criterion_compat::{Criterion, black_box, criterion_group, criterion_main};
#[cfg(not(codspeed))]
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use skein::{Compiler, Heap, Program, Value, Vm, new_global_env, reader};

/// Compiles and runs `src` against a fresh heap/environment/program, returning
/// the final accumulator value.
fn eval(src: &str) -> Value {
    let mut heap = Heap::new();
    let forms = reader::read_all(src, &mut heap).expect("benchmark source must parse");
    let global = new_global_env();
    let mut program = Program::new();
    let mut result = Value::Null;
    for form in &forms {
        let entry = Compiler::new(&mut program, &heap, &global).compile_top_level(form).expect("benchmark source must compile");
        let mut vm = Vm::new(&program, entry, global.clone(), std::mem::take(&mut heap));
        result = vm.run().expect("benchmark source must run without error");
        heap = std::mem::take(vm.heap_mut());
    }
    result
}

/// Two locals added at runtime through a non-tail lambda call.
const ADD_TWO_LOCALS: &str = "((lambda (x y) (+ x y)) 1 2)";

/// A tail-recursive loop summing `1..=1000`, exercising the bounded-stack
/// `Apply` path (§4.1 "Tail calls") 1000 times per run.
const TAIL_LOOP_1000: &str = "
(define (loop n acc)
  (if (eq? n 0) acc (loop (- n 1) (+ acc n))))
(loop 1000 0)
";

/// A non-tail-recursive Fibonacci, exercising `Frame`/`Return` call-stack
/// growth and shrinkage rather than tail dispatch.
const FIB_15: &str = "
(define (fib n)
  (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))
(fib 15)
";

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("add_two_locals", |b| {
        b.iter(|| {
            black_box(eval(ADD_TWO_LOCALS));
        });
    });

    c.bench_function("tail_loop_1000", |b| {
        b.iter(|| {
            black_box(eval(TAIL_LOOP_1000));
        });
    });

    c.bench_function("fib_15", |b| {
        b.iter(|| {
            black_box(eval(FIB_15));
        });
    });
}

#[cfg(not(codspeed))]
criterion_group!(benches, criterion_benchmark);

#[cfg(codspeed)]
criterion_group!(benches, criterion_benchmark);

criterion_main!(benches);
