//! Cross-cutting invariants (§8): compiler determinism, symbol/pair `eq?`
//! identity, and `set!` visibility through a closure.

use skein::{Compiler, Heap, Program, Value, Vm, intern, new_global_env, read_all};

fn eval(src: &str) -> Value {
    let mut heap = Heap::new();
    let forms = read_all(src, &mut heap).expect("source must parse");
    let global = new_global_env();
    let mut program = Program::new();
    let mut result = Value::Null;
    for form in &forms {
        let entry = Compiler::new(&mut program, &heap, &global).compile_top_level(form).expect("source must compile");
        let mut vm = Vm::new(&program, entry, global.clone(), std::mem::take(&mut heap));
        result = vm.run().expect("source must run without error");
        heap = std::mem::take(vm.heap_mut());
    }
    result
}

#[test]
fn compiling_the_same_source_twice_yields_the_same_entry_point() {
    // Each compile starts from a fresh `Program` (seeded with the same four
    // reserved instructions) and a fresh global environment, so pushing the
    // same form's instructions in the same order must land at the same index.
    let src = "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1))))) (fact 5)";

    let mut heap_a = Heap::new();
    let forms_a = read_all(src, &mut heap_a).unwrap();
    let global_a = new_global_env();
    let mut program_a = Program::new();
    let entry_a1 = Compiler::new(&mut program_a, &heap_a, &global_a).compile_top_level(&forms_a[0]).unwrap();
    let entry_a2 = Compiler::new(&mut program_a, &heap_a, &global_a).compile_top_level(&forms_a[1]).unwrap();

    let mut heap_b = Heap::new();
    let forms_b = read_all(src, &mut heap_b).unwrap();
    let global_b = new_global_env();
    let mut program_b = Program::new();
    let entry_b1 = Compiler::new(&mut program_b, &heap_b, &global_b).compile_top_level(&forms_b[0]).unwrap();
    let entry_b2 = Compiler::new(&mut program_b, &heap_b, &global_b).compile_top_level(&forms_b[1]).unwrap();

    assert_eq!(entry_a1, entry_b1);
    assert_eq!(entry_a2, entry_b2);
}

#[test]
fn eq_holds_between_symbols_interned_from_the_same_text() {
    assert_eq!(intern("loop"), intern("loop"));
    assert_eq!(eval("(eq? 'loop 'loop)"), Value::Bool(true));
}

#[test]
fn eq_does_not_hold_between_symbols_from_different_text() {
    assert_ne!(intern("loop"), intern("recur"));
    assert_eq!(eval("(eq? 'loop 'recur)"), Value::Bool(false));
}

#[test]
fn eq_does_not_hold_between_separately_constructed_pairs_with_equal_contents() {
    assert_eq!(eval("(eq? (cons 1 2) (cons 1 2))"), Value::Bool(false));
}

#[test]
fn equal_holds_between_separately_constructed_pairs_with_equal_contents() {
    assert_eq!(eval("(equal? (cons 1 2) (cons 1 2))"), Value::Bool(true));
}

#[test]
fn set_through_a_closure_is_visible_to_a_later_reference_through_the_same_closure() {
    let src = "
        (define (make-counter n)
          (lambda ()
            (set! n (+ n 1))
            n))
        (define counter (make-counter 0))
        (counter)
        (counter)
        (counter)
    ";
    assert_eq!(eval(src), Value::Int(3));
}

#[test]
fn set_to_a_variable_captured_by_two_closures_is_visible_through_both() {
    // `get` and `inc` close over the same binding cell; a `set!` through
    // `inc` must be observed by a subsequent `refer` through `get`.
    let src = "
        (define n 0)
        (define (inc) (set! n (+ n 1)))
        (define (get) n)
        (inc)
        (inc)
        (get)
    ";
    assert_eq!(eval(src), Value::Int(2));
}
