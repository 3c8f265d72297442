//! Built-in procedures (§6 "Primitives", §10.1 in the design notes).
//!
//! Primitives are a closed, compile-time-known C-like enum rather than
//! boxed `Fn` trait objects: the set of primitives is fixed at compile time
//! and this keeps `Value::Primitive` `Clone`+`PartialEq` for free, the same
//! way `Value::Closure` is just a `HeapId`. [`install`] binds every variant
//! into a fresh global [`Env`] under its Scheme name; [`Prim::call`] is the
//! dispatcher the VM's `Apply` instruction calls into (§4.3).
//!
//! Numeric primitives keep a small integer/float split (§3 "Numbers") rather
//! than a full numeric tower: `i64` arithmetic uses `checked_*` operations
//! and promotes to `f64` on overflow or when either operand is already a
//! float, which covers everything the example programs in §8 need without
//! pulling in a bignum dependency.

use strum::{Display, EnumIter};

use crate::env::Env;
use crate::error::{VmError, VmResult};
use crate::heap::Heap;
use crate::intern::intern;
use crate::value::Value;

/// A built-in procedure. `Copy`, so a `Value::Primitive` is as cheap to
/// move around as a `Value::Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Prim {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    Quotient,
    Remainder,
    Modulo,
    #[strum(serialize = "=")]
    NumEq,
    #[strum(serialize = "<")]
    NumLt,
    #[strum(serialize = ">")]
    NumGt,
    #[strum(serialize = "<=")]
    NumLe,
    #[strum(serialize = ">=")]
    NumGe,
    Cons,
    Car,
    Cdr,
    SetCar,
    SetCdr,
    #[strum(serialize = "pair?")]
    IsPair,
    #[strum(serialize = "null?")]
    IsNull,
    #[strum(serialize = "eq?")]
    IsEq,
    #[strum(serialize = "eqv?")]
    IsEqv,
    #[strum(serialize = "equal?")]
    IsEqual,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "zero?")]
    IsZero,
    #[strum(serialize = "procedure?")]
    IsProcedure,
    #[strum(serialize = "number?")]
    IsNumber,
    #[strum(serialize = "symbol?")]
    IsSymbol,
    #[strum(serialize = "string?")]
    IsString,
    List,
    Length,
    Append,
    Reverse,
    Vector,
    MakeVector,
    #[strum(serialize = "vector-ref")]
    VectorRef,
    #[strum(serialize = "vector-set!")]
    VectorSet,
    #[strum(serialize = "vector-length")]
    VectorLength,
    #[strum(serialize = "vector->list")]
    VectorToList,
    Display,
    Write,
    Newline,
}

impl Prim {
    #[must_use]
    pub fn name(self) -> String {
        self.to_string()
    }

    /// Dispatches a call with already-evaluated `args` (§4.3 `apply`).
    pub fn call(self, heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
        use Prim::*;
        match self {
            Add => numeric_fold(args, 0, |a, b| a.checked_add(b), |a, b| a + b),
            Mul => numeric_fold(args, 1, |a, b| a.checked_mul(b), |a, b| a * b),
            Sub => numeric_sub(args),
            Div => numeric_div(args),
            Quotient => int_binop(args, "quotient", i64::checked_div),
            Remainder => int_binop(args, "remainder", i64::checked_rem),
            Modulo => int_binop(args, "modulo", floored_modulo),
            NumEq => numeric_compare(args, |o| o == std::cmp::Ordering::Equal),
            NumLt => numeric_compare(args, |o| o == std::cmp::Ordering::Less),
            NumGt => numeric_compare(args, |o| o == std::cmp::Ordering::Greater),
            NumLe => numeric_compare(args, |o| o != std::cmp::Ordering::Greater),
            NumGe => numeric_compare(args, |o| o != std::cmp::Ordering::Less),
            Cons => {
                let [a, b] = two_args("cons", args)?;
                Ok(Value::Pair(heap.alloc_pair(a.clone(), b.clone())))
            }
            Car => match one_arg("car", args)? {
                Value::Pair(id) => Ok(heap.car(*id)),
                other => Err(type_error("car", "a pair", other)),
            },
            Cdr => match one_arg("cdr", args)? {
                Value::Pair(id) => Ok(heap.cdr(*id)),
                other => Err(type_error("cdr", "a pair", other)),
            },
            SetCar => {
                let [a, b] = two_args("set-car!", args)?;
                match a {
                    Value::Pair(id) => {
                        heap.set_car(*id, b.clone());
                        Ok(Value::Unassigned)
                    }
                    other => Err(type_error("set-car!", "a pair", other)),
                }
            }
            SetCdr => {
                let [a, b] = two_args("set-cdr!", args)?;
                match a {
                    Value::Pair(id) => {
                        heap.set_cdr(*id, b.clone());
                        Ok(Value::Unassigned)
                    }
                    other => Err(type_error("set-cdr!", "a pair", other)),
                }
            }
            IsPair => Ok(Value::Bool(one_arg("pair?", args)?.is_pair())),
            IsNull => Ok(Value::Bool(one_arg("null?", args)?.is_null())),
            IsEq => {
                let [a, b] = two_args("eq?", args)?;
                Ok(Value::Bool(a == b))
            }
            IsEqv => {
                // `Value` never boxes numbers/chars separately from their identity,
                // so eqv?'s "compare by value for numbers/chars, by identity for
                // everything else" reduces to the same comparison eq? already does.
                let [a, b] = two_args("eqv?", args)?;
                Ok(Value::Bool(a == b))
            }
            IsEqual => {
                let [a, b] = two_args("equal?", args)?;
                Ok(Value::Bool(structurally_equal(heap, a, b)))
            }
            Not => Ok(Value::Bool(!one_arg("not", args)?.is_truthy())),
            IsZero => match one_arg("zero?", args)? {
                Value::Int(n) => Ok(Value::Bool(*n == 0)),
                Value::Float(x) => Ok(Value::Bool(*x == 0.0)),
                other => Err(type_error("zero?", "a number", other)),
            },
            IsProcedure => Ok(Value::Bool(matches!(one_arg("procedure?", args)?, Value::Closure(_) | Value::Primitive(_)))),
            IsNumber => Ok(Value::Bool(matches!(one_arg("number?", args)?, Value::Int(_) | Value::Float(_)))),
            IsSymbol => Ok(Value::Bool(matches!(one_arg("symbol?", args)?, Value::Symbol(_)))),
            IsString => Ok(Value::Bool(matches!(one_arg("string?", args)?, Value::Str(_)))),
            List => Ok(Value::vec_to_list(heap, args.to_vec())),
            Length => match one_arg("length", args)?.list_to_vec(heap) {
                Some(items) => Ok(Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX))),
                None => Err(type_error("length", "a proper list", one_arg("length", args)?)),
            },
            Append => append(heap, args),
            Reverse => {
                let mut items = one_arg("reverse", args)?.list_to_vec(heap).ok_or_else(|| type_error("reverse", "a proper list", one_arg("reverse", args).unwrap()))?;
                items.reverse();
                Ok(Value::vec_to_list(heap, items))
            }
            Vector => Ok(Value::Vector(heap.alloc_vector(args.to_vec()))),
            MakeVector => {
                let n = match one_arg("make-vector", args)? {
                    Value::Int(n) if *n >= 0 => *n as usize,
                    other => return Err(type_error("make-vector", "a non-negative integer", other)),
                };
                Ok(Value::Vector(heap.alloc_vector(vec![Value::Unassigned; n])))
            }
            VectorRef => {
                let [v, idx] = two_args("vector-ref", args)?;
                let (id, i) = vector_index("vector-ref", v, idx, heap)?;
                Ok(heap.vector_get(id, i))
            }
            VectorSet => {
                let [v, idx, val] = three_args("vector-set!", args)?;
                let (id, i) = vector_index("vector-set!", v, idx, heap)?;
                heap.vector_set(id, i, val.clone());
                Ok(Value::Unassigned)
            }
            VectorLength => match one_arg("vector-length", args)? {
                Value::Vector(id) => Ok(Value::Int(i64::try_from(heap.vector_len(*id)).unwrap_or(i64::MAX))),
                other => Err(type_error("vector-length", "a vector", other)),
            },
            VectorToList => match one_arg("vector->list", args)? {
                Value::Vector(id) => Ok(Value::vec_to_list(heap, heap.vector_to_vec(*id))),
                other => Err(type_error("vector->list", "a vector", other)),
            },
            Display => {
                print(one_arg("display", args)?, heap, false);
                Ok(Value::Unassigned)
            }
            Write => {
                print(one_arg("write", args)?, heap, true);
                Ok(Value::Unassigned)
            }
            Newline => {
                println!();
                Ok(Value::Unassigned)
            }
        }
    }
}

fn print(val: &Value, heap: &Heap, quoted: bool) {
    struct Printed<'a>(&'a Value, &'a Heap, bool);
    impl std::fmt::Display for Printed<'_> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            if self.2 { self.0.fmt_write(f, self.1) } else { self.0.fmt_display(f, self.1) }
        }
    }
    print!("{}", Printed(val, heap, quoted));
}

fn one_arg<'a>(name: &'static str, args: &'a [Value]) -> VmResult<&'a Value> {
    match args {
        [a] => Ok(a),
        _ => Err(VmError::ArityMismatch { expected: format!("exactly 1 (for {name})"), got: args.len() }),
    }
}

fn two_args<'a>(name: &'static str, args: &'a [Value]) -> VmResult<[&'a Value; 2]> {
    match args {
        [a, b] => Ok([a, b]),
        _ => Err(VmError::ArityMismatch { expected: format!("exactly 2 (for {name})"), got: args.len() }),
    }
}

fn three_args<'a>(name: &'static str, args: &'a [Value]) -> VmResult<[&'a Value; 3]> {
    match args {
        [a, b, c] => Ok([a, b, c]),
        _ => Err(VmError::ArityMismatch { expected: format!("exactly 3 (for {name})"), got: args.len() }),
    }
}

fn type_error(who: &'static str, expected: &str, got: &Value) -> VmError {
    VmError::TypeError(format!("{who}: expected {expected}, got {} ({got})", got.type_name()))
}

fn vector_index(who: &'static str, v: &Value, idx: &Value, heap: &Heap) -> VmResult<(crate::heap::HeapId, usize)> {
    let id = match v {
        Value::Vector(id) => *id,
        other => return Err(type_error(who, "a vector", other)),
    };
    let i = match idx {
        Value::Int(n) if *n >= 0 => *n as usize,
        other => return Err(type_error(who, "a non-negative integer", other)),
    };
    if i >= heap.vector_len(id) {
        return Err(VmError::TypeError(format!("{who}: index {i} out of bounds")));
    }
    Ok((id, i))
}

fn append(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let Some((last, init)) = args.split_last() else {
        return Ok(Value::Null);
    };
    let mut items = Vec::new();
    for list in init {
        let vec = list.list_to_vec(heap).ok_or_else(|| type_error("append", "a proper list", list))?;
        items.extend(vec);
    }
    let mut result = last.clone();
    for item in items.into_iter().rev() {
        result = Value::Pair(heap.alloc_pair(item, result));
    }
    Ok(result)
}

fn structurally_equal(heap: &Heap, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Pair(id_a), Value::Pair(id_b)) => {
            structurally_equal(heap, &heap.car(*id_a), &heap.car(*id_b)) && structurally_equal(heap, &heap.cdr(*id_a), &heap.cdr(*id_b))
        }
        (Value::Vector(id_a), Value::Vector(id_b)) => {
            let va = heap.vector_to_vec(*id_a);
            let vb = heap.vector_to_vec(*id_b);
            va.len() == vb.len() && va.iter().zip(vb.iter()).all(|(x, y)| structurally_equal(heap, x, y))
        }
        _ => a == b,
    }
}

fn as_f64(val: &Value) -> VmResult<f64> {
    match val {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(x) => Ok(*x),
        other => Err(type_error("arithmetic", "a number", other)),
    }
}

fn numeric_fold(args: &[Value], identity: i64, int_op: impl Fn(i64, i64) -> Option<i64>, float_op: impl Fn(f64, f64) -> f64) -> VmResult<Value> {
    if args.iter().any(|v| matches!(v, Value::Float(_))) {
        let mut acc = identity as f64;
        for v in args {
            acc = float_op(acc, as_f64(v)?);
        }
        return Ok(Value::Float(acc));
    }
    let mut acc: i64 = identity;
    for v in args {
        let n = match v {
            Value::Int(n) => *n,
            other => return Err(type_error("arithmetic", "a number", other)),
        };
        match int_op(acc, n) {
            Some(next) => acc = next,
            None => return Ok(Value::Float(float_op(acc as f64, n as f64))),
        }
    }
    Ok(Value::Int(acc))
}

fn numeric_sub(args: &[Value]) -> VmResult<Value> {
    match args {
        [] => Err(VmError::ArityMismatch { expected: "at least 1 (for -)".to_string(), got: 0 }),
        [single] => numeric_fold(std::slice::from_ref(single), 0, |_, b| b.checked_neg(), |_, b| -b),
        [first, rest @ ..] => {
            if matches!(first, Value::Float(_)) || rest.iter().any(|v| matches!(v, Value::Float(_))) {
                let mut acc = as_f64(first)?;
                for v in rest {
                    acc -= as_f64(v)?;
                }
                Ok(Value::Float(acc))
            } else {
                let mut acc = match first {
                    Value::Int(n) => *n,
                    other => return Err(type_error("-", "a number", other)),
                };
                for v in rest {
                    let n = match v {
                        Value::Int(n) => *n,
                        other => return Err(type_error("-", "a number", other)),
                    };
                    match acc.checked_sub(n) {
                        Some(next) => acc = next,
                        None => return Ok(Value::Float(acc as f64 - n as f64)),
                    }
                }
                Ok(Value::Int(acc))
            }
        }
    }
}

fn numeric_div(args: &[Value]) -> VmResult<Value> {
    match args {
        [] => Err(VmError::ArityMismatch { expected: "at least 1 (for /)".to_string(), got: 0 }),
        [single] => Ok(Value::Float(1.0 / as_f64(single)?)),
        [first, rest @ ..] => {
            let mut acc = as_f64(first)?;
            for v in rest {
                acc /= as_f64(v)?;
            }
            Ok(Value::Float(acc))
        }
    }
}

/// Scheme `modulo`: result takes the divisor's sign, unlike `remainder`
/// (which takes the dividend's sign, matching Rust's `%`).
fn floored_modulo(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) { r.checked_add(b) } else { Some(r) }
}

fn int_binop(args: &[Value], name: &'static str, op: impl Fn(i64, i64) -> Option<i64>) -> VmResult<Value> {
    let [a, b] = two_args(name, args)?;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => op(*x, *y).map(Value::Int).ok_or_else(|| VmError::TypeError(format!("{name}: division by zero or overflow"))),
        _ => Err(type_error(name, "two integers", if matches!(a, Value::Int(_)) { b } else { a })),
    }
}

fn numeric_compare(args: &[Value], accept: impl Fn(std::cmp::Ordering) -> bool) -> VmResult<Value> {
    if args.len() < 2 {
        return Err(VmError::ArityMismatch { expected: "at least 2".to_string(), got: args.len() });
    }
    for pair in args.windows(2) {
        let a = as_f64(&pair[0])?;
        let b = as_f64(&pair[1])?;
        let ordering = a.partial_cmp(&b).ok_or_else(|| VmError::TypeError("cannot compare NaN".to_string()))?;
        if !accept(ordering) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

/// Binds every primitive into `env` under its Scheme name (§6).
pub fn install(env: &Env) {
    use strum::IntoEnumIterator;
    for prim in Prim::iter() {
        env.define(intern(&prim.name()), Value::Primitive(prim));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_promotes_to_float_on_overflow() {
        let mut heap = Heap::new();
        let result = Prim::Add.call(&mut heap, &[Value::Int(i64::MAX), Value::Int(1)]).unwrap();
        assert!(matches!(result, Value::Float(_)));
    }

    #[test]
    fn add_stays_integral_within_range() {
        let mut heap = Heap::new();
        let result = Prim::Add.call(&mut heap, &[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn car_on_non_pair_is_a_type_error() {
        let mut heap = Heap::new();
        assert!(Prim::Car.call(&mut heap, &[Value::Int(1)]).is_err());
    }

    #[test]
    fn equal_is_structural_eq_is_identity() {
        let mut heap = Heap::new();
        let p1 = Value::Pair(heap.alloc_pair(Value::Int(1), Value::Null));
        let p2 = Value::Pair(heap.alloc_pair(Value::Int(1), Value::Null));
        assert_eq!(Prim::IsEq.call(&mut heap, &[p1.clone(), p2.clone()]).unwrap(), Value::Bool(false));
        assert_eq!(Prim::IsEqual.call(&mut heap, &[p1, p2]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn install_binds_every_primitive_by_name() {
        let env = Env::root();
        install(&env);
        assert!(env.is_bound(intern("cons")));
        assert!(!env.is_bound(intern("call-with-current-continuation")));
        assert!(env.is_bound(intern("vector-ref")));
        assert!(env.is_bound(intern("modulo")));
        assert!(env.is_bound(intern("eqv?")));
    }

    #[test]
    fn modulo_takes_the_divisors_sign_unlike_remainder() {
        let mut heap = Heap::new();
        assert_eq!(Prim::Modulo.call(&mut heap, &[Value::Int(-7), Value::Int(3)]).unwrap(), Value::Int(2));
        assert_eq!(Prim::Remainder.call(&mut heap, &[Value::Int(-7), Value::Int(3)]).unwrap(), Value::Int(-1));
        assert_eq!(Prim::Modulo.call(&mut heap, &[Value::Int(7), Value::Int(-3)]).unwrap(), Value::Int(-2));
    }

    #[test]
    fn eqv_matches_eq_for_immediates() {
        let mut heap = Heap::new();
        assert_eq!(Prim::IsEqv.call(&mut heap, &[Value::Int(1), Value::Int(1)]).unwrap(), Value::Bool(true));
        assert_eq!(Prim::IsEqv.call(&mut heap, &[Value::Int(1), Value::Int(2)]).unwrap(), Value::Bool(false));
    }
}
