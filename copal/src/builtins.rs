//! Built-in functions and constants.
//!
//! A copy of the standard `Math` library plus the ternary `if`. The table is
//! built once per process and only ever borrowed; templates layer their own
//! functions and constants on top of it.
//!
//! Every math function coerces its arguments with [`Value::to_number`]; a
//! missing argument is `NaN`.

use std::collections::HashMap;
use std::f64::consts;
use std::sync::LazyLock;

use crate::error::BoxError;
use crate::value::{pow, Function, Value};

static BUILTINS: LazyLock<Builtins> = LazyLock::new(Builtins::load);

const FUNCTION_NAMES: &[&str] = &[
    "abs", "acos", "acosh", "asin", "asinh", "atan", "atan2", "atanh", "cbrt", "ceil", "clz32",
    "cos", "cosh", "exp", "expm1", "floor", "fround", "hypot", "if", "imul", "log", "log10",
    "log1p", "log2", "max", "min", "pow", "random", "round", "sign", "sin", "sinh", "sqrt", "tan",
    "tanh", "trunc",
];

const CONSTANTS: &[(&str, f64)] = &[
    ("E", consts::E),
    ("LN10", consts::LN_10),
    ("LN2", consts::LN_2),
    ("LOG10E", consts::LOG10_E),
    ("LOG2E", consts::LOG2_E),
    ("PI", consts::PI),
    ("SQRT1_2", consts::FRAC_1_SQRT_2),
    ("SQRT2", consts::SQRT_2),
];

/// The process-wide built-in table.
pub fn builtins() -> &'static Builtins {
    &BUILTINS
}

/// Immutable lookup table of built-in functions and constants.
pub struct Builtins {
    functions: HashMap<&'static str, Function>,
    constants: HashMap<&'static str, Value>,
}

impl Builtins {
    fn load() -> Self {
        let functions = FUNCTION_NAMES
            .iter()
            .map(|&name| (name, Function::new(name, move |args| call_builtin(name, args))))
            .collect();
        let constants = CONSTANTS
            .iter()
            .map(|&(name, n)| (name, Value::Number(n)))
            .collect();
        Builtins { functions, constants }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, BoxError> {
    let x = num(args, 0);
    Ok(Value::Number(match name {
        "if" => {
            let branch = if args.first().is_some_and(Value::is_truthy) { 1 } else { 2 };
            return Ok(args.get(branch).cloned().unwrap_or_default());
        }

        // ── Unary ────────────────────────────────────────────────────────────
        "abs" => x.abs(),
        "acos" => x.acos(),
        "acosh" => x.acosh(),
        "asin" => x.asin(),
        "asinh" => x.asinh(),
        "atan" => x.atan(),
        "atanh" => x.atanh(),
        "cbrt" => x.cbrt(),
        "ceil" => x.ceil(),
        "clz32" => f64::from(to_uint32(x).leading_zeros()),
        "cos" => x.cos(),
        "cosh" => x.cosh(),
        "exp" => x.exp(),
        "expm1" => x.exp_m1(),
        "floor" => x.floor(),
        "fround" => f64::from(x as f32),
        "log" => x.ln(),
        "log10" => x.log10(),
        "log1p" => x.ln_1p(),
        "log2" => x.log2(),
        "round" => round(x),
        "sign" => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        "sin" => x.sin(),
        "sinh" => x.sinh(),
        "sqrt" => x.sqrt(),
        "tan" => x.tan(),
        "tanh" => x.tanh(),
        "trunc" => x.trunc(),

        // ── Binary ───────────────────────────────────────────────────────────
        "atan2" => x.atan2(num(args, 1)),
        "imul" => f64::from(to_int32(x).wrapping_mul(to_int32(num(args, 1)))),
        "pow" => pow(x, num(args, 1)),

        // ── Variadic ─────────────────────────────────────────────────────────
        "hypot" => hypot(args),
        "max" => fold_extreme(args, f64::NEG_INFINITY, f64::max),
        "min" => fold_extreme(args, f64::INFINITY, f64::min),

        "random" => random()?,

        _ => return Err(format!("{name} is not a built-in function").into()),
    }))
}

fn num(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(f64::NAN, Value::to_number)
}

fn to_uint32(x: f64) -> u32 {
    if !x.is_finite() {
        return 0;
    }
    x.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn to_int32(x: f64) -> i32 {
    to_uint32(x) as i32
}

/// Nearest integer, halves rounded towards +∞.
fn round(x: f64) -> f64 {
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn hypot(args: &[Value]) -> f64 {
    let xs: Vec<f64> = args.iter().map(Value::to_number).collect();
    if xs.iter().any(|x| x.is_infinite()) {
        return f64::INFINITY;
    }
    if xs.iter().any(|x| x.is_nan()) {
        return f64::NAN;
    }
    xs.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// `f64::max`/`min` skip NaN; here any NaN argument poisons the result.
fn fold_extreme(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    args.iter().map(Value::to_number).fold(init, |acc, x| {
        if acc.is_nan() || x.is_nan() {
            f64::NAN
        } else {
            pick(acc, x)
        }
    })
}

/// Uniform in `[0, 1)` from 53 random bits.
fn random() -> Result<f64, BoxError> {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes)?;
    let bits = u64::from_le_bytes(bytes) >> 11;
    Ok(bits as f64 / (1u64 << 53) as f64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        builtins()
            .function(name)
            .unwrap_or_else(|| panic!("{name} is registered"))
            .call(args)
            .expect("builtin call failed")
    }

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn every_listed_name_is_registered() {
        for name in FUNCTION_NAMES {
            assert!(builtins().function(name).is_some(), "{name}");
        }
        assert_eq!(builtins().function_names().count(), FUNCTION_NAMES.len());
        assert!(builtins().constant("PI").is_some());
        assert!(builtins().constant("SQRT1_2").is_some());
    }

    #[test]
    fn ternary_if() {
        assert_eq!(call("if", &[Value::from(true), n(1.0), n(2.0)]), n(1.0));
        assert_eq!(call("if", &[Value::from(""), n(1.0), n(2.0)]), n(2.0));
        assert_eq!(call("if", &[Value::from(1)]), Value::Null);
    }

    #[test]
    fn unary_math() {
        assert_eq!(call("sin", &[n(1.0)]), n(1f64.sin()));
        assert_eq!(call("abs", &[Value::from("-3")]), n(3.0));
        assert_eq!(call("sqrt", &[n(9.0)]), n(3.0));
        assert_eq!(call("trunc", &[n(-4.7)]), n(-4.0));
        assert_eq!(call("clz32", &[n(1.0)]), n(31.0));
        assert_eq!(call("sign", &[n(-2.0)]), n(-1.0));
        assert!(call("sqrt", &[]).to_number().is_nan());
    }

    #[test]
    fn round_ties_towards_positive_infinity() {
        assert_eq!(call("round", &[n(2.5)]), n(3.0));
        assert_eq!(call("round", &[n(-2.5)]), n(-2.0));
        assert_eq!(call("round", &[n(2.4)]), n(2.0));
    }

    #[test]
    fn variadic_math() {
        assert_eq!(call("hypot", &[n(3.0), n(4.0)]), n(5.0));
        assert_eq!(call("hypot", &[]), n(0.0));
        assert_eq!(call("max", &[n(1.0), n(3.0), n(2.0)]), n(3.0));
        assert_eq!(call("min", &[n(1.0), n(3.0), n(2.0)]), n(1.0));
        assert_eq!(call("max", &[]), n(f64::NEG_INFINITY));
        assert!(call("max", &[n(1.0), Value::from("x")]).to_number().is_nan());
    }

    #[test]
    fn integer_math() {
        assert_eq!(call("imul", &[n(3.0), n(4.0)]), n(12.0));
        assert_eq!(call("imul", &[n(4_294_967_295.0), n(5.0)]), n(-5.0));
        assert_eq!(call("pow", &[n(2.0), n(10.0)]), n(1024.0));
    }

    #[test]
    fn random_is_in_unit_interval() {
        for _ in 0..32 {
            let r = call("random", &[]).to_number();
            assert!((0.0..1.0).contains(&r), "{r}");
        }
    }
}
