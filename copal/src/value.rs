//! Runtime value type for contexts and expression results.
//!
//! Scalars (`Null`, `Bool`, `Number`, `Text`) are what the expression
//! language itself produces. Hosts build contexts out of the remaining
//! variants: shared containers, callables, nested templates and opaque
//! objects with their own text form.
//!
//! Coercions follow the ECMAScript tables rather than Rust's own parsing and
//! printing of `f64`:
//!
//! | Value            | as number            | truthy          |
//! |------------------|----------------------|-----------------|
//! | `Null`           | `0`                  | no              |
//! | `Bool(b)`        | `0` / `1`            | `b`             |
//! | `Number(n)`      | `n`                  | `n != 0 && !NaN`|
//! | `Text(s)`        | numeric literal, `""` → `0`, else `NaN` | `!s.is_empty()` |
//! | everything else  | `NaN` (custom: parsed from its text) | yes |

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use regex::Regex;

use crate::error::BoxError;
use crate::template::Template;

// ── Shared containers ─────────────────────────────────────────────────────────

/// A reference-counted, interior-mutable container.
///
/// Clones share the same storage, so a container can be inserted into
/// itself to build cyclic context graphs. Equality between containers is
/// identity.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    pub fn new(inner: T) -> Self {
        Shared(Arc::new(RwLock::new(inner)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Identity key used for cycle detection.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Arc::clone(&self.0))
    }
}

// Contents are not printed: a cyclic container would recurse forever.
impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:#x})", self.addr())
    }
}

// ── Callables ─────────────────────────────────────────────────────────────────

/// Whether a callable displays as a function or as a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    Class,
}

type NativeFn = dyn Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync;

/// A named native callable.
///
/// Used both for entries of the function table (invoked by call
/// expressions) and as a context value (displayed, never invoked by the
/// engine).
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    kind: CallableKind,
    call: Arc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Function {
            name: name.into(),
            kind: CallableKind::Function,
            call: Arc::new(f),
        }
    }

    /// Convenience for infallible functions.
    pub fn infallible<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::new(name, move |args| Ok(f(args)))
    }

    /// A class-like callable. Invoking it fails, as calling a class
    /// constructor without `new` does.
    pub fn class(name: &str) -> Self {
        let owned = name.to_owned();
        let mut class = Self::new(name, move |_| {
            Err(format!("class constructor {owned} cannot be invoked without 'new'").into())
        });
        class.kind = CallableKind::Class;
        class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, BoxError> {
        (self.call)(args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Shared<Vec<Value>>),
    /// Insertion-ordered, displayed like a list.
    Set(Shared<Vec<Value>>),
    /// Entries with arbitrary keys, in insertion order.
    Map(Shared<Vec<(Value, Value)>>),
    /// Plain keyed record, in insertion order.
    Object(Shared<IndexMap<String, Value>>),
    Function(Function),
    Template(Arc<Template>),
    /// Host object that supplies its own text conversion.
    Custom(Arc<dyn fmt::Display + Send + Sync>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(Shared::new(items.into_iter().collect()))
    }

    /// Builds a set, dropping values equal to an earlier one. Equality is
    /// strict except that `NaN` matches `NaN`.
    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.iter().any(|u| u.same_value_zero(&item)) {
                unique.push(item);
            }
        }
        Value::Set(Shared::new(unique))
    }

    pub fn map<I: IntoIterator<Item = (Value, Value)>>(entries: I) -> Self {
        Value::Map(Shared::new(entries.into_iter().collect()))
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Shared::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn empty_object() -> Self {
        Value::Object(Shared::new(IndexMap::new()))
    }

    pub fn custom<D: fmt::Display + Send + Sync + 'static>(inner: D) -> Self {
        Value::Custom(Arc::new(inner))
    }

    /// Sets `key` on an object value. Returns `false` if `self` is not an
    /// object.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(obj) => {
                obj.write().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Appends to a list value. Returns `false` if `self` is not a list.
    pub fn push(&self, value: Value) -> bool {
        match self {
            Value::List(items) => {
                items.write().push(value);
                true
            }
            _ => false,
        }
    }

    /// `Null`, `Bool`, `Number` or `Text`: the only kinds allowed as
    /// constants.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Text(_)
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    // ── Coercions ─────────────────────────────────────────────────────────────

    /// Falsy: `null`, `false`, `0`, `NaN` and `""`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Numeric coercion.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Text(s) => parse_number(s),
            Value::Custom(c) => parse_number(&c.to_string()),
            _ => f64::NAN,
        }
    }

    /// Text coercion used by `+`: null becomes empty text, everything else
    /// takes its display form.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Strict equality: no coercion, containers compare by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Template(a), Value::Template(b)) => Arc::ptr_eq(a, b),
            (Value::Custom(a), Value::Custom(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }

    /// Set-membership equality: `strict_eq`, plus `NaN` equal to itself.
    fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_eq(other),
        }
    }

    /// Relational ordering: text against text is lexicographic by UTF-16
    /// code unit, anything else is numeric. `None` when either side is NaN.
    pub fn compare(&self, rhs: &Value) -> Option<Ordering> {
        match (self, rhs) {
            (Value::Text(a), Value::Text(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
            _ => self.to_number().partial_cmp(&rhs.to_number()),
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    /// `+`: concatenation when either side is text, numeric addition
    /// otherwise.
    pub fn arith_add(&self, rhs: &Value) -> Value {
        if matches!(self, Value::Text(_)) || matches!(rhs, Value::Text(_)) {
            let mut out = self.to_text();
            out.push_str(&rhs.to_text());
            return Value::Text(out);
        }
        Value::Number(self.to_number() + rhs.to_number())
    }

    pub fn arith_sub(&self, rhs: &Value) -> Value {
        Value::Number(self.to_number() - rhs.to_number())
    }

    pub fn arith_mul(&self, rhs: &Value) -> Value {
        Value::Number(self.to_number() * rhs.to_number())
    }

    /// IEEE division: dividing by zero yields an infinity or NaN.
    pub fn arith_div(&self, rhs: &Value) -> Value {
        Value::Number(self.to_number() / rhs.to_number())
    }

    /// Truncated remainder; the result takes the dividend's sign.
    pub fn arith_rem(&self, rhs: &Value) -> Value {
        Value::Number(self.to_number() % rhs.to_number())
    }

    pub fn arith_pow(&self, rhs: &Value) -> Value {
        Value::Number(pow(self.to_number(), rhs.to_number()))
    }

    pub fn arith_neg(&self) -> Value {
        Value::Number(-self.to_number())
    }

    pub fn logical_not(&self) -> Value {
        Value::Bool(!self.is_truthy())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::List(s) => write!(f, "List({s:?})"),
            Value::Set(s) => write!(f, "Set({s:?})"),
            Value::Map(s) => write!(f, "Map({s:?})"),
            Value::Object(s) => write!(f, "Object({s:?})"),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Template(t) => write!(f, "Template({t})"),
            Value::Custom(c) => write!(f, "Custom({c})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::display::display(self))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Template> for Value {
    fn from(t: Template) -> Self {
        Value::Template(Arc::new(t))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Shared::new(items))
    }
}

// ── Number parsing and formatting ─────────────────────────────────────────────

static DECIMAL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("valid decimal regex")
});

/// Parse text the way a string-to-number conversion does: surrounding
/// whitespace is ignored, empty text is `0`, `0x`/`0o`/`0b` prefixes and
/// signed `Infinity` are accepted, anything else is `NaN`.
pub fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match s.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => 10,
    };
    if radix != 10 {
        let digits = &s[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return f64::NAN;
        }
        return digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    }
    if !DECIMAL_RX.is_match(s) {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

/// Shortest round-trip text form of a number, with exponent notation
/// outside `[1e-6, 1e21)`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return n.to_string();
    }
    // `{:e}` gives "1e21" / "1.5e-7"; positive exponents need an explicit sign.
    let exp = format!("{n:e}");
    match exp.split_once('e') {
        Some((mantissa, e)) if !e.starts_with('-') => format!("{mantissa}e+{e}"),
        _ => exp,
    }
}

/// Exponentiation with the host-library edge cases that `powf` lacks.
pub(crate) fn pow(base: f64, exp: f64) -> f64 {
    if exp.is_nan() || (base.abs() == 1.0 && exp.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exp)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_display() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-7.0), "-7");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(4.0 / 3.0), "1.3333333333333333");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(0.000001), "0.000001");
    }

    #[test]
    fn text_to_number() {
        assert_eq!(parse_number("42"), 42.0);
        assert_eq!(parse_number("  2.5 "), 2.5);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("   "), 0.0);
        assert_eq!(parse_number(".5"), 0.5);
        assert_eq!(parse_number("1e3"), 1000.0);
        assert_eq!(parse_number("0x1F"), 31.0);
        assert_eq!(parse_number("0b101"), 5.0);
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_number("abc").is_nan());
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("NaN").is_nan());
        assert!(parse_number("1x").is_nan());
        assert!(parse_number("0x").is_nan());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(Value::text("0").is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::list([]).is_truthy());
        assert!(Value::empty_object().is_truthy());
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::text("3").to_number(), 3.0);
        assert!(Value::empty_object().to_number().is_nan());
        assert_eq!(Value::custom("12").to_number(), 12.0);
    }

    #[test]
    fn add_concatenates_when_either_side_is_text() {
        assert_eq!(Value::from(1).arith_add(&Value::from("x")), Value::from("1x"));
        assert_eq!(Value::Null.arith_add(&Value::from("2")), Value::from("2"));
        assert_eq!(Value::from("1").arith_add(&Value::Null), Value::from("1"));
        assert_eq!(Value::from(true).arith_add(&Value::from("!")), Value::from("true!"));
        assert_eq!(Value::from(1).arith_add(&Value::from(2)), Value::from(3));
        assert_eq!(Value::Null.arith_add(&Value::from(2)), Value::from(2));
    }

    #[test]
    fn arithmetic_coerces_operands() {
        assert_eq!(Value::from("4").arith_div(&Value::from(2)), Value::from(2));
        assert_eq!(Value::from(4).arith_div(&Value::Null), Value::Number(f64::INFINITY));
        assert!(Value::from(4).arith_rem(&Value::Null).to_number().is_nan());
        assert_eq!(Value::from(-5).arith_rem(&Value::from(3)), Value::from(-2));
        assert_eq!(Value::from("2").arith_pow(&Value::from(3)), Value::from(8));
        assert_eq!(Value::from(4).arith_pow(&Value::Null), Value::from(1));
        assert!(Value::from(1).arith_pow(&Value::Number(f64::NAN)).to_number().is_nan());
        assert_eq!(Value::from("5").arith_neg(), Value::from(-5));
    }

    #[test]
    fn strict_equality() {
        assert_eq!(Value::from(3), Value::from(3));
        assert_ne!(Value::from(3), Value::from("3"));
        assert_ne!(Value::Null, Value::from(0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));

        let a = Value::list([Value::from(1)]);
        let b = Value::list([Value::from(1)]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn comparison() {
        assert_eq!(Value::from(2).compare(&Value::from("3")), Some(Ordering::Less));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("10").compare(&Value::from("9")), Some(Ordering::Less));
        assert_eq!(Value::Null.compare(&Value::from(0)), Some(Ordering::Equal));
        assert_eq!(Value::from("x").compare(&Value::from(1)), None);
    }

    #[test]
    fn set_drops_duplicates() {
        let set = Value::set([Value::from(1), Value::from(1), Value::from("1")]);
        match set {
            Value::Set(items) => assert_eq!(items.read().len(), 2),
            other => panic!("expected set, got {other:?}"),
        }
    }

    #[test]
    fn set_treats_nan_as_one_member() {
        let set = Value::set([
            Value::Number(f64::NAN),
            Value::Number(f64::NAN),
            Value::from(0.0),
            Value::from(-0.0),
        ]);
        match set {
            Value::Set(items) => assert_eq!(items.read().len(), 2),
            other => panic!("expected set, got {other:?}"),
        }
    }

    #[test]
    fn class_callable_refuses_invocation() {
        let class = Function::class("X");
        assert_eq!(class.kind(), CallableKind::Class);
        assert!(class.call(&[]).is_err());
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(Some(2)), Value::Number(2.0));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(7i64), Value::Number(7.0));
    }
}
