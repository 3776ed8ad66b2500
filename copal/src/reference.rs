//! Reference resolution.
//!
//! A bare or bracketed name inside an expression becomes a reference. At
//! parse time the template's [`ReferenceFactory`] turns the raw path text
//! into a [`Reference`]; at resolve time that reference is asked for its
//! value against the context.
//!
//! The default factory, [`PathReferences`], produces a [`Path`]:
//!
//! | Path        | Meaning                                                   |
//! |-------------|-----------------------------------------------------------|
//! | `a.b.0`     | key `a`, then key `b`, then index `0`                     |
//! | `a\.b`      | the single key `a.b`                                      |
//! | `x.*.y`     | key `y` of every element of `x`, collected into a list     |
//! | `s.length`  | length of a list or text (`size` for sets and maps)       |
//! | *(empty)*   | the context itself                                        |
//!
//! Missing steps resolve to `null`.

use std::sync::Arc;

use crate::error::BoxError;
use crate::value::Value;

// ── Traits ────────────────────────────────────────────────────────────────────

/// Looks a value up in a context.
pub trait Reference: Send + Sync {
    fn resolve(&self, context: &Value) -> Result<Value, BoxError>;
}

impl<F> Reference for F
where
    F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync,
{
    fn resolve(&self, context: &Value) -> Result<Value, BoxError> {
        self(context)
    }
}

/// Builds a [`Reference`] from raw path text. Returning `None` rejects the
/// path and fails the parse with `InvalidReferenceFactory`.
pub trait ReferenceFactory: Send + Sync {
    fn create(&self, path: &str) -> Option<Arc<dyn Reference>>;
}

impl<F> ReferenceFactory for F
where
    F: Fn(&str) -> Option<Arc<dyn Reference>> + Send + Sync,
{
    fn create(&self, path: &str) -> Option<Arc<dyn Reference>> {
        self(path)
    }
}

/// The default factory: dotted paths with `*` wildcards.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathReferences;

impl ReferenceFactory for PathReferences {
    fn create(&self, path: &str) -> Option<Arc<dyn Reference>> {
        Some(Arc::new(Path::parse(path)))
    }
}

// ── Path ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Wildcard,
}

/// A parsed dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    /// Split on unescaped dots. `\.` is a literal dot; any other backslash
    /// is kept verbatim.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Path { steps: Vec::new() };
        }

        let mut steps = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '\\' if chars.peek() == Some(&'.') => {
                    chars.next();
                    current.push('.');
                }
                '.' => steps.push(Self::step(std::mem::take(&mut current))),
                c => current.push(c),
            }
        }
        steps.push(Self::step(current));

        Path { steps }
    }

    fn step(segment: String) -> Step {
        if segment == "*" {
            Step::Wildcard
        } else {
            Step::Key(segment)
        }
    }

    /// Number of segments, wildcards included.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn lookup(&self, context: &Value) -> Value {
        walk(context, &self.steps)
    }
}

impl Reference for Path {
    fn resolve(&self, context: &Value) -> Result<Value, BoxError> {
        Ok(self.lookup(context))
    }
}

fn walk(value: &Value, steps: &[Step]) -> Value {
    let Some((step, rest)) = steps.split_first() else {
        return value.clone();
    };
    match step {
        Step::Wildcard => match elements(value) {
            Some(items) => Value::list(items.iter().map(|item| walk(item, rest))),
            None => Value::Null,
        },
        Step::Key(key) => match child(value, key) {
            Some(next) => walk(&next, rest),
            None => Value::Null,
        },
    }
}

/// Members a wildcard fans out over: list and set elements, object and map
/// values.
fn elements(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::List(items) | Value::Set(items) => Some(items.read().clone()),
        Value::Object(obj) => Some(obj.read().values().cloned().collect()),
        Value::Map(entries) => Some(entries.read().iter().map(|(_, v)| v.clone()).collect()),
        _ => None,
    }
}

fn child(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Object(obj) => obj.read().get(key).cloned(),
        Value::List(items) => {
            let items = items.read();
            if key == "length" {
                return Some(Value::from(items.len() as f64));
            }
            index(key).and_then(|i| items.get(i).cloned())
        }
        Value::Set(items) if key == "size" => Some(Value::from(items.read().len() as f64)),
        Value::Map(entries) => {
            let entries = entries.read();
            let found = entries
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v.clone());
            if found.is_none() && key == "size" {
                return Some(Value::from(entries.len() as f64));
            }
            found
        }
        Value::Text(s) => {
            if key == "length" {
                return Some(Value::from(s.chars().count() as f64));
            }
            index(key).and_then(|i| s.chars().nth(i)).map(|c| Value::Text(c.to_string()))
        }
        _ => None,
    }
}

/// Canonical non-negative integer keys only: `"01"` is not an index.
fn index(key: &str) -> Option<usize> {
    let i: usize = key.parse().ok()?;
    (i.to_string() == key).then_some(i)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(path: &str, ctx: &Value) -> Value {
        Path::parse(path).lookup(ctx)
    }

    #[test]
    fn parse_splits_on_unescaped_dots() {
        assert_eq!(Path::parse("x.y.0").len(), 3);
        assert_eq!(Path::parse(r"x\.y.y").len(), 2);
        assert_eq!(Path::parse("").len(), 0);
        assert_eq!(
            Path::parse(r"x\.y\z.t\}").steps,
            vec![Step::Key(r"x.y\z".into()), Step::Key(r"t\}".into())]
        );
        assert_eq!(
            Path::parse("a.*.b").steps,
            vec![Step::Key("a".into()), Step::Wildcard, Step::Key("b".into())]
        );
    }

    #[test]
    fn deep_properties() {
        let ctx = Value::object([(
            "x",
            Value::object([("y", Value::list([Value::from(1)]))]),
        )]);
        assert_eq!(lookup("x.y.0", &ctx), Value::from(1));
        assert_eq!(lookup("x.z", &ctx), Value::Null);
        assert_eq!(lookup("x.y.1", &ctx), Value::Null);
        assert_eq!(lookup("x.y.01", &ctx), Value::Null);
        assert_eq!(lookup("nope.deeper", &ctx), Value::Null);
    }

    #[test]
    fn numeric_path_into_nested_lists() {
        let ctx = Value::list([Value::list([Value::from(0), Value::from(1)])]);
        assert_eq!(lookup("0.1", &ctx), Value::from(1));
    }

    #[test]
    fn wildcard_collects_remaining_path() {
        let ctx = Value::object([(
            "x",
            Value::list([
                Value::object([("y", Value::from(1))]),
                Value::object([("y", Value::from(2))]),
                Value::object([("y", Value::from(3))]),
            ]),
        )]);
        let result = lookup("x.*.y", &ctx);
        assert_eq!(result.to_string(), "1, 2, 3");
        assert_eq!(lookup("y.*", &ctx), Value::Null);
    }

    #[test]
    fn escaped_dot_is_part_of_the_key() {
        let ctx = Value::object([("x.y", Value::object([("y", Value::from(1))]))]);
        assert_eq!(lookup(r"x\.y.y", &ctx), Value::from(1));
    }

    #[test]
    fn lengths_and_map_keys() {
        let ctx = Value::object([
            ("s", Value::from("héllo")),
            ("l", Value::list([Value::Null, Value::Null])),
            ("m", Value::map([(Value::from("k"), Value::from("v"))])),
        ]);
        assert_eq!(lookup("s.length", &ctx), Value::from(5));
        assert_eq!(lookup("s.1", &ctx), Value::from("é"));
        assert_eq!(lookup("l.length", &ctx), Value::from(2));
        assert_eq!(lookup("m.k", &ctx), Value::from("v"));
        assert_eq!(lookup("m.size", &ctx), Value::from(1));
    }

    #[test]
    fn empty_path_is_the_context() {
        let ctx = Value::from(7);
        assert_eq!(lookup("", &ctx), Value::from(7));
    }

    #[test]
    fn closures_implement_the_traits() {
        let factory = |path: &str| -> Option<Arc<dyn Reference>> {
            let key = format!("prefix-{path}");
            Some(Arc::new(move |ctx: &Value| -> Result<Value, BoxError> {
                Ok(Path::parse(&key).lookup(ctx))
            }))
        };
        let reference = factory.create("x").expect("factory returns a reference");
        let ctx = Value::object([("prefix-x", Value::from(1))]);
        assert_eq!(reference.resolve(&ctx).expect("resolves"), Value::from(1));
    }
}
