//! Value-to-text serialization.
//!
//! | Value            | Text                                 |
//! |------------------|--------------------------------------|
//! | null             | `null`                               |
//! | number           | shortest round-trip form, `NaN` etc. |
//! | list, set        | items joined with `, `               |
//! | map              | `{ key => value, ... }`              |
//! | object           | `{ key: value, ... }`, `{}` if empty |
//! | function         | `function name() {}`                 |
//! | class            | `class name {}`                      |
//! | template         | its wrapped source                   |
//!
//! A container reached a second time anywhere in one serialization renders
//! as `[Circular]`, so self-referencing data always terminates.

use std::collections::HashSet;

use crate::value::{format_number, CallableKind, Value};

pub fn display(value: &Value) -> String {
    let mut visited = HashSet::new();
    render(value, &mut visited)
}

fn render(value: &Value, visited: &mut HashSet<usize>) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::Text(s) => s.clone(),
        Value::Function(f) => match f.kind() {
            CallableKind::Function => format!("function {}() {{}}", f.name()),
            CallableKind::Class => format!("class {} {{}}", f.name()),
        },
        Value::Template(t) => t.to_string(),
        Value::Custom(c) => c.to_string(),

        Value::List(items) | Value::Set(items) => {
            if !visited.insert(items.addr()) {
                return CIRCULAR.to_owned();
            }
            // Snapshot so no lock is held while recursing.
            let items = items.read().clone();
            items
                .iter()
                .map(|item| render(item, visited))
                .collect::<Vec<_>>()
                .join(", ")
        }
        Value::Map(entries) => {
            if !visited.insert(entries.addr()) {
                return CIRCULAR.to_owned();
            }
            let entries = entries.read().clone();
            wrap(
                entries
                    .iter()
                    .map(|(k, v)| format!("{} => {}", render(k, visited), render(v, visited))),
            )
        }
        Value::Object(obj) => {
            if !visited.insert(obj.addr()) {
                return CIRCULAR.to_owned();
            }
            let obj = obj.read().clone();
            wrap(obj.iter().map(|(k, v)| format!("{k}: {}", render(v, visited))))
        }
    }
}

const CIRCULAR: &str = "[Circular]";

fn wrap(entries: impl Iterator<Item = String>) -> String {
    let entries: Vec<String> = entries.collect();
    if entries.is_empty() {
        "{}".to_owned()
    } else {
        format!("{{ {} }}", entries.join(", "))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Function;

    #[test]
    fn scalars() {
        assert_eq!(display(&Value::Null), "null");
        assert_eq!(display(&Value::from(true)), "true");
        assert_eq!(display(&Value::from(1.5)), "1.5");
        assert_eq!(display(&Value::from(f64::NAN)), "NaN");
        assert_eq!(display(&Value::from(-0.0)), "0");
        assert_eq!(display(&Value::from("x")), "x");
    }

    #[test]
    fn containers() {
        let list = Value::list([Value::from(1), Value::from("a"), Value::Null]);
        assert_eq!(display(&list), "1, a, null");

        let obj = Value::object([("a", Value::from(1)), ("b", Value::from("x"))]);
        assert_eq!(display(&obj), "{ a: 1, b: x }");
        assert_eq!(display(&Value::empty_object()), "{}");

        let map = Value::map([
            (Value::empty_object(), Value::from(1)),
            (Value::from("x"), Value::from("y")),
        ]);
        assert_eq!(display(&map), "{ {} => 1, x => y }");
        assert_eq!(display(&Value::map([])), "{}");

        let set = Value::set([Value::from(1), Value::from(1), Value::from(2)]);
        assert_eq!(display(&set), "1, 2");
    }

    #[test]
    fn nested_lists_flatten() {
        let nested = Value::list([
            Value::list([Value::from(1), Value::from(2)]),
            Value::from(3),
        ]);
        assert_eq!(display(&nested), "1, 2, 3");
    }

    #[test]
    fn callables() {
        assert_eq!(
            display(&Value::from(Function::infallible("test", |_| Value::Null))),
            "function test() {}"
        );
        assert_eq!(display(&Value::from(Function::class("Test"))), "class Test {}");
    }

    #[test]
    fn self_reference_is_circular() {
        let obj = Value::empty_object();
        obj.insert("x", obj.clone());
        assert_eq!(display(&obj), "{ x: [Circular] }");

        let list = Value::list([Value::from(1)]);
        list.push(list.clone());
        assert_eq!(display(&list), "1, [Circular]");
    }

    #[test]
    fn repeated_sibling_is_circular() {
        let shared = Value::object([("a", Value::from(1))]);
        let outer = Value::list([shared.clone(), shared]);
        assert_eq!(display(&outer), "{ a: 1 }, [Circular]");
    }
}
