use proptest::prelude::*;

use copal::value::format_number;
use copal::Value;

proptest! {
    /// Text without an opening brace resolves to itself.
    #[test]
    fn text_without_braces_passes_through(s in "[^{\u{0}\u{1}\u{2}]*") {
        let template = copal::parse(&s).expect("brace-free text parses");
        prop_assert!(template.is_static());
        prop_assert_eq!(template.resolve(&Value::Null).expect("resolve"), Value::from(s));
    }

    /// Arbitrary input returns Ok or Err but never panics.
    #[test]
    fn parser_does_not_panic(s in "\\PC*") {
        if let Ok(template) = copal::parse(&s) {
            let _ = template.resolve(&Value::Null);
        }
    }

    /// Same template, same context, same result.
    #[test]
    fn resolve_is_idempotent(a in -1000i32..1000, b in -1000i32..1000) {
        let template = copal::parse("{a} {a * b - 1} {a < b && \"lt\" || \"ge\"}").expect("parse");
        let ctx = Value::object([("a", Value::from(a)), ("b", Value::from(b))]);
        let first = template.resolve(&ctx).expect("resolve");
        let second = template.resolve(&ctx).expect("resolve");
        prop_assert_eq!(first, second);
    }

    /// A non-negative numeric literal resolves to that number.
    #[test]
    fn numeric_literal_resolves_to_itself(n in 0u32..1_000_000, frac in 0u32..1000) {
        let src = format!("{{{n}.{frac}}}");
        let expected: f64 = format!("{n}.{frac}").parse().expect("valid float");
        let got = copal::parse(&src).expect("parse").resolve(&Value::Null).expect("resolve");
        prop_assert_eq!(got, Value::from(expected));
    }

    /// Integer arithmetic through templates matches native arithmetic.
    #[test]
    fn integer_arithmetic(a in -10_000i64..10_000, b in 1i64..10_000) {
        let ctx = Value::object([("a", Value::from(a)), ("b", Value::from(b))]);
        let got = copal::parse("{a + b * 2 - a % b}")
            .expect("parse")
            .resolve(&ctx)
            .expect("resolve");
        prop_assert_eq!(got, Value::from(a + b * 2 - a % b));
    }

    /// Escaped braces come back out as literal braces.
    #[test]
    fn escaped_braces_round_trip(s in "[a-z ]{0,12}") {
        let src = format!("\\{{{s}\\}}");
        let got = copal::parse(&src).expect("parse").resolve(&Value::Null).expect("resolve");
        prop_assert_eq!(got, Value::from(format!("{{{s}}}")));
    }

    /// Integers format without a fractional part.
    #[test]
    fn integers_format_plainly(n in -1_000_000_000i64..1_000_000_000) {
        prop_assert_eq!(format_number(n as f64), n.to_string());
    }
}
