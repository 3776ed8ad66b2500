//! Template strings with embedded expressions.
//!
//! ```
//! use copal::Value;
//!
//! let template = copal::parse("My full name is {first + \" \" + last}").unwrap();
//! let ctx = Value::object([("first", Value::from("John")), ("last", Value::from("Doe"))]);
//! assert_eq!(template.resolve(&ctx).unwrap(), Value::from("My full name is John Doe"));
//! ```
//!
//! Module map:
//!
//! | Module       | Role                                              |
//! |--------------|---------------------------------------------------|
//! | `template`   | brace splitting, segment joining                  |
//! | `escape`     | `\{`, `\}`, `\\` sentinel codec                   |
//! | `expr`       | expression lexer, validation and evaluator        |
//! | `call`       | function-call argument parsing and invocation     |
//! | `reference`  | reference traits and the default path lookup      |
//! | `display`    | value-to-text serialization                       |
//! | `value`      | runtime values and their coercions                |
//! | `builtins`   | the shared math table                             |
//! | `options`    | construction options and validated settings       |
//! | `error`      | parse and resolve errors                          |

pub mod builtins;
pub mod call;
pub mod display;
pub mod error;
pub mod escape;
pub mod expr;
pub mod options;
pub mod reference;
pub mod template;
pub mod value;

pub use call::FunctionCall;
pub use error::{BoxError, ParseError, ResolveError};
pub use expr::Expression;
pub use options::{Options, Settings};
pub use reference::{Path, PathReferences, Reference, ReferenceFactory};
pub use template::{Segment, Template};
pub use value::{CallableKind, Function, Shared, Value};

/// Parse `source` with default options.
pub fn parse(source: &str) -> Result<Template, ParseError> {
    Template::parse(source)
}

pub fn parse_with(source: &str, options: Options) -> Result<Template, ParseError> {
    Template::new(source, options)
}

/// `true` if `value` holds a parsed template.
pub fn is_template(value: &Value) -> bool {
    matches!(value, Value::Template(_))
}
