//! Template options and the validated settings built from them.
//!
//! | Option      | Default                     | Validation            |
//! |-------------|-----------------------------|-----------------------|
//! | `wrap`      | `"`                         | must be non-empty     |
//! | `reference` | [`PathReferences`]          | none                  |
//! | `functions` | built-in math table + `if`  | user entries win      |
//! | `constants` | built-in math constants     | checked when used     |
//!
//! [`Options`] is what callers fill in; [`Settings`] is the immutable form a
//! template keeps and every expression inside it is parsed against.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::builtins::{builtins, Builtins};
use crate::error::{BoxError, ParseError};
use crate::reference::{PathReferences, Reference, ReferenceFactory};
use crate::value::{Function, Value};

const DEFAULT_WRAP: &str = "\"";

// ── Options ───────────────────────────────────────────────────────────────────

/// Construction options for a template.
#[derive(Clone, Default)]
pub struct Options {
    wrap: Option<String>,
    reference: Option<Arc<dyn ReferenceFactory>>,
    functions: HashMap<String, Function>,
    constants: HashMap<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text placed on both sides of the source by `Template`'s `Display`.
    pub fn wrap(mut self, wrap: impl Into<String>) -> Self {
        self.wrap = Some(wrap.into());
        self
    }

    /// Replace the default path lookup for every reference.
    pub fn reference<R: ReferenceFactory + 'static>(mut self, factory: R) -> Self {
        self.reference = Some(Arc::new(factory));
        self
    }

    /// Register a function under `name`, overriding any built-in of the same
    /// name.
    pub fn function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_owned(), Function::new(name, f));
        self
    }

    /// Register prebuilt functions under their own names.
    pub fn functions<I: IntoIterator<Item = Function>>(mut self, functions: I) -> Self {
        self.functions
            .extend(functions.into_iter().map(|f| (f.name().to_owned(), f)));
        self
    }

    /// Register a constant. Non-scalar values are accepted here and
    /// rejected when an expression uses them.
    pub fn constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn constants<K, I>(mut self, constants: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.constants
            .extend(constants.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Validate and freeze.
    pub fn into_settings(self) -> Result<Settings, ParseError> {
        let wrap = match self.wrap {
            Some(w) if w.is_empty() => {
                return Err(ParseError::InvalidOption(
                    "wrap must be a non-empty string".into(),
                ))
            }
            Some(w) => w,
            None => DEFAULT_WRAP.to_owned(),
        };
        Ok(Settings {
            wrap,
            reference: self.reference.unwrap_or_else(|| Arc::new(PathReferences)),
            functions: self.functions,
            constants: self.constants,
            builtins: builtins(),
        })
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("wrap", &self.wrap)
            .field("custom_reference", &self.reference.is_some())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("constants", &self.constants)
            .finish()
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Validated, immutable template settings.
///
/// User tables are consulted before the shared built-in table, which is
/// borrowed rather than copied into every template.
pub struct Settings {
    wrap: String,
    reference: Arc<dyn ReferenceFactory>,
    functions: HashMap<String, Function>,
    constants: HashMap<String, Value>,
    builtins: &'static Builtins,
}

impl Settings {
    pub fn wrap(&self) -> &str {
        &self.wrap
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions
            .get(name)
            .or_else(|| self.builtins.function(name))
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants
            .get(name)
            .or_else(|| self.builtins.constant(name))
    }

    /// Ask the reference factory for a resolver for `path`.
    pub fn reference(&self, path: &str) -> Result<Arc<dyn Reference>, ParseError> {
        self.reference
            .create(path)
            .ok_or_else(|| ParseError::InvalidReferenceFactory(path.to_owned()))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            wrap: DEFAULT_WRAP.to_owned(),
            reference: Arc::new(PathReferences),
            functions: HashMap::new(),
            constants: HashMap::new(),
            builtins: builtins(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("wrap", &self.wrap)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("constants", &self.constants)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
