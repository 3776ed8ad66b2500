//! Function calls inside expressions.
//!
//! `name(arg, arg, ...)`: the name is bound to a [`Function`] from the
//! template's settings when the expression is parsed, and each argument is
//! parsed as its own [`Expression`].

use std::fmt;

use crate::error::{ParseError, ResolveError};
use crate::expr::Expression;
use crate::options::Settings;
use crate::value::{Function, Value};

/// A bound function and its argument expressions.
pub struct FunctionCall {
    name: String,
    function: Function,
    args: Vec<Expression>,
}

impl FunctionCall {
    /// Bind `name` and parse the raw text between the call's parentheses.
    pub(crate) fn parse(name: &str, raw: &str, settings: &Settings) -> Result<Self, ParseError> {
        let function = settings
            .function(name)
            .cloned()
            .ok_or_else(|| ParseError::UnknownFunction(name.to_owned()))?;

        let args = split_args(raw)?
            .into_iter()
            .map(|arg| Expression::parse(arg, settings))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FunctionCall {
            name: name.to_owned(),
            function,
            args,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    /// Resolve every argument in order, then call.
    pub fn invoke(&self, context: &Value) -> Result<Value, ResolveError> {
        let args = self
            .args
            .iter()
            .map(|arg| arg.resolve(context))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::trace!(function = %self.name, argc = args.len(), "call");
        Ok(self.function.call(&args)?)
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// Split on commas that are outside nested parentheses and quotes.
/// Blank argument text means no arguments at all.
fn split_args(raw: &str) -> Result<Vec<&str>, ParseError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut closer: Option<char> = None;
    let mut start = 0;

    for (i, ch) in raw.char_indices() {
        if let Some(c) = closer {
            if ch == c {
                closer = None;
            }
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or(ParseError::UnbalancedParentheses)?,
            '"' | '\'' if depth == 0 => closer = Some(ch),
            '[' if depth == 0 => closer = Some(']'),
            ',' if depth == 0 => {
                args.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(ParseError::UnbalancedParentheses);
    }
    args.push(&raw[start..]);
    Ok(args)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
