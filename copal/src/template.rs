//! Template parsing and resolution.
//!
//! A source string is split on raw `{`/`}` into literal text and embedded
//! expressions. Escaped braces and backslashes go through [`crate::escape`]
//! first so the splitter never sees them.
//!
//! | Source            | Result of `resolve`                        |
//! |-------------------|--------------------------------------------|
//! | no `{` at all     | the source text, untouched                 |
//! | `{expr}` alone    | the expression's value, with its own type  |
//! | anything else     | text, expression values displayed inline   |
//!
//! A `{` with no matching `}` is kept as literal text.

use std::fmt;
use std::sync::Arc;

use crate::display::display;
use crate::error::{ParseError, ResolveError};
use crate::escape;
use crate::expr::Expression;
use crate::options::{Options, Settings};
use crate::value::Value;

/// One piece of a parsed template.
#[derive(Debug)]
pub enum Segment {
    Literal(String),
    Expr(Expression),
}

impl Segment {
    fn resolve(&self, context: &Value) -> Result<Value, ResolveError> {
        match self {
            Segment::Literal(text) => Ok(Value::text(text.as_str())),
            Segment::Expr(expr) => expr.resolve(context),
        }
    }
}

#[derive(Debug)]
enum Body {
    /// Nothing to evaluate; the value is fixed at parse time.
    Static(Value),
    Segments(Vec<Segment>),
}

/// A parsed template. Immutable; share it with `Arc` and resolve from as
/// many threads as needed.
pub struct Template {
    source: String,
    settings: Arc<Settings>,
    body: Body,
}

impl Template {
    /// Parse `source` with default options.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        Self::new(source, Options::default())
    }

    pub fn new(source: &str, options: Options) -> Result<Self, ParseError> {
        if escape::contains_reserved(source) {
            return Err(ParseError::InvalidSource);
        }
        let settings = Arc::new(options.into_settings()?);
        let body = split(source, &settings)?;

        tracing::debug!(
            source,
            segments = match &body {
                Body::Static(_) => 0,
                Body::Segments(segments) => segments.len(),
            },
            "parsed template"
        );

        Ok(Template {
            source: source.to_owned(),
            settings,
            body,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn wrap(&self) -> &str {
        self.settings.wrap()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// `true` if resolving never looks at the context.
    pub fn is_static(&self) -> bool {
        matches!(self.body, Body::Static(_))
    }

    /// Parsed segments; empty for a static template.
    pub fn segments(&self) -> &[Segment] {
        match &self.body {
            Body::Static(_) => &[],
            Body::Segments(segments) => segments,
        }
    }

    pub fn resolve(&self, context: &Value) -> Result<Value, ResolveError> {
        let segments = match &self.body {
            Body::Static(value) => return Ok(value.clone()),
            Body::Segments(segments) => segments,
        };
        tracing::trace!(source = %self.source, "resolve");

        if let [only] = segments.as_slice() {
            return only.resolve(context);
        }

        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expr(expr) => out.push_str(&display(&expr.resolve(context)?)),
            }
        }
        Ok(Value::Text(out))
    }
}

fn split(source: &str, settings: &Settings) -> Result<Body, ParseError> {
    if !source.contains('{') {
        return Ok(Body::Static(Value::text(source)));
    }

    let encoded = escape::encode(source);
    let mut chunks = encoded.split('{');
    let mut segments = Vec::new();

    if let Some(head) = chunks.next() {
        push_literal(&mut segments, &escape::decode(head));
    }

    for chunk in chunks {
        let Some((expr, rest)) = chunk.split_once('}') else {
            push_literal(&mut segments, &format!("{{{}", escape::decode(chunk)));
            continue;
        };
        if expr.is_empty() {
            return Err(ParseError::EmptyExpression);
        }
        let expr = Expression::parse(&escape::decode(expr), settings)?;
        segments.push(Segment::Expr(expr));
        push_literal(&mut segments, &escape::decode(rest));
    }

    if segments.iter().all(|s| matches!(s, Segment::Literal(_))) {
        let text: String = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Literal(text) => Some(text.as_str()),
                Segment::Expr(_) => None,
            })
            .collect();
        return Ok(Body::Static(Value::Text(text)));
    }
    Ok(Body::Segments(segments))
}

/// Append literal text, merging with a preceding literal.
fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Literal(prev)) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_owned()));
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wrap = self.settings.wrap();
        write!(f, "{wrap}{}{wrap}", self.source)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
