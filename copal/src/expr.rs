//! Expression lexer, validated part list, and evaluator.
//!
//! The text between a template's `{` and `}` is an expression: operands
//! (numbers, quoted text, constants, references, function calls,
//! parenthesized sub-expressions) separated by binary operators, with
//! optional `!` and `-` prefixes.
//!
//! Operator precedence (tightest → loosest, left-associative):
//!   `^ **`  →  `* / %`  →  `+ -`  →  `< <= > >=`  →  `== !=`  →  `&&`  →  `||`
//!
//! Evaluation does not build a tree. Parts are kept in source order and each
//! `resolve` reduces a fresh vector of slots tier by tier, so a parsed
//! expression is never mutated and may be resolved from many threads at
//! once.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::call::FunctionCall;
use crate::error::{ParseError, ResolveError};
use crate::options::Settings;
use crate::reference::Reference;
use crate::value::Value;

static NUMBER_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)?$").expect("valid number regex"));

const OPERATOR_CHARS: &[char] = &['!', '^', '*', '/', '%', '+', '-', '<', '=', '>', '&', '|'];

// ── Operators ─────────────────────────────────────────────────────────────────

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Pow,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// Number of precedence tiers; see [`Operator::tier`].
const TIERS: usize = 7;

impl Operator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "^" | "**" => Operator::Pow,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "%" => Operator::Rem,
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "&&" => Operator::And,
            "||" => Operator::Or,
            _ => return None,
        })
    }

    /// Precedence tier, 0 binding tightest.
    pub fn tier(self) -> usize {
        match self {
            Operator::Pow => 0,
            Operator::Mul | Operator::Div | Operator::Rem => 1,
            Operator::Add | Operator::Sub => 2,
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => 3,
            Operator::Eq | Operator::Ne => 4,
            Operator::And => 5,
            Operator::Or => 6,
        }
    }

    pub fn apply(self, l: Value, r: Value) -> Value {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match self {
            Operator::Pow => l.arith_pow(&r),
            Operator::Mul => l.arith_mul(&r),
            Operator::Div => l.arith_div(&r),
            Operator::Rem => l.arith_rem(&r),
            Operator::Add => l.arith_add(&r),
            Operator::Sub => l.arith_sub(&r),
            Operator::Lt => Value::Bool(matches!(l.compare(&r), Some(Less))),
            Operator::Le => Value::Bool(matches!(l.compare(&r), Some(Less | Equal))),
            Operator::Gt => Value::Bool(matches!(l.compare(&r), Some(Greater))),
            Operator::Ge => Value::Bool(matches!(l.compare(&r), Some(Greater | Equal))),
            Operator::Eq => Value::Bool(l.strict_eq(&r)),
            Operator::Ne => Value::Bool(!l.strict_eq(&r)),
            Operator::And => {
                if l.is_truthy() {
                    r
                } else {
                    l
                }
            }
            Operator::Or => {
                if l.is_truthy() {
                    l
                } else {
                    r
                }
            }
        }
    }
}

/// A unary prefix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Not,
    Negate,
}

impl Prefix {
    fn symbol(self) -> &'static str {
        match self {
            Prefix::Not => "!",
            Prefix::Negate => "-",
        }
    }

    pub fn apply(self, v: Value) -> Value {
        match self {
            Prefix::Not => v.logical_not(),
            Prefix::Negate => v.arith_neg(),
        }
    }
}

// ── Parts ─────────────────────────────────────────────────────────────────────

/// Something that resolves to a value.
pub enum Operand {
    Constant(Value),
    Reference {
        path: String,
        resolver: Arc<dyn Reference>,
    },
    Call(FunctionCall),
    Group(Expression),
}

impl Operand {
    fn resolve(&self, context: &Value) -> Result<Value, ResolveError> {
        match self {
            Operand::Constant(v) => Ok(v.clone()),
            Operand::Reference { resolver, .. } => Ok(resolver.resolve(context)?),
            Operand::Call(call) => call.invoke(context),
            Operand::Group(expr) => expr.resolve(context),
        }
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Operand::Reference { path, .. } => f.debug_tuple("Reference").field(path).finish(),
            Operand::Call(call) => fmt::Debug::fmt(call, f),
            Operand::Group(expr) => f.debug_tuple("Group").field(expr).finish(),
        }
    }
}

/// One element of a validated expression.
#[derive(Debug)]
pub enum Part {
    Operand(Operand),
    Operator(Operator),
    Prefix(Prefix),
}

// ── Expression ────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Body {
    /// The whole expression was a single constant.
    Static(Value),
    Parts(Vec<Part>),
}

/// A parsed expression.
#[derive(Debug)]
pub struct Expression {
    body: Body,
}

impl Expression {
    /// Parse `text` against `settings`.
    pub fn parse(text: &str, settings: &Settings) -> Result<Self, ParseError> {
        let mut tokens = Lexer::new(settings).tokenize(text)?;

        if matches!(tokens.as_slice(), [Token::Constant(_)]) {
            if let Some(Token::Constant(v)) = tokens.pop() {
                tracing::trace!(expr = text, "static expression");
                return Ok(Expression { body: Body::Static(v) });
            }
        }

        let parts = build_parts(tokens, settings)?;
        tracing::trace!(expr = text, parts = parts.len(), "parsed expression");
        Ok(Expression { body: Body::Parts(parts) })
    }

    /// `true` if the expression does not depend on the context.
    pub fn is_static(&self) -> bool {
        matches!(self.body, Body::Static(_))
    }

    /// Validated parts, empty for a static expression.
    pub fn parts(&self) -> &[Part] {
        match &self.body {
            Body::Static(_) => &[],
            Body::Parts(parts) => parts,
        }
    }

    pub fn resolve(&self, context: &Value) -> Result<Value, ResolveError> {
        match &self.body {
            Body::Static(v) => Ok(v.clone()),
            Body::Parts(parts) => evaluate(parts, context),
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

/// Pre-validation token. References stay raw paths until validation so a
/// reference that turns out to be a function name never reaches the
/// reference factory.
enum Token {
    Constant(Value),
    Reference(String),
    Call(FunctionCall),
    Group(Expression),
    Op(String),
    Negate,
}

#[derive(Clone, Copy)]
enum Literal {
    Quote(char),
    Bracket,
}

impl Literal {
    fn closer(self) -> char {
        match self {
            Literal::Quote(q) => q,
            Literal::Bracket => ']',
        }
    }
}

struct Lexer<'s> {
    settings: &'s Settings,
    tokens: Vec<Token>,
    current: String,
}

impl<'s> Lexer<'s> {
    fn new(settings: &'s Settings) -> Self {
        Lexer {
            settings,
            tokens: Vec::new(),
            current: String::new(),
        }
    }

    fn tokenize(mut self, text: &str) -> Result<Vec<Token>, ParseError> {
        let mut depth = 0usize;
        let mut literal: Option<Literal> = None;

        for ch in text.chars() {
            // Inside a group only parentheses matter; the raw text is handed
            // on whole.
            if depth > 0 {
                match ch {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            self.close_group()?;
                            continue;
                        }
                    }
                    _ => {}
                }
                self.current.push(ch);
                continue;
            }

            if let Some(open) = literal {
                if ch == open.closer() {
                    self.close_literal(open);
                    literal = None;
                } else {
                    self.current.push(ch);
                }
                continue;
            }

            match ch {
                ')' => return Err(ParseError::UnbalancedParentheses),
                '"' | '\'' => {
                    self.flush()?;
                    literal = Some(Literal::Quote(ch));
                }
                '[' => {
                    self.flush()?;
                    literal = Some(Literal::Bracket);
                }
                '(' => {
                    self.flush()?;
                    depth = 1;
                }
                c if OPERATOR_CHARS.contains(&c) => {
                    self.flush()?;
                    self.push_operator(c);
                }
                c if c.is_whitespace() => self.flush()?,
                c => self.current.push(c),
            }
        }

        if depth > 0 {
            return Err(ParseError::UnbalancedParentheses);
        }
        if let Some(open) = literal {
            return Err(ParseError::UnterminatedLiteral(open.closer()));
        }
        self.flush()?;

        let mut tokens = self.tokens;
        mark_negations(&mut tokens);
        Ok(tokens)
    }

    /// Classify the pending bare word.
    fn flush(&mut self) -> Result<(), ParseError> {
        if self.current.is_empty() {
            return Ok(());
        }
        let word = std::mem::take(&mut self.current);

        let token = match word.parse::<f64>() {
            Ok(n) if NUMBER_RX.is_match(&word) => Token::Constant(Value::Number(n)),
            _ => match self.settings.constant(&word) {
                Some(v) if v.is_scalar() => Token::Constant(v.clone()),
                Some(_) => return Err(ParseError::InvalidConstantType(word)),
                None => Token::Reference(word),
            },
        };
        self.tokens.push(token);
        Ok(())
    }

    fn close_literal(&mut self, open: Literal) {
        let content = std::mem::take(&mut self.current);
        self.tokens.push(match open {
            Literal::Quote(_) => Token::Constant(Value::Text(content)),
            Literal::Bracket => Token::Reference(content),
        });
    }

    /// A group directly after a reference is that reference's argument list.
    fn close_group(&mut self) -> Result<(), ParseError> {
        let raw = std::mem::take(&mut self.current);
        match self.tokens.pop() {
            Some(Token::Reference(name)) => {
                let call = FunctionCall::parse(&name, &raw, self.settings)?;
                self.tokens.push(Token::Call(call));
            }
            previous => {
                self.tokens.extend(previous);
                let group = Expression::parse(&raw, self.settings)?;
                self.tokens.push(Token::Group(group));
            }
        }
        Ok(())
    }

    /// Greedy two-character merge with the previous operator token.
    fn push_operator(&mut self, ch: char) {
        if let Some(Token::Op(prev)) = self.tokens.last_mut() {
            let mut merged = prev.clone();
            merged.push(ch);
            if Operator::from_symbol(&merged).is_some() {
                *prev = merged;
                return;
            }
        }
        self.tokens.push(Token::Op(ch.to_string()));
    }
}

/// A `-` with no operand before it is a negation.
fn mark_negations(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        let is_minus = matches!(&tokens[i], Token::Op(s) if s == "-");
        let after_operator = i == 0 || matches!(tokens[i - 1], Token::Op(_) | Token::Negate);
        if is_minus && after_operator {
            tokens[i] = Token::Negate;
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Check operand/operator alternation and bind references.
fn build_parts(tokens: Vec<Token>, settings: &Settings) -> Result<Vec<Part>, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::EmptyExpression);
    }

    let mut parts = Vec::with_capacity(tokens.len());
    let mut expect_operator = false;
    let mut dangling = String::new();

    for token in tokens {
        let operand = match token {
            Token::Op(symbol) if symbol == "!" => {
                push_prefix(&mut parts, Prefix::Not, expect_operator)?;
                dangling = symbol;
                continue;
            }
            Token::Negate => {
                push_prefix(&mut parts, Prefix::Negate, expect_operator)?;
                dangling = "-".to_owned();
                continue;
            }
            Token::Op(symbol) => {
                let op = Operator::from_symbol(&symbol)
                    .ok_or_else(|| ParseError::InvalidOperator(symbol.clone()))?;
                if !expect_operator {
                    return Err(ParseError::MisplacedOperator(symbol));
                }
                parts.push(Part::Operator(op));
                expect_operator = false;
                dangling = symbol;
                continue;
            }
            Token::Constant(v) => Operand::Constant(v),
            Token::Reference(path) => {
                let resolver = settings.reference(&path)?;
                Operand::Reference { path, resolver }
            }
            Token::Call(call) => Operand::Call(call),
            Token::Group(expr) => Operand::Group(expr),
        };
        if expect_operator {
            return Err(ParseError::MissingOperator);
        }
        parts.push(Part::Operand(operand));
        expect_operator = true;
    }

    if !expect_operator {
        return Err(ParseError::MisplacedOperator(dangling));
    }
    Ok(parts)
}

fn push_prefix(parts: &mut Vec<Part>, prefix: Prefix, expect_operator: bool) -> Result<(), ParseError> {
    if expect_operator {
        return Err(ParseError::MisplacedOperator(prefix.symbol().to_owned()));
    }
    parts.push(Part::Prefix(prefix));
    Ok(())
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Per-call working copy of one part.
enum Slot<'p> {
    Pending(&'p Operand),
    Value(Value),
    Operator(Operator),
    Prefix(Prefix),
}

impl Slot<'_> {
    fn take(self, context: &Value) -> Result<Value, ResolveError> {
        match self {
            Slot::Pending(operand) => operand.resolve(context),
            Slot::Value(v) => Ok(v),
            // Validation guarantees operators never sit in operand position.
            Slot::Operator(_) | Slot::Prefix(_) => Ok(Value::Null),
        }
    }

    fn is_operand(&self) -> bool {
        matches!(self, Slot::Pending(_) | Slot::Value(_))
    }
}

fn evaluate(parts: &[Part], context: &Value) -> Result<Value, ResolveError> {
    let mut slots: Vec<Slot<'_>> = parts
        .iter()
        .map(|part| match part {
            Part::Operand(operand) => Slot::Pending(operand),
            Part::Operator(op) => Slot::Operator(*op),
            Part::Prefix(prefix) => Slot::Prefix(*prefix),
        })
        .collect();

    // Prefix runs, left to right. Each run resolves its operand once and
    // applies the innermost prefix first, so chains like `!!x` collapse.
    let mut i = 0;
    while i < slots.len() {
        if !matches!(slots[i], Slot::Prefix(_)) {
            i += 1;
            continue;
        }
        let mut end = i;
        while matches!(slots.get(end), Some(Slot::Prefix(_))) {
            end += 1;
        }
        if !slots.get(end).is_some_and(Slot::is_operand) {
            i = end;
            continue;
        }
        let mut value = slots.remove(end).take(context)?;
        for slot in slots.drain(i..end).rev() {
            if let Slot::Prefix(prefix) = slot {
                value = prefix.apply(value);
            }
        }
        slots.insert(i, Slot::Value(value));
        i += 1;
    }

    // Binary operators now sit at every odd index.
    for tier in 0..TIERS {
        let mut i = 1;
        while i + 1 < slots.len() {
            let op = match slots[i] {
                Slot::Operator(op) if op.tier() == tier => op,
                _ => {
                    i += 2;
                    continue;
                }
            };
            let mut reduced = slots.drain(i - 1..=i + 1);
            let left = reduced.next();
            let right = reduced.nth(1);
            drop(reduced);

            let left = left.map_or(Ok(Value::Null), |s| s.take(context))?;
            let right = right.map_or(Ok(Value::Null), |s| s.take(context))?;
            slots.insert(i - 1, Slot::Value(op.apply(left, right)));
        }
    }

    match slots.pop() {
        Some(slot) => slot.take(context),
        None => Ok(Value::Null),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
