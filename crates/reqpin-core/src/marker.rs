//! Environment markers: boolean predicates that gate a requirement.
//!
//! `python_version < "3.8" and (sys_platform == "win32" or extra == "test")`

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::name::normalize_name;
use crate::specifier::Clause;
use crate::version::Version;

/// Variables a marker may reference.
pub const MARKER_VARIABLES: &[&str] = &[
    "extra",
    "implementation_name",
    "implementation_version",
    "os_name",
    "platform_machine",
    "platform_python_implementation",
    "platform_release",
    "platform_system",
    "platform_version",
    "python_full_version",
    "python_version",
    "sys_platform",
];

/// A parsed marker expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkerTree {
    Expression(MarkerExpression),
    And(Vec<MarkerTree>),
    Or(Vec<MarkerTree>),
}

/// A single `lhs op rhs` comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerExpression {
    pub lhs: MarkerValue,
    pub op: MarkerOperator,
    pub rhs: MarkerValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkerValue {
    Variable(String),
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Compatible,
    ArbitraryEqual,
    In,
    NotIn,
}

impl MarkerOperator {
    fn as_str(self) -> &'static str {
        match self {
            MarkerOperator::Equal => "==",
            MarkerOperator::NotEqual => "!=",
            MarkerOperator::LessThan => "<",
            MarkerOperator::LessThanEqual => "<=",
            MarkerOperator::GreaterThan => ">",
            MarkerOperator::GreaterThanEqual => ">=",
            MarkerOperator::Compatible => "~=",
            MarkerOperator::ArbitraryEqual => "===",
            MarkerOperator::In => "in",
            MarkerOperator::NotIn => "not in",
        }
    }
}

/// Attribute values that markers are evaluated against.
///
/// Missing attributes evaluate as the empty string. `extra` is never read
/// from here; it is bound per evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerEnvironment {
    values: BTreeMap<String, String>,
}

impl MarkerEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes derived from the platform this binary was built for, with
    /// the given interpreter version.
    pub fn host(python_version: &str) -> Self {
        let (os_name, sys_platform, platform_system) = match std::env::consts::OS {
            "windows" => ("nt", "win32", "Windows"),
            "macos" => ("posix", "darwin", "Darwin"),
            "linux" => ("posix", "linux", "Linux"),
            other => ("posix", other, other),
        };
        let short: Vec<&str> = python_version.split('.').take(2).collect();
        let full = if python_version.split('.').count() >= 3 {
            python_version.to_string()
        } else {
            format!("{}.0", short.join("."))
        };
        Self::new()
            .with("os_name", os_name)
            .with("sys_platform", sys_platform)
            .with("platform_system", platform_system)
            .with("platform_machine", std::env::consts::ARCH)
            .with("implementation_name", "cpython")
            .with("platform_python_implementation", "CPython")
            .with("python_version", short.join("."))
            .with("python_full_version", full.clone())
            .with("implementation_version", full)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl MarkerTree {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(text)?;
        let mut parser = MarkerParser {
            input: text,
            tokens,
            pos: 0,
        };
        let tree = parser.parse_or()?;
        if let Some((_, offset)) = parser.tokens.get(parser.pos) {
            return Err(ParseError::new("unexpected token in marker", text, *offset));
        }
        Ok(tree)
    }

    /// `extra == "<name>"`
    pub fn extra(name: &str) -> Self {
        MarkerTree::Expression(MarkerExpression {
            lhs: MarkerValue::Variable("extra".to_string()),
            op: MarkerOperator::Equal,
            rhs: MarkerValue::Literal(normalize_name(name).to_string()),
        })
    }

    /// Top-level conjuncts (a non-`and` tree is its own single conjunct).
    pub fn conjuncts(&self) -> Vec<&MarkerTree> {
        match self {
            MarkerTree::And(children) => children.iter().collect(),
            other => vec![other],
        }
    }

    /// Conjunction of two markers with duplicate conjuncts dropped and the
    /// rest ordered by their rendering, so `a.and(b) == b.and(a)`.
    pub fn and(&self, other: &MarkerTree) -> MarkerTree {
        let mut parts: Vec<MarkerTree> = Vec::new();
        for part in self.conjuncts().into_iter().chain(other.conjuncts()) {
            if !parts.contains(part) {
                parts.push(part.clone());
            }
        }
        parts.sort_by_cached_key(ToString::to_string);
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            MarkerTree::And(parts)
        }
    }

    /// Whether the tree mentions the `extra` variable anywhere.
    pub fn references_extra(&self) -> bool {
        match self {
            MarkerTree::Expression(expr) => [&expr.lhs, &expr.rhs]
                .iter()
                .any(|v| matches!(v, MarkerValue::Variable(name) if name == "extra")),
            MarkerTree::And(children) | MarkerTree::Or(children) => {
                children.iter().any(MarkerTree::references_extra)
            }
        }
    }

    /// Evaluate with `extra` bound to `extra` (or unset).
    pub fn evaluate(&self, env: &MarkerEnvironment, extra: Option<&str>) -> bool {
        match self {
            MarkerTree::Expression(expr) => expr.evaluate(env, extra),
            MarkerTree::And(children) => children.iter().all(|c| c.evaluate(env, extra)),
            MarkerTree::Or(children) => children.iter().any(|c| c.evaluate(env, extra)),
        }
    }

    /// True if any of the active extras (or no extra, when none are
    /// active) satisfies the marker.
    pub fn evaluate_any(&self, env: &MarkerEnvironment, extras: &[&str]) -> bool {
        if extras.is_empty() {
            self.evaluate(env, None)
        } else {
            extras.iter().any(|extra| self.evaluate(env, Some(extra)))
        }
    }
}

impl MarkerExpression {
    fn resolve(&self, value: &MarkerValue, env: &MarkerEnvironment, extra: Option<&str>) -> String {
        match value {
            MarkerValue::Literal(s) => s.clone(),
            MarkerValue::Variable(name) if name == "extra" => {
                extra.map(|e| normalize_name(e).to_string()).unwrap_or_default()
            }
            MarkerValue::Variable(name) => env.get(name).unwrap_or_default().to_string(),
        }
    }

    fn evaluate(&self, env: &MarkerEnvironment, extra: Option<&str>) -> bool {
        let lhs = self.resolve(&self.lhs, env, extra);
        let rhs = self.resolve(&self.rhs, env, extra);

        match self.op {
            MarkerOperator::In => return rhs.contains(&lhs),
            MarkerOperator::NotIn => return !rhs.contains(&lhs),
            MarkerOperator::ArbitraryEqual => return lhs == rhs,
            _ => {}
        }

        if let Ok(candidate) = Version::parse(&lhs) {
            if let Ok(clause) = Clause::parse(&format!("{}{rhs}", self.op.as_str())) {
                return clause.matches(&candidate);
            }
        }

        match self.op {
            MarkerOperator::Equal => lhs == rhs,
            MarkerOperator::NotEqual => lhs != rhs,
            MarkerOperator::LessThan => lhs < rhs,
            MarkerOperator::LessThanEqual => lhs <= rhs,
            MarkerOperator::GreaterThan => lhs > rhs,
            MarkerOperator::GreaterThanEqual => lhs >= rhs,
            _ => false,
        }
    }
}

impl FromStr for MarkerTree {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarkerTree::parse(s)
    }
}

impl fmt::Display for MarkerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerValue::Variable(name) => f.write_str(name),
            MarkerValue::Literal(s) if s.contains('"') => write!(f, "'{s}'"),
            MarkerValue::Literal(s) => write!(f, "\"{s}\""),
        }
    }
}

impl fmt::Display for MarkerExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            MarkerOperator::In | MarkerOperator::NotIn => {
                write!(f, "{} {} {}", self.lhs, self.op.as_str(), self.rhs)
            }
            _ => write!(f, "{}{}{}", self.lhs, self.op.as_str(), self.rhs),
        }
    }
}

impl fmt::Display for MarkerTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerTree::Expression(expr) => write!(f, "{expr}"),
            MarkerTree::And(children) => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|c| match c {
                        MarkerTree::Or(_) => format!("({c})"),
                        _ => c.to_string(),
                    })
                    .collect();
                f.write_str(&parts.join(" and "))
            }
            MarkerTree::Or(children) => {
                let parts: Vec<String> = children.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(" or "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Op(MarkerOperator),
    Variable(String),
    Literal(String),
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' => i += 1,
            b'(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            b'"' | b'\'' => {
                let start = i;
                let end = text[i + 1..]
                    .find(c as char)
                    .ok_or_else(|| ParseError::new("unterminated string in marker", text, start))?;
                tokens.push((Token::Literal(text[i + 1..i + 1 + end].to_string()), start));
                i += end + 2;
            }
            b'<' | b'>' | b'=' | b'!' | b'~' => {
                let (op, len) = crate::specifier::Operator::parse_prefix(&text[i..])
                    .ok_or_else(|| ParseError::new("invalid marker operator", text, i))?;
                let op = match op.as_str() {
                    "==" => MarkerOperator::Equal,
                    "===" => MarkerOperator::ArbitraryEqual,
                    "!=" => MarkerOperator::NotEqual,
                    "~=" => MarkerOperator::Compatible,
                    "<" => MarkerOperator::LessThan,
                    "<=" => MarkerOperator::LessThanEqual,
                    ">" => MarkerOperator::GreaterThan,
                    _ => MarkerOperator::GreaterThanEqual,
                };
                tokens.push((Token::Op(op), i));
                i += len;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'.')) {
                    i += 1;
                }
                let word = &text[start..i];
                let token = match word {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "in" => Token::Op(MarkerOperator::In),
                    "not" => {
                        let rest = text[i..].trim_start();
                        if !rest.starts_with("in") {
                            return Err(ParseError::new("expected `in` after `not`", text, i));
                        }
                        i = text.len() - rest.len() + 2;
                        Token::Op(MarkerOperator::NotIn)
                    }
                    name if MARKER_VARIABLES.contains(&name) => Token::Variable(name.to_string()),
                    _ => {
                        return Err(ParseError::new(
                            format!("unknown marker variable `{word}`"),
                            text,
                            start,
                        ))
                    }
                };
                tokens.push((token, start));
            }
            _ => return Err(ParseError::new("unexpected character in marker", text, i)),
        }
    }
    Ok(tokens)
}

struct MarkerParser<'a> {
    input: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl MarkerParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, o)| *o)
            .unwrap_or(self.input.len())
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<MarkerTree, ParseError> {
        let mut children = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            children.push(self.parse_and()?);
        }
        Ok(flatten(children, false))
    }

    fn parse_and(&mut self) -> Result<MarkerTree, ParseError> {
        let mut children = vec![self.parse_atom()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            children.push(self.parse_atom()?);
        }
        Ok(flatten(children, true))
    }

    fn parse_atom(&mut self) -> Result<MarkerTree, ParseError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            if self.next() != Some(Token::RParen) {
                return Err(ParseError::new("expected `)`", self.input, self.offset()));
            }
            return Ok(inner);
        }
        let lhs = self.parse_value()?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            _ => {
                self.pos -= 1;
                return Err(ParseError::new("expected a marker operator", self.input, self.offset()));
            }
        };
        let rhs = self.parse_value()?;
        let (lhs, rhs) = normalize_extra_operands(lhs, rhs);
        Ok(MarkerTree::Expression(MarkerExpression { lhs, op, rhs }))
    }

    fn parse_value(&mut self) -> Result<MarkerValue, ParseError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Variable(name)) => Ok(MarkerValue::Variable(name)),
            Some(Token::Literal(s)) => Ok(MarkerValue::Literal(s)),
            _ => Err(ParseError::new(
                "expected a marker variable or quoted string",
                self.input,
                offset,
            )),
        }
    }
}

/// Compare extras by normalized name: store the literal side normalized.
fn normalize_extra_operands(lhs: MarkerValue, rhs: MarkerValue) -> (MarkerValue, MarkerValue) {
    let is_extra = |v: &MarkerValue| matches!(v, MarkerValue::Variable(n) if n == "extra");
    let normalize = |v: MarkerValue| match v {
        MarkerValue::Literal(s) => MarkerValue::Literal(normalize_name(&s).to_string()),
        other => other,
    };
    if is_extra(&lhs) {
        (lhs, normalize(rhs))
    } else if is_extra(&rhs) {
        (normalize(lhs), rhs)
    } else {
        (lhs, rhs)
    }
}

fn flatten(children: Vec<MarkerTree>, is_and: bool) -> MarkerTree {
    if children.len() == 1 {
        return children.into_iter().next().unwrap_or(MarkerTree::And(Vec::new()));
    }
    let mut flat = Vec::new();
    for child in children {
        match (child, is_and) {
            (MarkerTree::And(inner), true) | (MarkerTree::Or(inner), false) => flat.extend(inner),
            (other, _) => flat.push(other),
        }
    }
    if is_and {
        MarkerTree::And(flat)
    } else {
        MarkerTree::Or(flat)
    }
}
