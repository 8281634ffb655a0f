//! `%{...}` interpolation in data values.
//!
//! An expression is either a bare variable reference (`%{osfamily}`,
//! `%{facts.os.family}`) or a method call with one quoted argument:
//!
//! | method            | result                                              |
//! |-------------------|-----------------------------------------------------|
//! | `lookup`, `hiera` | value of a nested lookup, stringified               |
//! | `alias`           | value of a nested lookup, replacing the whole string |
//! | `scope`           | variable from overrides, scope, then defaults       |
//! | `literal`         | the argument text itself                            |
//!
//! `%{}` and `%{::}` expand to nothing, so `%%{}{x}` yields `%{x}`.

use crate::error::{LookupError, LookupResult};
use crate::invocation::Invocation;
use crate::key::{Segment, dig, split_key};
use crate::scope::variable_name;
use regex_lite::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Interpolation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMethod {
    Lookup,
    Alias,
    Scope,
    Literal,
}

impl InterpolationMethod {
    /// Method names and the method each one selects.
    pub const TABLE: [(&'static str, InterpolationMethod); 5] = [
        ("lookup", InterpolationMethod::Lookup),
        ("hiera", InterpolationMethod::Lookup),
        ("alias", InterpolationMethod::Alias),
        ("scope", InterpolationMethod::Scope),
        ("literal", InterpolationMethod::Literal),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InterpolationMethod::Lookup => "lookup",
            InterpolationMethod::Alias => "alias",
            InterpolationMethod::Scope => "scope",
            InterpolationMethod::Literal => "literal",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A parsed `%{...}` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expression {
    /// `%{}`, `%{::}` and their quoted forms.
    Empty,
    Call(InterpolationMethod, String),
}

/// Resolves `%{...}` expressions. Built once and shared by every provider.
#[derive(Debug)]
pub struct Interpolator {
    methods: HashMap<&'static str, InterpolationMethod>,
    token: Regex,
    call: Regex,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpolator {
    pub fn new() -> Self {
        Self {
            methods: InterpolationMethod::TABLE.into_iter().collect(),
            token: Regex::new(r"%\{([^}]*)\}").expect("valid interpolation token pattern"),
            call: Regex::new(r"^(\w+)\((.*)\)$").expect("valid method call pattern"),
        }
    }

    /// Interpolate every string reachable from `value`.
    ///
    /// Mapping keys are left as they are. With `allow_methods` false only bare
    /// variable references are accepted.
    pub fn interpolate(
        &self,
        value: &Value,
        invocation: &mut Invocation<'_>,
        allow_methods: bool,
    ) -> LookupResult<Value> {
        match value {
            Value::String(subject) => self.interpolate_str(subject, invocation, allow_methods),
            Value::Array(items) => items
                .iter()
                .map(|item| self.interpolate(item, invocation, allow_methods))
                .collect::<LookupResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.interpolate(item, invocation, allow_methods)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Interpolate one string.
    ///
    /// The result is a string unless the subject is a single `alias`
    /// expression, in which case it is the aliased value itself.
    pub fn interpolate_str(
        &self,
        subject: &str,
        invocation: &mut Invocation<'_>,
        allow_methods: bool,
    ) -> LookupResult<Value> {
        if !subject.contains("%{") {
            return Ok(Value::String(subject.to_string()));
        }

        let mut out = String::with_capacity(subject.len());
        let mut last = 0;
        for caps in self.token.captures_iter(subject) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let expr = caps.get(1).map_or("", |m| m.as_str());
            out.push_str(&subject[last..whole.start()]);
            last = whole.end();

            let (method, key) = match self.parse(subject, expr, allow_methods)? {
                Expression::Empty => continue,
                Expression::Call(method, key) => (method, key),
            };
            trace!(subject, method = method.name(), key = key.as_str(), "interpolating");

            if method == InterpolationMethod::Alias {
                if whole.start() != 0 || whole.end() != subject.len() {
                    return Err(LookupError::interpolation(
                        subject,
                        "'alias' interpolation is only permitted if the expression is equal to the entire string",
                    ));
                }
                let value = invocation.adapter().lookup(&key, invocation, None)?;
                return Ok(value.unwrap_or(Value::Null));
            }

            let value = match method {
                InterpolationMethod::Literal => Some(Value::String(key)),
                InterpolationMethod::Lookup => invocation.adapter().lookup(&key, invocation, None)?,
                _ => self.resolve_variable(subject, &key, invocation, allow_methods)?,
            };
            if let Some(value) = value {
                out.push_str(&to_text(&value));
            }
        }
        out.push_str(&subject[last..]);
        Ok(Value::String(out))
    }

    fn parse(&self, subject: &str, expr: &str, allow_methods: bool) -> LookupResult<Expression> {
        let expr = expr.trim();
        if matches!(expr, "" | "::" | "\"\"" | "''" | "\"::\"" | "'::'") {
            return Ok(Expression::Empty);
        }

        let Some(caps) = self.call.captures(expr) else {
            return Ok(Expression::Call(InterpolationMethod::Scope, expr.to_string()));
        };
        let name = caps.get(1).map_or("", |m| m.as_str());
        let argument = caps.get(2).map_or("", |m| m.as_str()).trim();

        if !allow_methods {
            return Err(LookupError::interpolation(
                subject,
                "Interpolation using method syntax is not allowed in this context",
            ));
        }
        let method = *self
            .methods
            .get(name)
            .ok_or_else(|| LookupError::unknown_method(name))?;

        let quote = argument.chars().next();
        let unquoted = match quote {
            Some(q @ ('\'' | '"')) if argument.len() >= 2 && argument.ends_with(q) => {
                &argument[1..argument.len() - 1]
            }
            _ => return Err(syntax_error(subject)),
        };
        Ok(Expression::Call(method, unquoted.to_string()))
    }

    /// Resolve a (possibly dotted) variable reference.
    fn resolve_variable(
        &self,
        subject: &str,
        key: &str,
        invocation: &mut Invocation<'_>,
        allow_methods: bool,
    ) -> LookupResult<Option<Value>> {
        let mut segments = split_key(key).map_err(|_| syntax_error(subject))?;
        let root = match segments.remove(0) {
            Segment::Name(name) => name,
            Segment::Index(index) => index.to_string(),
        };
        let name = variable_name(&root);

        let found = invocation
            .override_value(name)
            .cloned()
            .or_else(|| invocation.scope().get(name))
            .or_else(|| invocation.default_value(name).cloned());

        let Some(value) = found else {
            if invocation.strict_variables() {
                return Err(LookupError::interpolation(
                    subject,
                    format!("Undefined variable '{}'", name),
                ));
            }
            trace!(variable = name, "undefined variable interpolates as empty");
            return Ok(None);
        };

        let value = match value {
            Value::String(ref text) if text.contains("%{") => {
                let entry = format!("scope('{}')", name);
                invocation.guard(&entry, |inv| self.interpolate_str(text, inv, allow_methods))?
            }
            other => other,
        };
        dig(key, value, &segments)
    }
}

fn syntax_error(subject: &str) -> LookupError {
    LookupError::interpolation(subject, format!("Syntax error in string: {}", subject))
}

/// Text form of an interpolated value.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
