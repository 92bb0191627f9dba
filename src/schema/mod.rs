//! Structural validation of plugin documents
//!
//! A [`Schema`] is a tree of [`Rule`]s built once at startup. [`Rule::check`]
//! walks the rule tree and the value tree together and stops at the first
//! failure, reporting the path that leads to it.

mod watts;

pub use watts::SchemaRegistry;

use std::fmt;

use regex::Regex;
use serde_json::Value;

/// Runtime kind of a JSON value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl Kind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Object => "object",
        };
        f.write_str(name)
    }
}

/// One step from a parent value to a child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonPath(Vec<PathSegment>);

impl JsonPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    fn pop(&mut self) {
        self.0.pop();
    }
}

impl fmt::Display for JsonPath {
    /// Renders `conf_params[0].name`; the root renders as `$`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// A named field of an object shape
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub rule: Rule,
}

/// A node of a schema
#[derive(Debug, Clone)]
pub enum Rule {
    /// Accepts every value
    Any,
    /// Value of exactly this kind
    Typed(Kind),
    /// Value of this kind equal to the literal
    Exact(Kind, Value),
    /// String fully matched by the pattern
    Pattern(Regex),
    /// Object with named fields; extra fields are ignored
    Object(Vec<Field>),
    /// Object with free-form keys, each key and value checked
    MapOf { key: Box<Rule>, value: Box<Rule> },
    /// Array whose elements all match
    ArrayOf(Box<Rule>),
    /// At least one alternative matches
    OneOf(Vec<Rule>),
    /// Field may be absent
    Optional(Box<Rule>),
}

/// Result of validating a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Pass,
    Fail { path: JsonPath, cause: String },
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ValidationOutcome::Pass)
    }

    /// Path of the first failure; the root for a pass
    pub fn path(&self) -> JsonPath {
        match self {
            ValidationOutcome::Pass => JsonPath::root(),
            ValidationOutcome::Fail { path, .. } => path.clone(),
        }
    }

    pub fn failure(&self) -> Option<(&JsonPath, &str)> {
        match self {
            ValidationOutcome::Pass => None,
            ValidationOutcome::Fail { path, cause } => Some((path, cause)),
        }
    }
}

struct Failure(String);

type Checked = std::result::Result<(), Failure>;

impl Rule {
    pub fn string() -> Self {
        Rule::Typed(Kind::String)
    }

    pub fn bool() -> Self {
        Rule::Typed(Kind::Bool)
    }

    pub fn number() -> Self {
        Rule::Typed(Kind::Number)
    }

    pub fn exact_str(literal: &str) -> Self {
        Rule::Exact(Kind::String, Value::String(literal.to_string()))
    }

    /// Anchored pattern rule; `pattern` must match the whole string
    pub fn pattern(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{pattern})$")).map(Rule::Pattern)
    }

    pub fn object<const N: usize>(fields: [(&str, Rule); N]) -> Self {
        Rule::Object(
            fields
                .into_iter()
                .map(|(name, rule)| Field {
                    name: name.to_string(),
                    rule,
                })
                .collect(),
        )
    }

    pub fn map_of(key: Rule, value: Rule) -> Self {
        Rule::MapOf {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn array_of(element: Rule) -> Self {
        Rule::ArrayOf(Box::new(element))
    }

    pub fn optional(rule: Rule) -> Self {
        Rule::Optional(Box::new(rule))
    }

    fn expect_kind(expected: Kind, value: &Value) -> Checked {
        let found = Kind::of(value);
        if found == expected {
            Ok(())
        } else {
            Err(Failure(format!("expected {expected}, found {found}")))
        }
    }

    fn check(&self, value: &Value, path: &mut JsonPath) -> Checked {
        match self {
            Rule::Any => Ok(()),
            Rule::Typed(kind) => Self::expect_kind(*kind, value),
            Rule::Exact(kind, literal) => {
                Self::expect_kind(*kind, value)?;
                if value == literal {
                    Ok(())
                } else {
                    Err(Failure(format!("expected {literal}, found {value}")))
                }
            }
            Rule::Pattern(regex) => {
                Self::expect_kind(Kind::String, value)?;
                let text = value.as_str().unwrap_or_default();
                if regex.is_match(text) {
                    Ok(())
                } else {
                    Err(Failure(format!(
                        "'{text}' does not match {}",
                        regex.as_str()
                    )))
                }
            }
            Rule::Object(fields) => {
                let Value::Object(map) = value else {
                    return Self::expect_kind(Kind::Object, value);
                };
                for field in fields {
                    match map.get(&field.name) {
                        Some(child) => {
                            path.push(PathSegment::Key(field.name.clone()));
                            field.rule.check(child, path)?;
                            path.pop();
                        }
                        None if matches!(field.rule, Rule::Optional(_)) => {}
                        None => {
                            path.push(PathSegment::Key(field.name.clone()));
                            return Err(Failure("missing required field".to_string()));
                        }
                    }
                }
                Ok(())
            }
            Rule::MapOf { key, value: rule } => {
                let Value::Object(map) = value else {
                    return Self::expect_kind(Kind::Object, value);
                };
                for (name, child) in map {
                    path.push(PathSegment::Key(name.clone()));
                    key.check(&Value::String(name.clone()), path)
                        .map_err(|Failure(cause)| Failure(format!("invalid key: {cause}")))?;
                    rule.check(child, path)?;
                    path.pop();
                }
                Ok(())
            }
            Rule::ArrayOf(element) => {
                let Value::Array(items) = value else {
                    return Self::expect_kind(Kind::Array, value);
                };
                for (index, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    element.check(item, path)?;
                    path.pop();
                }
                Ok(())
            }
            Rule::OneOf(alternatives) => {
                let mut first: Option<(JsonPath, Failure)> = None;
                for alternative in alternatives {
                    let mut attempt = path.clone();
                    match alternative.check(value, &mut attempt) {
                        Ok(()) => return Ok(()),
                        Err(failure) => {
                            first.get_or_insert((attempt, failure));
                        }
                    }
                }
                match first {
                    Some((attempt, failure)) => {
                        *path = attempt;
                        Err(failure)
                    }
                    None => Err(Failure("no alternatives".to_string())),
                }
            }
            Rule::Optional(rule) => rule.check(value, path),
        }
    }
}

/// An immutable schema for one kind of document
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    root: Rule,
}

impl Schema {
    pub fn new(name: impl Into<String>, root: Rule) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check `value` against this schema
    pub fn validate(&self, value: &Value) -> ValidationOutcome {
        let mut path = JsonPath::root();
        match self.root.check(value, &mut path) {
            Ok(()) => ValidationOutcome::Pass,
            Err(Failure(cause)) => ValidationOutcome::Fail { path, cause },
        }
    }
}

/// Check `value` against `schema`
pub fn validate(schema: &Schema, value: &Value) -> ValidationOutcome {
    schema.validate(value)
}
