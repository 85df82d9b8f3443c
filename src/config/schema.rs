//! Option schema definitions.
//!
//! # Responsibilities
//! - Describe every recognized option: shape, default and validation rule
//! - Nest groups of options (e.g. experimental flags) as schemas of their own
//! - Reject inconsistent declarations when the schema is built
//!
//! # Design Decisions
//! - A schema is immutable once built; there is no API to add options later
//! - Top-level options must have defaults so a resolved configuration always
//!   contains every key; group members may omit one and are then present only
//!   when some layer sets them
//! - Shapes are plain data so error messages can describe them

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::config::error::SchemaError;
use crate::config::layer::LayerOrigin;
use crate::config::validation::check_option;

/// Extra validation applied after the shape check. `Err` carries what was expected.
pub type Rule = fn(&Value) -> Result<(), String>;

/// Expected shape of an option value.
#[derive(Debug, Clone)]
pub enum Shape {
    Bool,
    /// Integer, optionally bounded (inclusive).
    Integer { min: Option<i64>, max: Option<i64> },
    String,
    /// String restricted to a fixed set of legal values.
    Enum(Vec<String>),
    /// Homogeneous list; replaced wholesale when merged.
    List(Box<Shape>),
    /// Free-form table; merged deeply, contents not validated.
    Table,
    /// Nested options, validated and merged per key.
    Group(OptionSchema),
    /// Any of the listed shapes.
    AnyOf(Vec<Shape>),
}

impl Shape {
    /// Human readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Shape::Bool => "a boolean".to_string(),
            Shape::Integer { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => format!("an integer between {} and {}", lo, hi),
                (Some(lo), None) => format!("an integer >= {}", lo),
                (None, Some(hi)) => format!("an integer <= {}", hi),
                (None, None) => "an integer".to_string(),
            },
            Shape::String => "a string".to_string(),
            Shape::Enum(legal) => {
                let quoted: Vec<String> = legal.iter().map(|l| format!("{:?}", l)).collect();
                format!("one of {}", quoted.join(", "))
            }
            Shape::List(inner) => format!("a list of {}", inner.describe_plural()),
            Shape::Table => "a table".to_string(),
            Shape::Group(_) => "a table of options".to_string(),
            Shape::AnyOf(shapes) => {
                let parts: Vec<String> = shapes.iter().map(Shape::describe).collect();
                parts.join(" or ")
            }
        }
    }

    fn describe_plural(&self) -> String {
        match self {
            Shape::Bool => "booleans".to_string(),
            Shape::String => "strings".to_string(),
            Shape::Table => "tables".to_string(),
            Shape::Integer { .. } => "integers".to_string(),
            other => format!("({})", other.describe()),
        }
    }

    /// Legal values of an enumerated shape, empty for every other shape.
    pub fn legal_values(&self) -> Vec<String> {
        match self {
            Shape::Enum(legal) => legal.clone(),
            Shape::AnyOf(shapes) => shapes.iter().flat_map(Shape::legal_values).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether two object values under this shape are merged key by key.
    pub(crate) fn merges_tables(&self) -> bool {
        match self {
            Shape::Table | Shape::Group(_) => true,
            Shape::AnyOf(shapes) => shapes.iter().any(Shape::merges_tables),
            _ => false,
        }
    }
}

/// Declaration of a single option.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    shape: Shape,
    default: Option<Value>,
    rule: Option<Rule>,
    description: String,
}

impl OptionSpec {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            default: None,
            rule: None,
            description: String::new(),
        }
    }

    pub fn boolean() -> Self {
        Self::new(Shape::Bool)
    }

    pub fn integer() -> Self {
        Self::new(Shape::Integer {
            min: None,
            max: None,
        })
    }

    pub fn integer_in(min: i64, max: i64) -> Self {
        Self::new(Shape::Integer {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn string() -> Self {
        Self::new(Shape::String)
    }

    pub fn one_of<I, S>(legal: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Shape::Enum(legal.into_iter().map(Into::into).collect()))
    }

    pub fn list(item: Shape) -> Self {
        Self::new(Shape::List(Box::new(item)))
    }

    pub fn table() -> Self {
        Self::new(Shape::Table)
    }

    pub fn any_of(shapes: Vec<Shape>) -> Self {
        Self::new(Shape::AnyOf(shapes))
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn validation_rule(&self) -> Option<Rule> {
        self.rule
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Default value. Groups default to the table of their members' defaults.
    pub fn default_value(&self) -> Option<Value> {
        match &self.shape {
            Shape::Group(members) => Some(Value::Object(members.defaults())),
            _ => self.default.clone(),
        }
    }
}

/// Catalog of recognized options.
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    options: BTreeMap<String, OptionSpec>,
}

impl OptionSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options.get(name)
    }

    /// Look up a dotted path such as `experimental.turbo`.
    pub fn lookup(&self, path: &str) -> Option<&OptionSpec> {
        let mut segments = path.split('.');
        let mut spec = self.get(segments.next()?)?;
        for segment in segments {
            match &spec.shape {
                Shape::Group(members) => spec = members.get(segment)?,
                _ => return None,
            }
        }
        Some(spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &OptionSpec)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Table of every option that has a default.
    pub fn defaults(&self) -> Map<String, Value> {
        self.options
            .iter()
            .filter_map(|(name, spec)| spec.default_value().map(|v| (name.clone(), v)))
            .collect()
    }
}

enum Entry {
    Option(OptionSpec),
    Group(SchemaBuilder, String),
}

/// Collects option declarations and checks them on [`build`](SchemaBuilder::build).
#[derive(Default)]
pub struct SchemaBuilder {
    entries: Vec<(String, Entry)>,
}

impl SchemaBuilder {
    pub fn option(mut self, name: impl Into<String>, spec: OptionSpec) -> Self {
        self.entries.push((name.into(), Entry::Option(spec)));
        self
    }

    /// Declare a nested group. Members may omit defaults.
    pub fn group(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        members: SchemaBuilder,
    ) -> Self {
        self.entries
            .push((name.into(), Entry::Group(members, description.into())));
        self
    }

    pub fn build(self) -> Result<OptionSchema, SchemaError> {
        self.build_at("", true)
    }

    fn build_at(self, prefix: &str, require_defaults: bool) -> Result<OptionSchema, SchemaError> {
        let mut seen = HashSet::new();
        let mut options = BTreeMap::new();

        for (name, entry) in self.entries {
            let path = join_path(prefix, &name);
            if name.is_empty() || name.contains('.') {
                return Err(SchemaError::InvalidName(path));
            }
            if !seen.insert(name.clone()) {
                return Err(SchemaError::DuplicateOption(path));
            }

            let spec = match entry {
                Entry::Group(members, description) => {
                    let members = members.build_at(&path, false)?;
                    OptionSpec::new(Shape::Group(members)).describe(description)
                }
                Entry::Option(spec) => {
                    check_declaration(&path, &spec, require_defaults)?;
                    spec
                }
            };
            options.insert(name, spec);
        }

        Ok(OptionSchema { options })
    }
}

fn check_declaration(path: &str, spec: &OptionSpec, require_default: bool) -> Result<(), SchemaError> {
    if let Shape::Enum(legal) = &spec.shape {
        if legal.is_empty() {
            return Err(SchemaError::EmptyEnum(path.to_string()));
        }
    }

    match &spec.default {
        Some(default) => check_option(spec, default, path, &LayerOrigin::Default).map_err(|e| SchemaError::InvalidDefault {
                key: path.to_string(),
                reason: e.to_string(),
            }),
        None if require_default => Err(SchemaError::MissingDefault(path.to_string())),
        None => Ok(()),
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
