//! Core types shared by the classifier and the codec.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator key used for polymorphic payloads when none is configured explicitly.
pub const DEFAULT_CLASS_DISCRIMINATOR: &str = "#class";

/// Default name of the identifier field on a domain object.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Where custom links or meta content attaches inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Placement {
    /// Top-level `links`/`meta` of the document.
    Root,
    /// `links`/`meta` of each primary resource object.
    Data,
    /// `links`/`meta` inside each relationship entry.
    Relationships,
}

impl Placement {
    /// All placements, in wire order.
    pub const ALL: [Placement; 3] = [Placement::Root, Placement::Data, Placement::Relationships];

    /// Wire name of the placement.
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Root => "ROOT",
            Placement::Data => "DATA",
            Placement::Relationships => "RELATIONSHIPS",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a resource inside one document: `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub resource_type: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// A declared field type, as written in a schema declaration.
///
/// Understands the handful of wrappers that matter for classification:
/// `Option<T>` marks nullability, `Vec<T>`-like containers and `[T]` mark
/// collections, and `Box`/`Rc`/`Arc` are transparent. Everything else is an
/// opaque name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named(String),
    Optional(Box<TypeExpr>),
    Collection(Box<TypeExpr>),
}

/// The classification-relevant shape of a [`TypeExpr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape<'a> {
    /// A single named type, module path kept.
    Single(&'a str),
    /// A collection of a named type, module path kept.
    Collection(&'a str),
    /// Anything that cannot name a resource (maps, nested collections, ...).
    Other,
}

const COLLECTIONS: &[&str] = &["Vec", "VecDeque", "LinkedList", "HashSet", "BTreeSet", "IndexSet"];
const TRANSPARENT: &[&str] = &["Box", "Rc", "Arc"];

impl TypeExpr {
    /// Parse a type expression such as `Option<Vec<blog::Comment>>`.
    ///
    /// Returns `None` for empty or unbalanced input.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(inner) = s.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            // `[T]` and `[T; N]`
            let elem = inner.split(';').next().unwrap_or(inner);
            return Some(TypeExpr::Collection(Box::new(Self::parse(elem)?)));
        }

        let Some(open) = s.find('<') else {
            if s.contains('>') {
                return None;
            }
            return Some(TypeExpr::Named(s.to_string()));
        };

        let inner = s[open + 1..].strip_suffix('>')?;
        if !balanced(inner) {
            return None;
        }
        let head = s[..open].trim();
        match last_segment(head) {
            "Option" => Some(TypeExpr::Optional(Box::new(Self::parse(inner)?))),
            name if COLLECTIONS.contains(&name) => {
                Some(TypeExpr::Collection(Box::new(Self::parse(inner)?)))
            }
            name if TRANSPARENT.contains(&name) => Self::parse(inner),
            // Maps and user generics are carried as opaque attribute types.
            _ => Some(TypeExpr::Named(s.to_string())),
        }
    }

    /// True when the outermost wrapper is `Option`.
    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeExpr::Optional(_))
    }

    /// Strip one level of `Option`.
    pub fn non_null(&self) -> &TypeExpr {
        match self {
            TypeExpr::Optional(inner) => inner,
            other => other,
        }
    }

    pub fn shape(&self) -> TypeShape<'_> {
        match self.non_null() {
            TypeExpr::Named(name) => TypeShape::Single(name),
            TypeExpr::Collection(elem) => match elem.non_null() {
                TypeExpr::Named(name) => TypeShape::Collection(name),
                _ => TypeShape::Other,
            },
            TypeExpr::Optional(_) => TypeShape::Other,
        }
    }
}

/// Last `::`-separated segment of a path.
pub fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path).trim()
}

fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// What to do when two paths reach the same `(type, id)` with different content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first version encountered and discard later ones.
    #[default]
    KeepFirst,
    /// Fail the encode when a later version differs from the kept one.
    Reject,
}

/// Options for encoding and decoding.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Handling of conflicting `included` entries.
    pub duplicates: DuplicatePolicy,
    /// Key carrying the domain type name in polymorphic values.
    /// When set, decode writes it into every hydrated object and encode strips it.
    pub class_discriminator: Option<String>,
    /// Check the document's wire shape before decoding text input.
    pub validate_shape: bool,
}

impl CodecOptions {
    /// Default options: keep-first duplicates, no discriminator, shape validation on.
    pub fn new() -> Self {
        Self {
            duplicates: DuplicatePolicy::KeepFirst,
            class_discriminator: None,
            validate_shape: true,
        }
    }

    /// Set the duplicate policy.
    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Set the class discriminator key.
    pub fn class_discriminator(mut self, key: impl Into<String>) -> Self {
        self.class_discriminator = Some(key.into());
        self
    }

    /// Enable or disable wire-shape validation.
    pub fn validate_shape(mut self, validate: bool) -> Self {
        self.validate_shape = validate;
        self
    }
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self::new()
    }
}
