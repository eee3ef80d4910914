//! Schema declarations and the classified descriptors built from them.
//!
//! A [`ResourceDecl`] is what the caller supplies: a domain type name, its
//! JSON:API resource type and an ordered field list. The classifier turns a
//! set of declarations into [`ResourceSchema`]s, which the codec reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Placement, DEFAULT_ID_FIELD};

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

/// Explicit role for a declared field, bypassing type inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum DeclaredRole {
    Attribute,
    ToOne(String),
    ToMany(String),
}

/// A single declared field of a domain type.
///
/// Either `type_expr` (a declared type such as `Option<Person>`) or `role`
/// should be set. When both are present, `role` wins and `type_expr` only
/// contributes nullability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<DeclaredRole>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDecl {
    /// Field with a declared type; the classifier decides its role.
    pub fn typed(name: impl Into<String>, type_expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_expr: Some(type_expr.into()),
            role: None,
            nullable: false,
            default: None,
        }
    }

    /// Plain attribute.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::with_role(name, DeclaredRole::Attribute)
    }

    /// To-one relationship to the domain type `target`.
    pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_role(name, DeclaredRole::ToOne(target.into()))
    }

    /// To-many relationship to the domain type `target`.
    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_role(name, DeclaredRole::ToMany(target.into()))
    }

    fn with_role(name: impl Into<String>, role: DeclaredRole) -> Self {
        Self {
            name: name.into(),
            type_expr: None,
            role: Some(role),
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Declaration of one domain type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Stable domain type identity (e.g. `Article`).
    pub type_name: String,
    /// JSON:API `type` discriminator (e.g. `articles`).
    pub resource_type: String,
    /// Field of the domain object holding the resource id.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl ResourceDecl {
    pub fn new(type_name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            resource_type: resource_type.into(),
            id_field: default_id_field(),
            fields: Vec::new(),
        }
    }

    /// Use a different id field than `id`.
    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = name.into();
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}

/// Binds a custom links or meta type to a resource type at a placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDecl {
    pub resource_type: String,
    pub placement: Placement,
    pub type_name: String,
}

impl BindingDecl {
    pub fn new(
        resource_type: impl Into<String>,
        placement: Placement,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            placement,
            type_name: type_name.into(),
        }
    }
}

/// On-disk schema file: every declaration needed to build a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<BindingDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<BindingDecl>,
}

/// Classified role of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", content = "target", rename_all = "snake_case")]
pub enum FieldRole {
    /// Plain value carried in `attributes`.
    Attribute,
    /// Single related resource of the named domain type.
    ToOne(String),
    /// Ordered related resources of the named domain type.
    ToMany(String),
    /// Custom links content attached at a placement.
    Links(Placement),
    /// Custom meta content attached at a placement.
    Meta(Placement),
}

impl FieldRole {
    pub fn is_relationship(&self) -> bool {
        matches!(self, FieldRole::ToOne(_) | FieldRole::ToMany(_))
    }
}

/// Immutable description of one classified field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub role: FieldRole,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Which custom links types a resource type uses, per placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinksInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_links: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_object_links: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships_links: Option<String>,
}

impl LinksInfo {
    /// Set the links type for a placement, replacing any earlier binding.
    pub fn set(&mut self, placement: Placement, type_name: impl Into<String>) {
        let slot = match placement {
            Placement::Root => &mut self.root_links,
            Placement::Data => &mut self.resource_object_links,
            Placement::Relationships => &mut self.relationships_links,
        };
        *slot = Some(type_name.into());
    }

    pub fn get(&self, placement: Placement) -> Option<&str> {
        match placement {
            Placement::Root => self.root_links.as_deref(),
            Placement::Data => self.resource_object_links.as_deref(),
            Placement::Relationships => self.relationships_links.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Placement::ALL.iter().all(|p| self.get(*p).is_none())
    }
}

/// Which custom meta types a resource type uses, per placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetaInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_meta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_object_meta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships_meta: Option<String>,
}

impl MetaInfo {
    pub fn set(&mut self, placement: Placement, type_name: impl Into<String>) {
        let slot = match placement {
            Placement::Root => &mut self.root_meta,
            Placement::Data => &mut self.resource_object_meta,
            Placement::Relationships => &mut self.relationships_meta,
        };
        *slot = Some(type_name.into());
    }

    pub fn get(&self, placement: Placement) -> Option<&str> {
        match placement {
            Placement::Root => self.root_meta.as_deref(),
            Placement::Data => self.resource_object_meta.as_deref(),
            Placement::Relationships => self.relationships_meta.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Placement::ALL.iter().all(|p| self.get(*p).is_none())
    }
}

/// Classified, immutable schema of one domain type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub type_name: String,
    pub resource_type: String,
    pub id_field: String,
    pub fields: Vec<FieldDescriptor>,
    #[serde(skip_serializing_if = "LinksInfo::is_empty")]
    pub links: LinksInfo,
    #[serde(skip_serializing_if = "MetaInfo::is_empty")]
    pub meta: MetaInfo,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| matches!(f.role, FieldRole::Attribute))
    }

    pub fn to_one(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| matches!(f.role, FieldRole::ToOne(_)))
    }

    pub fn to_many(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| matches!(f.role, FieldRole::ToMany(_)))
    }

    /// Both relationship buckets, in declaration order.
    pub fn relationships(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.role.is_relationship())
    }

    /// Field carrying custom links at `placement`.
    pub fn links_field(&self, placement: Placement) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.role == FieldRole::Links(placement))
    }

    /// Field carrying custom meta at `placement`.
    pub fn meta_field(&self, placement: Placement) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.role == FieldRole::Meta(placement))
    }
}
