//! Document envelope - the normalized wire model.
//!
//! A [`Document`] carries primary `data` (null, one resource object or many),
//! the deduplicated `included` side-list, and optional top-level `links`,
//! `meta` and `errors`. Serialization follows the JSON:API member names.

use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ResourceKey;

/// A `(type, id)` pair used as relationship linkage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl Identifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_type.clone(), self.id.clone())
    }
}

/// Relationship linkage: a single (possibly null) identifier or an ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Many(Vec<Identifier>),
    One(Option<Identifier>),
}

/// One entry of a resource object's `relationships` member.
///
/// `data` is `None` when the member is absent (a links-only relationship),
/// and `Some(Linkage::One(None))` for an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Linkage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Relationship {
    pub fn new(data: Linkage) -> Self {
        Self {
            data: Some(data),
            links: None,
            meta: None,
        }
    }
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Linkage>, D::Error> {
    Linkage::deserialize(deserializer).map(Some)
}

/// The canonical unit of data: a typed, identified bundle of attributes and
/// relationship linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub relationships: IndexMap<String, Relationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ResourceObject {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: Map::new(),
            relationships: IndexMap::new(),
            links: None,
            meta: None,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_type.clone(), self.id.clone())
    }
}

/// Primary data of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PrimaryData {
    #[default]
    Null,
    Single(Box<ResourceObject>),
    Many(Vec<ResourceObject>),
}

impl PrimaryData {
    pub fn is_null(&self) -> bool {
        matches!(self, PrimaryData::Null)
    }

    /// Primary resource objects in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResourceObject> {
        match self {
            PrimaryData::Null => (&[] as &[ResourceObject]).iter(),
            PrimaryData::Single(obj) => std::slice::from_ref(&**obj).iter(),
            PrimaryData::Many(objs) => objs.iter(),
        }
    }
}

impl Serialize for PrimaryData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PrimaryData::Null => serializer.serialize_none(),
            PrimaryData::Single(obj) => obj.serialize(serializer),
            PrimaryData::Many(objs) => objs.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PrimaryData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Many(Vec<ResourceObject>),
            Single(Box<ResourceObject>),
        }

        Ok(match Option::<Repr>::deserialize(deserializer)? {
            None => PrimaryData::Null,
            Some(Repr::Single(obj)) => PrimaryData::Single(obj),
            Some(Repr::Many(objs)) => PrimaryData::Many(objs),
        })
    }
}

/// Insertion-ordered set of resource objects, unique by `(type, id)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Included {
    entries: IndexMap<ResourceKey, ResourceObject>,
}

impl Included {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already present.
    ///
    /// Returns `false` (and drops `obj`) when an entry with the same
    /// `(type, id)` exists; the first version is kept.
    pub fn insert(&mut self, obj: ResourceObject) -> bool {
        let key = obj.key();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, obj);
        true
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceObject> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceObject> {
        self.entries.values()
    }
}

impl FromIterator<ResourceObject> for Included {
    fn from_iter<I: IntoIterator<Item = ResourceObject>>(iter: I) -> Self {
        let mut included = Included::new();
        for obj in iter {
            let key = obj.key();
            if !included.insert(obj) {
                tracing::warn!(%key, "duplicate included resource dropped");
            }
        }
        included
    }
}

impl Serialize for Included {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for obj in self.entries.values() {
            seq.serialize_element(obj)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Included {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let objs = Vec::<ResourceObject>::deserialize(deserializer)?;
        Ok(objs.into_iter().collect())
    }
}

/// A complete resource-graph document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Included::is_empty")]
    pub included: Included,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Value>>,
}

impl Document {
    /// Document carrying only errors.
    pub fn from_errors(errors: Vec<Value>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::default()
        }
    }

    /// Error objects, empty when the document has none.
    pub fn errors(&self) -> &[Value] {
        self.errors.as_deref().unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    /// Primary data followed by included resources.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceObject> {
        self.data.iter().chain(self.included.iter())
    }
}
