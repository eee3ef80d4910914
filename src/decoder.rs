//! Document decoding - rebuilds domain values from a normalized document.
//!
//! Every relationship linkage is resolved against an index of `included`
//! and primary `data`. Each `(type, id)` is hydrated at most once per call;
//! a reference back to a resource that is still being hydrated yields a
//! shallow copy (id, attributes, links and meta) so cyclic graphs terminate.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::document::{Document, Identifier, Linkage, PrimaryData, Relationship, ResourceObject};
use crate::error::DecodeError;
use crate::registry::Registry;
use crate::schema::{FieldDescriptor, FieldRole, ResourceSchema};
use crate::types::{Placement, ResourceKey, DEFAULT_CLASS_DISCRIMINATOR};

/// Decode single primary data of `schema`'s resource type.
///
/// # Errors
///
/// `MissingData` when `data` is null, `DataShape` when it is a list, and any
/// resolution error from the relationship graph.
pub fn decode(
    registry: &Registry,
    schema: &ResourceSchema,
    doc: &Document,
) -> Result<Value, DecodeError> {
    let ro = match &doc.data {
        PrimaryData::Single(ro) => ro,
        PrimaryData::Null => return Err(DecodeError::MissingData),
        PrimaryData::Many(_) => return Err(DecodeError::DataShape { expected: "single" }),
    };
    expect_type(schema, ro)?;

    let discriminator = registry.options().class_discriminator.as_deref();
    let mut decoder = Decoder::new(registry, doc, discriminator);
    decoder.primary(schema, ro)
}

/// Decode list primary data of `schema`'s resource type.
pub fn decode_list(
    registry: &Registry,
    schema: &ResourceSchema,
    doc: &Document,
) -> Result<Vec<Value>, DecodeError> {
    let objs = match &doc.data {
        PrimaryData::Many(objs) => objs,
        PrimaryData::Null => return Err(DecodeError::MissingData),
        PrimaryData::Single(_) => return Err(DecodeError::DataShape { expected: "list" }),
    };
    for ro in objs {
        expect_type(schema, ro)?;
    }

    let discriminator = registry.options().class_discriminator.as_deref();
    let mut decoder = Decoder::new(registry, doc, discriminator);
    objs.iter().map(|ro| decoder.primary(schema, ro)).collect()
}

/// Decode primary data whose resource objects may be of different types.
///
/// Each object's `type` picks its schema, and every hydrated value carries
/// its domain type name under the class discriminator.
pub fn decode_polymorphic(registry: &Registry, doc: &Document) -> Result<Vec<Value>, DecodeError> {
    if doc.data.is_null() {
        return Err(DecodeError::MissingData);
    }
    let discriminator = registry
        .options()
        .class_discriminator
        .as_deref()
        .unwrap_or(DEFAULT_CLASS_DISCRIMINATOR);

    let mut decoder = Decoder::new(registry, doc, Some(discriminator));
    doc.data
        .iter()
        .map(|ro| {
            let schema = registry
                .schema_for_resource_type(&ro.resource_type)
                .ok_or_else(|| DecodeError::UnknownResourceType {
                    resource_type: ro.resource_type.clone(),
                })?;
            decoder.primary(schema, ro)
        })
        .collect()
}

fn expect_type(schema: &ResourceSchema, ro: &ResourceObject) -> Result<(), DecodeError> {
    if ro.resource_type == schema.resource_type {
        Ok(())
    } else {
        Err(DecodeError::UnknownResourceType {
            resource_type: ro.resource_type.clone(),
        })
    }
}

struct Decoder<'a> {
    registry: &'a Registry,
    doc: &'a Document,
    index: HashMap<ResourceKey, &'a ResourceObject>,
    memo: HashMap<ResourceKey, Value>,
    in_progress: HashSet<ResourceKey>,
    discriminator: Option<&'a str>,
}

impl<'a> Decoder<'a> {
    fn new(registry: &'a Registry, doc: &'a Document, discriminator: Option<&'a str>) -> Self {
        let mut index = HashMap::new();
        for ro in doc.included.iter() {
            index.insert(ro.key(), ro);
        }
        for ro in doc.data.iter() {
            index.entry(ro.key()).or_insert(ro);
        }
        Self {
            registry,
            doc,
            index,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
            discriminator,
        }
    }

    /// Hydrate a primary resource and attach document-level links/meta.
    fn primary(&mut self, schema: &'a ResourceSchema, ro: &'a ResourceObject) -> Result<Value, DecodeError> {
        let mut value = self.hydrate(schema, ro)?;
        if let Value::Object(obj) = &mut value {
            write_back(obj, schema.links_field(Placement::Root), self.doc.links.clone());
            write_back(obj, schema.meta_field(Placement::Root), self.doc.meta.clone());
        }
        Ok(value)
    }

    fn hydrate(&mut self, schema: &'a ResourceSchema, ro: &'a ResourceObject) -> Result<Value, DecodeError> {
        let key = ro.key();
        if let Some(value) = self.memo.get(&key) {
            return Ok(value.clone());
        }
        if self.in_progress.contains(&key) {
            tracing::debug!(%key, "cycle detected, using shallow copy");
            return Ok(Value::Object(self.shallow(schema, ro)));
        }

        self.in_progress.insert(key.clone());
        let mut obj = self.base(schema, ro);
        for field in &schema.fields {
            match &field.role {
                FieldRole::ToOne(target) => {
                    let value = self.to_one(schema, field, target, ro)?;
                    obj.insert(field.name.clone(), value);
                }
                FieldRole::ToMany(target) => {
                    let value = self.to_many(schema, field, target, ro)?;
                    obj.insert(field.name.clone(), value);
                }
                FieldRole::Links(Placement::Relationships) => {
                    let links = per_relationship(ro, |rel| rel.links.as_ref());
                    write_back(&mut obj, Some(field), links);
                }
                FieldRole::Meta(Placement::Relationships) => {
                    let meta = per_relationship(ro, |rel| rel.meta.as_ref());
                    write_back(&mut obj, Some(field), meta);
                }
                _ => {}
            }
        }
        self.in_progress.remove(&key);

        let value = Value::Object(obj);
        self.memo.insert(key, value.clone());
        Ok(value)
    }

    /// Id, attributes, data-placed links/meta and the discriminator.
    fn base(&self, schema: &ResourceSchema, ro: &ResourceObject) -> Map<String, Value> {
        let mut obj = Map::new();
        obj.insert(schema.id_field.clone(), Value::String(ro.id.clone()));
        for field in schema.attributes() {
            let value = ro
                .attributes
                .get(&field.name)
                .cloned()
                .or_else(|| field.default.clone());
            if let Some(value) = value {
                obj.insert(field.name.clone(), value);
            }
        }
        write_back(&mut obj, schema.links_field(Placement::Data), ro.links.clone());
        write_back(&mut obj, schema.meta_field(Placement::Data), ro.meta.clone());
        if let Some(discriminator) = self.discriminator {
            obj.insert(discriminator.to_string(), Value::String(schema.type_name.clone()));
        }
        obj
    }

    fn shallow(&self, schema: &ResourceSchema, ro: &ResourceObject) -> Map<String, Value> {
        let mut obj = self.base(schema, ro);
        for field in schema.relationships() {
            match field.role {
                FieldRole::ToMany(_) => {
                    obj.insert(field.name.clone(), Value::Array(Vec::new()));
                }
                _ if field.nullable => {
                    obj.insert(field.name.clone(), Value::Null);
                }
                _ => {}
            }
        }
        obj
    }

    fn to_one(
        &mut self,
        owner: &ResourceSchema,
        field: &FieldDescriptor,
        target: &str,
        ro: &'a ResourceObject,
    ) -> Result<Value, DecodeError> {
        let linkage = ro.relationships.get(&field.name).and_then(|rel| rel.data.as_ref());
        match linkage {
            Some(Linkage::One(Some(identifier))) => Ok(self
                .resolve(field, target, identifier)?
                .unwrap_or(Value::Null)),
            Some(Linkage::Many(_)) => Err(DecodeError::LinkageShape {
                field: field.name.clone(),
                expected: "to-one",
            }),
            None | Some(Linkage::One(None)) if field.nullable => Ok(Value::Null),
            // Absent relationship or a links-only one without `data`.
            None | Some(Linkage::One(None)) => Err(DecodeError::MissingRelationship {
                resource_type: owner.resource_type.clone(),
                field: field.name.clone(),
            }),
        }
    }

    fn to_many(
        &mut self,
        owner: &ResourceSchema,
        field: &FieldDescriptor,
        target: &str,
        ro: &'a ResourceObject,
    ) -> Result<Value, DecodeError> {
        let linkage = ro.relationships.get(&field.name).and_then(|rel| rel.data.as_ref());
        let identifiers = match linkage {
            Some(Linkage::Many(identifiers)) => identifiers,
            Some(Linkage::One(Some(_))) => {
                return Err(DecodeError::LinkageShape {
                    field: field.name.clone(),
                    expected: "to-many",
                })
            }
            None | Some(Linkage::One(None)) if field.nullable => return Ok(Value::Null),
            None => return Ok(Value::Array(Vec::new())),
            Some(Linkage::One(None)) => {
                return Err(DecodeError::MissingRelationship {
                    resource_type: owner.resource_type.clone(),
                    field: field.name.clone(),
                })
            }
        };

        let mut items = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            if let Some(value) = self.resolve(field, target, identifier)? {
                items.push(value);
            }
        }
        Ok(Value::Array(items))
    }

    /// Resolve one linkage entry. `None` means a nullable field points at a
    /// resource the document does not carry.
    fn resolve(
        &mut self,
        field: &FieldDescriptor,
        target: &str,
        identifier: &Identifier,
    ) -> Result<Option<Value>, DecodeError> {
        let registry = self.registry;
        let target_schema =
            registry
                .schema(target)
                .ok_or_else(|| DecodeError::UnknownResourceType {
                    resource_type: identifier.resource_type.clone(),
                })?;
        if identifier.resource_type != target_schema.resource_type {
            return Err(DecodeError::TypeMismatch {
                field: field.name.clone(),
                expected: target_schema.resource_type.clone(),
                found: identifier.resource_type.clone(),
            });
        }

        let key = identifier.key();
        match self.index.get(&key).copied() {
            Some(ro) => self.hydrate(target_schema, ro).map(Some),
            None if field.nullable => {
                tracing::warn!(field = %field.name, %key, "unresolved reference on nullable field");
                Ok(None)
            }
            None => Err(DecodeError::UnresolvedReference {
                field: field.name.clone(),
                resource_type: key.resource_type,
                id: key.id,
            }),
        }
    }
}

/// Store `content` under the field's name, or `null` for a nullable field
/// without content.
fn write_back(obj: &mut Map<String, Value>, field: Option<&FieldDescriptor>, content: Option<Value>) {
    let Some(field) = field else { return };
    match content {
        Some(content) => {
            obj.insert(field.name.clone(), content);
        }
        None if field.nullable => {
            obj.insert(field.name.clone(), Value::Null);
        }
        None => {}
    }
}

fn per_relationship(
    ro: &ResourceObject,
    pick: impl Fn(&Relationship) -> Option<&Value>,
) -> Option<Value> {
    let map: Map<String, Value> = ro
        .relationships
        .iter()
        .filter_map(|(name, rel)| pick(rel).map(|v| (name.clone(), v.clone())))
        .collect();
    (!map.is_empty()).then_some(Value::Object(map))
}
