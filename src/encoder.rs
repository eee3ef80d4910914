//! Document encoding - turns domain values into a normalized document.
//!
//! Attributes are copied verbatim, relationships become `(type, id)`
//! linkage, and every direct relationship target is flattened into
//! `included` exactly once.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::document::{Document, Identifier, Included, Linkage, PrimaryData, Relationship, ResourceObject};
use crate::error::EncodeError;
use crate::registry::Registry;
use crate::schema::{FieldDescriptor, FieldRole, ResourceSchema};
use crate::types::{json_type_name, DuplicatePolicy, Placement, ResourceKey, DEFAULT_CLASS_DISCRIMINATOR};

/// Encode a single domain value.
///
/// # Errors
///
/// Returns `EncodeError` if the value is not an object, lacks an id, or has a
/// null non-nullable to-one relationship.
pub fn encode(
    registry: &Registry,
    schema: &ResourceSchema,
    value: &Value,
) -> Result<Document, EncodeError> {
    let item = as_object(schema, value)?;
    Encoder::new(registry).run(&[(schema, item)], Shape::Single)
}

/// Encode a homogeneous list of domain values.
pub fn encode_list(
    registry: &Registry,
    schema: &ResourceSchema,
    values: &[Value],
) -> Result<Document, EncodeError> {
    let items = values
        .iter()
        .map(|v| as_object(schema, v).map(|obj| (schema, obj)))
        .collect::<Result<Vec<_>, _>>()?;
    Encoder::new(registry).run(&items, Shape::Many)
}

/// Encode a list of values of different domain types.
///
/// Each value names its domain type under the configured class
/// discriminator (`#class` when none is configured).
pub fn encode_polymorphic(registry: &Registry, values: &[Value]) -> Result<Document, EncodeError> {
    let discriminator = registry
        .options()
        .class_discriminator
        .as_deref()
        .unwrap_or(DEFAULT_CLASS_DISCRIMINATOR);

    let mut items = Vec::with_capacity(values.len());
    for value in values {
        let schema = value
            .get(discriminator)
            .and_then(Value::as_str)
            .and_then(|name| registry.schema(name))
            .ok_or_else(|| EncodeError::UnknownDiscriminator {
                discriminator: discriminator.to_string(),
            })?;
        items.push((schema, as_object(schema, value)?));
    }
    Encoder::new(registry).run(&items, Shape::Many)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Shape {
    Single,
    Many,
}

/// Whether related targets of a resource are flattened into `included`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Hop {
    Primary,
    Related,
}

type Item<'v> = (&'v ResourceSchema, &'v Map<String, Value>);

struct Encoder<'r> {
    registry: &'r Registry,
    primary: HashSet<ResourceKey>,
    /// Related copies of resources that are also primary data, checked once
    /// every primary object is built.
    shadowed: Vec<ResourceObject>,
    included: Included,
}

impl<'r> Encoder<'r> {
    fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            primary: HashSet::new(),
            shadowed: Vec::new(),
            included: Included::new(),
        }
    }

    fn run(mut self, items: &[Item<'_>], shape: Shape) -> Result<Document, EncodeError> {
        for (schema, obj) in items {
            let id = extract_id(schema, obj)?;
            self.primary
                .insert(ResourceKey::new(schema.resource_type.clone(), id));
        }

        let mut data = Vec::with_capacity(items.len());
        let mut links = None;
        let mut meta = None;
        for (schema, obj) in items {
            data.push(self.resource_object(schema, obj, Hop::Primary)?);
            if links.is_none() {
                links = attachment(obj, schema.links_field(Placement::Root));
            }
            if meta.is_none() {
                meta = attachment(obj, schema.meta_field(Placement::Root));
            }
        }

        for ro in std::mem::take(&mut self.shadowed) {
            if let Some(kept) = data.iter().find(|d| d.key() == ro.key()) {
                self.check_duplicate(kept, &ro)?;
            }
        }

        let data = match shape {
            Shape::Single => data
                .pop()
                .map_or(PrimaryData::Null, |obj| PrimaryData::Single(Box::new(obj))),
            Shape::Many => PrimaryData::Many(data),
        };

        tracing::debug!(
            primary = self.primary.len(),
            included = self.included.len(),
            "encoded document"
        );

        Ok(Document {
            data,
            included: self.included,
            links,
            meta,
            errors: None,
        })
    }

    fn resource_object(
        &mut self,
        schema: &ResourceSchema,
        obj: &Map<String, Value>,
        hop: Hop,
    ) -> Result<ResourceObject, EncodeError> {
        let mut ro = ResourceObject::new(schema.resource_type.clone(), extract_id(schema, obj)?);

        for field in &schema.fields {
            let value = obj.get(&field.name);
            match &field.role {
                FieldRole::Attribute => {
                    let value = value
                        .cloned()
                        .or_else(|| field.default.clone())
                        .unwrap_or(Value::Null);
                    ro.attributes.insert(field.name.clone(), value);
                }
                FieldRole::ToOne(target) => {
                    let linkage = self.to_one(schema, field, target, value, hop)?;
                    ro.relationships
                        .insert(field.name.clone(), Relationship::new(linkage));
                }
                FieldRole::ToMany(target) => {
                    let linkage = self.to_many(schema, field, target, value, hop)?;
                    ro.relationships
                        .insert(field.name.clone(), Relationship::new(linkage));
                }
                FieldRole::Links(Placement::Data) => ro.links = non_null(value),
                FieldRole::Meta(Placement::Data) => ro.meta = non_null(value),
                // Root content is attached by the caller, relationship content below.
                FieldRole::Links(_) | FieldRole::Meta(_) => {}
            }
        }

        if let Some(Value::Object(per_rel)) =
            attachment(obj, schema.links_field(Placement::Relationships))
        {
            for (name, links) in per_rel {
                if let Some(rel) = ro.relationships.get_mut(&name) {
                    rel.links = non_null(Some(&links));
                }
            }
        }
        if let Some(Value::Object(per_rel)) =
            attachment(obj, schema.meta_field(Placement::Relationships))
        {
            for (name, meta) in per_rel {
                if let Some(rel) = ro.relationships.get_mut(&name) {
                    rel.meta = non_null(Some(&meta));
                }
            }
        }

        Ok(ro)
    }

    fn to_one(
        &mut self,
        owner: &ResourceSchema,
        field: &FieldDescriptor,
        target: &str,
        value: Option<&Value>,
        hop: Hop,
    ) -> Result<Linkage, EncodeError> {
        match value.filter(|v| !v.is_null()) {
            Some(v) => Ok(Linkage::One(Some(self.related(owner, field, target, v, hop)?))),
            None if field.nullable => Ok(Linkage::One(None)),
            None => Err(EncodeError::MissingRequiredRelationship {
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
        value: Option<&Value>,
        hop: Hop,
    ) -> Result<Linkage, EncodeError> {
        let items = match value {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) if field.nullable => return Ok(Linkage::One(None)),
            None | Some(Value::Null) => return Ok(Linkage::Many(Vec::new())),
            Some(other) => {
                return Err(EncodeError::InvalidRelationshipValue {
                    resource_type: owner.resource_type.clone(),
                    field: field.name.clone(),
                    expected: "array",
                    actual: json_type_name(other),
                })
            }
        };

        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            ids.push(self.related(owner, field, target, item, hop)?);
        }
        Ok(Linkage::Many(ids))
    }

    /// Linkage for one related value, flattening it into `included` on the primary hop.
    ///
    /// A bare string or number is taken as the target id and is not included.
    fn related(
        &mut self,
        owner: &ResourceSchema,
        field: &FieldDescriptor,
        target: &str,
        value: &Value,
        hop: Hop,
    ) -> Result<Identifier, EncodeError> {
        let registry = self.registry;
        let target_schema = registry.schema(target).ok_or_else(|| {
            EncodeError::InvalidRelationshipValue {
                resource_type: owner.resource_type.clone(),
                field: field.name.clone(),
                expected: "registered target type",
                actual: json_type_name(value),
            }
        })?;

        match value {
            Value::String(id) => Ok(Identifier::new(target_schema.resource_type.clone(), id.clone())),
            Value::Number(id) => Ok(Identifier::new(target_schema.resource_type.clone(), id.to_string())),
            Value::Object(obj) => {
                let id = extract_id(target_schema, obj)?;
                let identifier = Identifier::new(target_schema.resource_type.clone(), id);
                if hop == Hop::Primary {
                    let ro = self.resource_object(target_schema, obj, Hop::Related)?;
                    self.include(ro)?;
                }
                Ok(identifier)
            }
            other => Err(EncodeError::InvalidRelationshipValue {
                resource_type: owner.resource_type.clone(),
                field: field.name.clone(),
                expected: "object or id",
                actual: json_type_name(other),
            }),
        }
    }

    /// Primary keys never enter `included`; their related copies are
    /// checked against the primary object instead.
    fn include(&mut self, ro: ResourceObject) -> Result<(), EncodeError> {
        if self.primary.contains(&ro.key()) {
            self.shadowed.push(ro);
            return Ok(());
        }
        if let Some(kept) = self.included.get(&ro.key()) {
            return self.check_duplicate(kept, &ro);
        }
        self.included.insert(ro);
        Ok(())
    }

    fn check_duplicate(&self, kept: &ResourceObject, ro: &ResourceObject) -> Result<(), EncodeError> {
        if kept == ro {
            return Ok(());
        }
        let key = ro.key();
        if self.registry.options().duplicates == DuplicatePolicy::Reject {
            return Err(EncodeError::ConflictingDuplicate {
                key: key.to_string(),
            });
        }
        tracing::debug!(%key, "conflicting resource copy discarded, first version kept");
        Ok(())
    }
}

fn as_object<'v>(schema: &ResourceSchema, value: &'v Value) -> Result<&'v Map<String, Value>, EncodeError> {
    value.as_object().ok_or_else(|| EncodeError::NotAnObject {
        type_name: schema.type_name.clone(),
        actual: json_type_name(value),
    })
}

fn extract_id(schema: &ResourceSchema, obj: &Map<String, Value>) -> Result<String, EncodeError> {
    match obj.get(&schema.id_field) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(EncodeError::MissingId {
            resource_type: schema.resource_type.clone(),
            id_field: schema.id_field.clone(),
        }),
    }
}

fn attachment(obj: &Map<String, Value>, field: Option<&FieldDescriptor>) -> Option<Value> {
    field.and_then(|f| non_null(obj.get(&f.name)))
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use crate::schema::{FieldDecl, ResourceDecl};
    use crate::types::CodecOptions;
    use serde_json::json;

    fn registry(options: CodecOptions) -> Registry {
        RegistryBuilder::new()
            .options(options)
            .register(
                ResourceDecl::new("Article", "articles")
                    .field(FieldDecl::typed("title", "String"))
                    .field(FieldDecl::typed("subtitle", "Option<String>"))
                    .field(FieldDecl::typed("author", "Person"))
                    .field(FieldDecl::typed("editor", "Option<Person>"))
                    .field(FieldDecl::typed("comments", "Vec<Comment>")),
            )
            .register(ResourceDecl::new("Person", "people").field(FieldDecl::typed("name", "String")))
            .register(
                ResourceDecl::new("Comment", "comments")
                    .field(FieldDecl::typed("body", "String"))
                    .field(FieldDecl::typed("author", "Option<Person>")),
            )
            .build()
            .unwrap()
    }

    fn article(id: &str, author: Value) -> Value {
        json!({
            "id": id,
            "title": "Hi",
            "author": author,
            "comments": []
        })
    }

    #[test]
    fn attributes_and_relationships_are_separated() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Article").unwrap();
        let doc = encode(&reg, schema, &article("1", json!({ "id": "9", "name": "Amy" }))).unwrap();

        let PrimaryData::Single(ro) = &doc.data else {
            panic!("expected single primary data");
        };
        assert_eq!(ro.attributes.len(), 2);
        assert_eq!(ro.attributes["title"], json!("Hi"));
        // Missing nullable attribute is written as null.
        assert_eq!(ro.attributes["subtitle"], Value::Null);
        assert_eq!(
            ro.relationships["author"].data,
            Some(Linkage::One(Some(Identifier::new("people", "9"))))
        );
        assert_eq!(ro.relationships["editor"].data, Some(Linkage::One(None)));
        assert_eq!(ro.relationships["comments"].data, Some(Linkage::Many(vec![])));
    }

    #[test]
    fn missing_required_relationship_errors() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Article").unwrap();
        let result = encode(&reg, schema, &article("1", Value::Null));
        assert!(matches!(
            result,
            Err(EncodeError::MissingRequiredRelationship { field, .. }) if field == "author"
        ));
    }

    #[test]
    fn missing_id_errors() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Person").unwrap();
        assert!(matches!(
            encode(&reg, schema, &json!({ "name": "Amy" })),
            Err(EncodeError::MissingId { .. })
        ));
    }

    #[test]
    fn non_object_value_errors() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Person").unwrap();
        assert!(matches!(
            encode(&reg, schema, &json!("Amy")),
            Err(EncodeError::NotAnObject { actual: "string", .. })
        ));
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Person").unwrap();
        let doc = encode(&reg, schema, &json!({ "id": 42, "name": "Amy" })).unwrap();
        assert_eq!(doc.data.iter().next().unwrap().id, "42");
    }

    #[test]
    fn bare_id_relationship_is_not_included() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Article").unwrap();
        let doc = encode(&reg, schema, &article("1", json!("9"))).unwrap();
        assert!(doc.included.is_empty());
        let ro = doc.data.iter().next().unwrap();
        assert_eq!(
            ro.relationships["author"].data,
            Some(Linkage::One(Some(Identifier::new("people", "9"))))
        );
    }

    #[test]
    fn related_targets_are_only_one_hop() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Article").unwrap();
        let mut value = article("1", json!({ "id": "9", "name": "Amy" }));
        value["comments"] = json!([
            { "id": "5", "body": "First", "author": { "id": "10", "name": "Bob" } }
        ]);
        let doc = encode(&reg, schema, &value).unwrap();

        let keys: Vec<_> = doc.included.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, ["people/9", "comments/5"]);
        let comment = doc.included.get(&ResourceKey::new("comments", "5")).unwrap();
        assert_eq!(
            comment.relationships["author"].data,
            Some(Linkage::One(Some(Identifier::new("people", "10"))))
        );
    }

    #[test]
    fn conflicting_duplicate_keeps_first_by_default() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Article").unwrap();
        let values = vec![
            article("1", json!({ "id": "9", "name": "Amy" })),
            article("2", json!({ "id": "9", "name": "Amelia" })),
        ];
        let doc = encode_list(&reg, schema, &values).unwrap();
        assert_eq!(doc.included.len(), 1);
        assert_eq!(doc.included.iter().next().unwrap().attributes["name"], json!("Amy"));
    }

    #[test]
    fn conflicting_duplicate_rejected_when_configured() {
        let reg = registry(CodecOptions::new().duplicates(DuplicatePolicy::Reject));
        let schema = reg.schema("Article").unwrap();
        let values = vec![
            article("1", json!({ "id": "9", "name": "Amy" })),
            article("2", json!({ "id": "9", "name": "Amelia" })),
        ];
        assert!(matches!(
            encode_list(&reg, schema, &values),
            Err(EncodeError::ConflictingDuplicate { key }) if key == "people/9"
        ));

        // Identical copies are fine under either policy.
        let values = vec![
            article("1", json!({ "id": "9", "name": "Amy" })),
            article("2", json!({ "id": "9", "name": "Amy" })),
        ];
        assert_eq!(encode_list(&reg, schema, &values).unwrap().included.len(), 1);
    }

    #[test]
    fn conflicting_copy_of_primary_resource_rejected_when_configured() {
        let reg = registry(CodecOptions::new().duplicates(DuplicatePolicy::Reject));
        let mut article = article("1", json!({ "id": "9", "name": "Amelia" }));
        article["#class"] = json!("Article");
        let values = vec![json!({ "#class": "Person", "id": "9", "name": "Amy" }), article];
        assert!(matches!(
            encode_polymorphic(&reg, &values),
            Err(EncodeError::ConflictingDuplicate { key }) if key == "people/9"
        ));

        // Related copy seen before the primary object it shadows.
        let values = vec![values[1].clone(), values[0].clone()];
        assert!(matches!(
            encode_polymorphic(&reg, &values),
            Err(EncodeError::ConflictingDuplicate { .. })
        ));

        // KeepFirst keeps the primary version and leaves `included` empty.
        let reg = registry(CodecOptions::new());
        let doc = encode_polymorphic(&reg, &values).unwrap();
        assert!(doc.included.is_empty());
        let person = doc.data.iter().find(|r| r.resource_type == "people").unwrap();
        assert_eq!(person.attributes["name"], json!("Amy"));
    }

    #[test]
    fn matching_copy_of_primary_resource_is_accepted() {
        let reg = registry(CodecOptions::new().duplicates(DuplicatePolicy::Reject));
        let mut article = article("1", json!({ "id": "9", "name": "Amy" }));
        article["#class"] = json!("Article");
        let values = vec![json!({ "#class": "Person", "id": "9", "name": "Amy" }), article];
        let doc = encode_polymorphic(&reg, &values).unwrap();
        assert_eq!(doc.data.iter().count(), 2);
        assert!(doc.included.is_empty());
    }

    #[test]
    fn primary_resources_are_not_repeated_in_included() {
        let reg = registry(CodecOptions::new());
        let schema = reg.schema("Comment").unwrap();
        let values = vec![json!({ "id": "5", "body": "x" }), json!({ "id": "6", "body": "y" })];
        let doc = encode_list(&reg, schema, &values).unwrap();
        assert!(doc.included.is_empty());
        assert_eq!(doc.data.iter().count(), 2);
    }

    #[test]
    fn polymorphic_requires_known_discriminator() {
        let reg = registry(CodecOptions::new());
        let values = vec![
            json!({ "#class": "Person", "id": "9", "name": "Amy" }),
            json!({ "#class": "Comment", "id": "5", "body": "x" }),
        ];
        let doc = encode_polymorphic(&reg, &values).unwrap();
        let types: Vec<_> = doc.data.iter().map(|r| r.resource_type.as_str()).collect();
        assert_eq!(types, ["people", "comments"]);
        // The discriminator never leaks into attributes.
        assert!(doc.data.iter().all(|r| !r.attributes.contains_key("#class")));

        let values = vec![json!({ "#class": "Tag", "id": "1" })];
        assert!(matches!(
            encode_polymorphic(&reg, &values),
            Err(EncodeError::UnknownDiscriminator { .. })
        ));
    }
}
