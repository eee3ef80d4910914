//! Resource classification - splits declared fields into attributes,
//! relationships and custom links/meta attachments.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::{
    BindingDecl, DeclaredRole, FieldDecl, FieldDescriptor, FieldRole, LinksInfo, MetaInfo,
    ResourceDecl, ResourceSchema,
};
use crate::types::{last_segment, Placement, TypeExpr, TypeShape};

/// Classify a set of declarations against each other.
///
/// A field whose declared type names a declared domain type becomes a to-one
/// relationship, a collection of one becomes to-many, a type bound as custom
/// links/meta for the owning resource type becomes that attachment, and
/// everything else is an attribute. Later declarations of the same
/// `type_name` replace earlier ones.
///
/// A target resolves by its full path first. A path-qualified suffix or a
/// bare short name resolves only when it matches exactly one declaration.
///
/// # Errors
///
/// Returns `SchemaError` for empty field lists, explicit relationships to
/// undeclared types, targets matching several declarations, bindings to
/// undeclared resource types, and resource types claimed twice.
pub fn classify(
    decls: &[ResourceDecl],
    links: &[BindingDecl],
    meta: &[BindingDecl],
) -> Result<IndexMap<String, ResourceSchema>, SchemaError> {
    let mut latest: IndexMap<&str, &ResourceDecl> = IndexMap::new();
    for decl in decls {
        latest.insert(decl.type_name.as_str(), decl);
    }

    let mut owners: HashMap<&str, &str> = HashMap::new();
    let mut known = KnownTypes::default();
    for decl in latest.values() {
        if let Some(first) = owners.insert(decl.resource_type.as_str(), decl.type_name.as_str()) {
            return Err(SchemaError::DuplicateResourceType {
                resource_type: decl.resource_type.clone(),
                first: first.to_string(),
                second: decl.type_name.clone(),
            });
        }
        known.insert(&decl.type_name);
    }

    let mut links_by_type: HashMap<&str, LinksInfo> = HashMap::new();
    for binding in links {
        check_binding("links", binding, &owners)?;
        links_by_type
            .entry(binding.resource_type.as_str())
            .or_default()
            .set(binding.placement, binding.type_name.clone());
    }

    let mut meta_by_type: HashMap<&str, MetaInfo> = HashMap::new();
    for binding in meta {
        check_binding("meta", binding, &owners)?;
        meta_by_type
            .entry(binding.resource_type.as_str())
            .or_default()
            .set(binding.placement, binding.type_name.clone());
    }

    let mut schemas = IndexMap::new();
    for decl in latest.values() {
        let links = links_by_type
            .get(decl.resource_type.as_str())
            .cloned()
            .unwrap_or_default();
        let meta = meta_by_type
            .get(decl.resource_type.as_str())
            .cloned()
            .unwrap_or_default();
        let schema = classify_one(decl, &known, links, meta)?;

        tracing::debug!(
            type_name = %schema.type_name,
            resource_type = %schema.resource_type,
            attributes = schema.attributes().count(),
            to_one = schema.to_one().count(),
            to_many = schema.to_many().count(),
            "classified resource"
        );
        schemas.insert(decl.type_name.clone(), schema);
    }

    Ok(schemas)
}

/// Declared type names, indexed by full path and by last segment.
#[derive(Default)]
struct KnownTypes<'a> {
    full: HashSet<&'a str>,
    short: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> KnownTypes<'a> {
    fn insert(&mut self, type_name: &'a str) {
        self.full.insert(type_name);
        self.short.entry(last_segment(type_name)).or_default().push(type_name);
    }

    /// `Ok(None)` when nothing matches, `Err` with the candidates when
    /// several do.
    fn resolve(&self, target: &str) -> Result<Option<&'a str>, Vec<String>> {
        if let Some(full) = self.full.get(target) {
            return Ok(Some(*full));
        }
        let Some(candidates) = self.short.get(last_segment(target)) else {
            return Ok(None);
        };

        let suffix = format!("::{target}");
        let qualified: Vec<&'a str> = candidates
            .iter()
            .copied()
            .filter(|name| name.ends_with(&suffix))
            .collect();
        let matches = if qualified.is_empty() { candidates } else { &qualified };
        match matches.as_slice() {
            [only] => Ok(Some(*only)),
            several => Err(several.iter().map(|name| name.to_string()).collect()),
        }
    }
}

fn check_binding(
    kind: &'static str,
    binding: &BindingDecl,
    owners: &HashMap<&str, &str>,
) -> Result<(), SchemaError> {
    if owners.contains_key(binding.resource_type.as_str()) {
        Ok(())
    } else {
        Err(SchemaError::UnregisteredBinding {
            kind,
            type_name: binding.type_name.clone(),
            resource_type: binding.resource_type.clone(),
        })
    }
}

fn classify_one(
    decl: &ResourceDecl,
    known: &KnownTypes<'_>,
    links: LinksInfo,
    meta: MetaInfo,
) -> Result<ResourceSchema, SchemaError> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(decl.fields.len());
    let mut has_id = false;

    for field in &decl.fields {
        if field.name == decl.id_field {
            has_id = true;
            tracing::warn!(
                type_name = %decl.type_name,
                field = %field.name,
                "id field listed among fields; it is carried as the resource id"
            );
            continue;
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                type_name: decl.type_name.clone(),
                field: field.name.clone(),
            });
        }
        fields.push(classify_field(decl, field, known, &links, &meta)?);
    }

    // An identity-only resource (just its id) is valid.
    if fields.is_empty() && !has_id {
        return Err(SchemaError::EmptyFields {
            type_name: decl.type_name.clone(),
        });
    }

    Ok(ResourceSchema {
        type_name: decl.type_name.clone(),
        resource_type: decl.resource_type.clone(),
        id_field: decl.id_field.clone(),
        fields,
        links,
        meta,
    })
}

fn classify_field(
    decl: &ResourceDecl,
    field: &FieldDecl,
    known: &KnownTypes<'_>,
    links: &LinksInfo,
    meta: &MetaInfo,
) -> Result<FieldDescriptor, SchemaError> {
    let expr = match &field.type_expr {
        Some(s) => Some(TypeExpr::parse(s).ok_or_else(|| SchemaError::InvalidTypeExpr {
            type_name: decl.type_name.clone(),
            field: field.name.clone(),
            expr: s.clone(),
        })?),
        None => None,
    };
    let nullable = field.nullable || expr.as_ref().is_some_and(TypeExpr::is_nullable);

    let lookup = |target: &str| {
        known.resolve(target).map_err(|candidates| SchemaError::AmbiguousType {
            type_name: decl.type_name.clone(),
            field: field.name.clone(),
            target: target.to_string(),
            candidates,
        })
    };
    let resolve_target = |target: &str| {
        lookup(target)?
            .map(str::to_string)
            .ok_or_else(|| SchemaError::UnknownTarget {
                type_name: decl.type_name.clone(),
                field: field.name.clone(),
                target: target.to_string(),
            })
    };

    let role = match (&field.role, &expr) {
        (Some(DeclaredRole::Attribute), _) => FieldRole::Attribute,
        (Some(DeclaredRole::ToOne(target)), _) => FieldRole::ToOne(resolve_target(target)?),
        (Some(DeclaredRole::ToMany(target)), _) => FieldRole::ToMany(resolve_target(target)?),
        (None, Some(expr)) => infer_role(expr, &lookup, links, meta)?,
        (None, None) => FieldRole::Attribute,
    };

    let default = match (&field.default, &role) {
        (Some(value), _) => Some(value.clone()),
        (None, FieldRole::Attribute) if nullable => Some(Value::Null),
        _ => None,
    };

    Ok(FieldDescriptor {
        name: field.name.clone(),
        role,
        nullable,
        default,
    })
}

fn infer_role<'k>(
    expr: &TypeExpr,
    lookup: impl Fn(&str) -> Result<Option<&'k str>, SchemaError>,
    links: &LinksInfo,
    meta: &MetaInfo,
) -> Result<FieldRole, SchemaError> {
    let role = match expr.shape() {
        TypeShape::Single(name) => {
            if let Some(full) = lookup(name)? {
                return Ok(FieldRole::ToOne(full.to_string()));
            }
            if let Some(placement) = bound_placement(name, |p| links.get(p)) {
                return Ok(FieldRole::Links(placement));
            }
            if let Some(placement) = bound_placement(name, |p| meta.get(p)) {
                return Ok(FieldRole::Meta(placement));
            }
            FieldRole::Attribute
        }
        TypeShape::Collection(name) => match lookup(name)? {
            Some(full) => FieldRole::ToMany(full.to_string()),
            None => FieldRole::Attribute,
        },
        TypeShape::Other => FieldRole::Attribute,
    };
    Ok(role)
}

fn bound_placement<'a>(
    name: &str,
    lookup: impl Fn(Placement) -> Option<&'a str>,
) -> Option<Placement> {
    Placement::ALL
        .into_iter()
        .find(|p| lookup(*p).map(last_segment) == Some(last_segment(name)))
}
