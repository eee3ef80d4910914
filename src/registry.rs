//! Adapter registry.
//!
//! A [`RegistryBuilder`] collects declarations and binds links/meta types,
//! then [`RegistryBuilder::build`] classifies everything once. The resulting
//! [`Registry`] is immutable and can be shared freely across threads.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::classifier::classify;
use crate::decoder;
use crate::document::Document;
use crate::encoder;
use crate::error::{CodecError, DecodeError, EncodeError, SchemaError};
use crate::schema::{BindingDecl, ResourceDecl, ResourceSchema, SchemaFile};
use crate::types::{CodecOptions, Placement};
use crate::validator;

/// A domain type that has been (or will be) registered under `TYPE_NAME`.
pub trait Model: Serialize + DeserializeOwned {
    /// The declared type name, matching `ResourceDecl::type_name`.
    const TYPE_NAME: &'static str;
}

/// Single writer for a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    decls: IndexMap<String, ResourceDecl>,
    links: IndexMap<(String, Placement), BindingDecl>,
    meta: IndexMap<(String, Placement), BindingDecl>,
    options: CodecOptions,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder from a parsed schema file.
    pub fn from_schema_file(file: SchemaFile) -> Self {
        let mut builder = Self::new();
        for decl in file.resources {
            builder = builder.register(decl);
        }
        for binding in file.links {
            builder = builder.links(binding.resource_type, binding.placement, binding.type_name);
        }
        for binding in file.meta {
            builder = builder.meta(binding.resource_type, binding.placement, binding.type_name);
        }
        builder
    }

    pub fn options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a resource declaration. A later declaration with the same
    /// type name replaces the earlier one.
    pub fn register(mut self, decl: ResourceDecl) -> Self {
        if self.decls.contains_key(&decl.type_name) {
            tracing::debug!(type_name = %decl.type_name, "replacing earlier registration");
        } else {
            tracing::debug!(type_name = %decl.type_name, resource_type = %decl.resource_type, "registered");
        }
        self.decls.insert(decl.type_name.clone(), decl);
        self
    }

    /// Bind a links type to a resource type at `placement`.
    pub fn links(
        mut self,
        resource_type: impl Into<String>,
        placement: Placement,
        type_name: impl Into<String>,
    ) -> Self {
        let binding = BindingDecl::new(resource_type, placement, type_name);
        bind(&mut self.links, "links", binding);
        self
    }

    /// Bind a meta type to a resource type at `placement`.
    pub fn meta(
        mut self,
        resource_type: impl Into<String>,
        placement: Placement,
        type_name: impl Into<String>,
    ) -> Self {
        let binding = BindingDecl::new(resource_type, placement, type_name);
        bind(&mut self.meta, "meta", binding);
        self
    }

    /// Classify all declarations.
    ///
    /// # Errors
    ///
    /// Returns the first `SchemaError` hit while classifying.
    pub fn build(self) -> Result<Registry, SchemaError> {
        let decls: Vec<ResourceDecl> = self.decls.into_values().collect();
        let links: Vec<BindingDecl> = self.links.into_values().collect();
        let meta: Vec<BindingDecl> = self.meta.into_values().collect();

        let schemas = classify(&decls, &links, &meta)?;
        let by_resource_type = schemas
            .values()
            .map(|s| (s.resource_type.clone(), s.type_name.clone()))
            .collect();

        Ok(Registry {
            schemas,
            by_resource_type,
            options: self.options,
        })
    }
}

fn bind(
    bindings: &mut IndexMap<(String, Placement), BindingDecl>,
    kind: &'static str,
    binding: BindingDecl,
) {
    let key = (binding.resource_type.clone(), binding.placement);
    if let Some(previous) = bindings.get(&key) {
        tracing::debug!(
            kind,
            resource_type = %binding.resource_type,
            placement = %binding.placement,
            previous = %previous.type_name,
            "replacing binding"
        );
    }
    bindings.insert(key, binding);
}

/// Classified schemas plus codec options.
#[derive(Debug, Clone)]
pub struct Registry {
    schemas: IndexMap<String, ResourceSchema>,
    by_resource_type: HashMap<String, String>,
    options: CodecOptions,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Schema registered under a domain type name.
    pub fn schema(&self, type_name: &str) -> Option<&ResourceSchema> {
        self.schemas.get(type_name)
    }

    /// Schema owning a wire resource type.
    pub fn schema_for_resource_type(&self, resource_type: &str) -> Option<&ResourceSchema> {
        self.by_resource_type
            .get(resource_type)
            .and_then(|name| self.schemas.get(name))
    }

    /// All schemas in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &ResourceSchema> {
        self.schemas.values()
    }

    /// Single-resource adapter for `type_name`, or `None` when unregistered.
    pub fn lookup(&self, type_name: &str) -> Option<Adapter<'_>> {
        self.schema(type_name).map(|schema| Adapter {
            registry: self,
            schema,
        })
    }

    /// List adapter for `type_name`, or `None` when unregistered.
    pub fn lookup_for_collection(&self, type_name: &str) -> Option<ListAdapter<'_>> {
        self.schema(type_name).map(|schema| ListAdapter {
            registry: self,
            schema,
        })
    }

    /// Encode values of different domain types into one document.
    pub fn encode_polymorphic(&self, values: &[Value]) -> Result<Document, EncodeError> {
        encoder::encode_polymorphic(self, values)
    }

    /// Decode a document whose primary data mixes resource types.
    pub fn decode_polymorphic(&self, doc: &Document) -> Result<Vec<Value>, DecodeError> {
        decoder::decode_polymorphic(self, doc)
    }

    pub fn encode<T: Model>(&self, value: &T) -> Result<Document, CodecError> {
        let adapter = self.typed_adapter::<T>()?;
        Ok(adapter.encode(&to_value(value)?)?)
    }

    pub fn decode<T: Model>(&self, doc: &Document) -> Result<T, CodecError> {
        let adapter = self.typed_adapter::<T>()?;
        Ok(from_value(adapter.decode(doc)?)?)
    }

    pub fn encode_list<T: Model>(&self, values: &[T]) -> Result<Document, CodecError> {
        let adapter = self.typed_list_adapter::<T>()?;
        let values = values.iter().map(to_value).collect::<Result<Vec<_>, _>>()?;
        Ok(adapter.encode(&values)?)
    }

    pub fn decode_list<T: Model>(&self, doc: &Document) -> Result<Vec<T>, CodecError> {
        let adapter = self.typed_list_adapter::<T>()?;
        let values = adapter.decode(doc)?;
        Ok(values
            .into_iter()
            .map(from_value)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Encode straight to document text.
    pub fn to_string<T: Model>(&self, value: &T) -> Result<String, CodecError> {
        let adapter = self.typed_adapter::<T>()?;
        Ok(adapter.encode_string(&to_value(value)?)?)
    }

    /// Decode from document text, running the shape check when enabled.
    pub fn from_str<T: Model>(&self, text: &str) -> Result<T, CodecError> {
        let adapter = self.typed_adapter::<T>()?;
        Ok(from_value(adapter.decode_str(text)?)?)
    }

    fn typed_adapter<T: Model>(&self) -> Result<Adapter<'_>, CodecError> {
        self.lookup(T::TYPE_NAME).ok_or_else(|| CodecError::Unsupported {
            type_name: T::TYPE_NAME.to_string(),
        })
    }

    fn typed_list_adapter<T: Model>(&self) -> Result<ListAdapter<'_>, CodecError> {
        self.lookup_for_collection(T::TYPE_NAME)
            .ok_or_else(|| CodecError::Unsupported {
                type_name: T::TYPE_NAME.to_string(),
            })
    }
}

fn to_value<T: Model>(value: &T) -> Result<Value, EncodeError> {
    serde_json::to_value(value).map_err(|source| EncodeError::Serialize { source })
}

fn from_value<T: Model>(value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Deserialize {
        type_name: T::TYPE_NAME.to_string(),
        source,
    })
}

/// Parse document text, checking its wire shape first when configured.
fn parse_document(options: &CodecOptions, text: &str) -> Result<Document, DecodeError> {
    let raw: Value =
        serde_json::from_str(text).map_err(|source| DecodeError::InvalidJson { source })?;
    if options.validate_shape {
        validator::validate_document(&raw)?;
    }
    validator::into_document(raw)
}

/// Codec for one domain type with single-resource primary data.
#[derive(Debug, Clone, Copy)]
pub struct Adapter<'r> {
    registry: &'r Registry,
    schema: &'r ResourceSchema,
}

impl<'r> Adapter<'r> {
    pub fn schema(&self) -> &'r ResourceSchema {
        self.schema
    }

    pub fn encode(&self, value: &Value) -> Result<Document, EncodeError> {
        encoder::encode(self.registry, self.schema, value)
    }

    pub fn decode(&self, doc: &Document) -> Result<Value, DecodeError> {
        decoder::decode(self.registry, self.schema, doc)
    }

    pub fn encode_string(&self, value: &Value) -> Result<String, EncodeError> {
        let doc = self.encode(value)?;
        serde_json::to_string(&doc).map_err(|source| EncodeError::Serialize { source })
    }

    pub fn decode_str(&self, text: &str) -> Result<Value, DecodeError> {
        let doc = parse_document(self.registry.options(), text)?;
        self.decode(&doc)
    }
}

/// Codec for one domain type with list primary data.
#[derive(Debug, Clone, Copy)]
pub struct ListAdapter<'r> {
    registry: &'r Registry,
    schema: &'r ResourceSchema,
}

impl<'r> ListAdapter<'r> {
    pub fn schema(&self) -> &'r ResourceSchema {
        self.schema
    }

    pub fn encode(&self, values: &[Value]) -> Result<Document, EncodeError> {
        encoder::encode_list(self.registry, self.schema, values)
    }

    pub fn decode(&self, doc: &Document) -> Result<Vec<Value>, DecodeError> {
        decoder::decode_list(self.registry, self.schema, doc)
    }

    pub fn encode_string(&self, values: &[Value]) -> Result<String, EncodeError> {
        let doc = self.encode(values)?;
        serde_json::to_string(&doc).map_err(|source| EncodeError::Serialize { source })
    }

    pub fn decode_str(&self, text: &str) -> Result<Vec<Value>, DecodeError> {
        let doc = parse_document(self.registry.options(), text)?;
        self.decode(&doc)
    }
}
