//! JSON:API Resource Graph Codec
//!
//! Schema-driven encoding of domain values into normalized resource-graph
//! documents, and decoding of those documents back into domain values.
//!
//! Domain types are declared once ([`ResourceDecl`]), classified into
//! attributes, relationships and links/meta attachments, and looked up by
//! type name through an immutable [`Registry`].
//!
//! # Example
//!
//! ```
//! use jsonapi_graph::{FieldDecl, Model, Registry, ResourceDecl};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Person {
//!     id: String,
//!     name: String,
//! }
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Article {
//!     id: String,
//!     title: String,
//!     author: Person,
//! }
//!
//! impl Model for Person {
//!     const TYPE_NAME: &'static str = "Person";
//! }
//!
//! impl Model for Article {
//!     const TYPE_NAME: &'static str = "Article";
//! }
//!
//! let registry = Registry::builder()
//!     .register(
//!         ResourceDecl::new("Article", "articles")
//!             .field(FieldDecl::typed("title", "String"))
//!             .field(FieldDecl::typed("author", "Person")),
//!     )
//!     .register(ResourceDecl::new("Person", "people").field(FieldDecl::typed("name", "String")))
//!     .build()
//!     .unwrap();
//!
//! let article = Article {
//!     id: "1".into(),
//!     title: "Hi".into(),
//!     author: Person { id: "9".into(), name: "Amy".into() },
//! };
//!
//! let doc = registry.encode(&article).unwrap();
//! // The author is flattened into `included`; the article only links to it.
//! assert_eq!(doc.included.len(), 1);
//! assert_eq!(registry.decode::<Article>(&doc).unwrap(), article);
//! ```
//!
//! # Field Classification
//!
//! | Declared type | Role |
//! |---------------|------|
//! | a registered domain type (optionally `Option<..>`) | to-one relationship |
//! | a collection of a registered domain type | to-many relationship |
//! | a links type bound to the resource type | links at its placement |
//! | a meta type bound to the resource type | meta at its placement |
//! | anything else | attribute |

mod classifier;
mod decoder;
mod document;
mod encoder;
mod error;
mod loader;
mod registry;
mod schema;
mod types;
mod validator;

pub use classifier::classify;
pub use decoder::{decode, decode_list, decode_polymorphic};
pub use document::{
    Document, Identifier, Included, Linkage, PrimaryData, Relationship, ResourceObject,
};
pub use encoder::{encode, encode_list, encode_polymorphic};
pub use error::{CodecError, DecodeError, EncodeError, LoadError, SchemaError, ShapeViolation};
pub use loader::{is_url, load_json, load_json_auto, load_json_str, load_registry, load_registry_str};
pub use registry::{Adapter, ListAdapter, Model, Registry, RegistryBuilder};
pub use schema::{
    BindingDecl, DeclaredRole, FieldDecl, FieldDescriptor, FieldRole, LinksInfo, MetaInfo,
    ResourceDecl, ResourceSchema, SchemaFile,
};
pub use types::{
    CodecOptions, DuplicatePolicy, Placement, ResourceKey, TypeExpr, DEFAULT_CLASS_DISCRIMINATOR,
};
pub use validator::{into_document, validate_document};

#[cfg(feature = "remote")]
pub use loader::load_json_url;
