//! Library integration tests: typed models through the registry.

use std::sync::Arc;

use jsonapi_graph::{
    load_registry_str, CodecError, CodecOptions, DecodeError, Document, FieldDecl, Linkage,
    Model, Placement, PrimaryData, Registry, ResourceDecl, ResourceKey,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Person {
    id: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Comment {
    id: String,
    body: String,
    author: Option<Person>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Article {
    id: String,
    title: String,
    subtitle: Option<String>,
    author: Person,
    editor: Option<Person>,
    comments: Vec<Comment>,
}

impl Model for Person {
    const TYPE_NAME: &'static str = "Person";
}

impl Model for Comment {
    const TYPE_NAME: &'static str = "Comment";
}

impl Model for Article {
    const TYPE_NAME: &'static str = "Article";
}

fn blog() -> Registry {
    Registry::builder()
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

fn amy() -> Person {
    Person {
        id: "9".into(),
        name: "Amy".into(),
    }
}

fn article(id: &str) -> Article {
    Article {
        id: id.into(),
        title: format!("Article {id}"),
        subtitle: None,
        author: amy(),
        editor: None,
        comments: vec![Comment {
            id: format!("c{id}"),
            body: "Nice".into(),
            author: Some(amy()),
        }],
    }
}

mod typed_round_trip {
    use super::*;

    #[test]
    fn single_article() {
        let reg = blog();
        let original = article("1");

        let doc = reg.encode(&original).unwrap();
        let keys: Vec<_> = doc.included.iter().map(|r| r.key()).collect();
        assert_eq!(
            keys,
            [ResourceKey::new("people", "9"), ResourceKey::new("comments", "c1")]
        );

        assert_eq!(reg.decode::<Article>(&doc).unwrap(), original);
    }

    #[test]
    fn through_text() {
        let reg = blog();
        let original = article("1");
        let text = reg.to_string(&original).unwrap();
        assert_eq!(reg.from_str::<Article>(&text).unwrap(), original);
    }

    #[test]
    fn list_shares_included_entries() {
        let reg = blog();
        let articles: Vec<Article> = (1..=5).map(|i| article(&i.to_string())).collect();

        let doc = reg.encode_list(&articles).unwrap();
        assert_eq!(doc.data.iter().count(), 5);
        // One shared author plus one comment per article.
        let people = doc
            .included
            .iter()
            .filter(|r| r.resource_type == "people")
            .count();
        assert_eq!(people, 1);
        assert_eq!(doc.included.len(), 6);

        assert_eq!(reg.decode_list::<Article>(&doc).unwrap(), articles);
    }

    #[test]
    fn nullable_fields_survive_as_null() {
        let reg = blog();
        let original = Article {
            subtitle: Some("Sub".into()),
            editor: None,
            comments: vec![],
            ..article("1")
        };

        let doc = reg.encode(&original).unwrap();
        let PrimaryData::Single(ro) = &doc.data else {
            panic!("expected single primary data");
        };
        assert_eq!(ro.relationships["editor"].data, Some(Linkage::One(None)));
        assert_eq!(ro.relationships["comments"].data, Some(Linkage::Many(vec![])));

        assert_eq!(reg.decode::<Article>(&doc).unwrap(), original);
    }

    #[test]
    fn unregistered_model_is_unsupported() {
        #[derive(Serialize, Deserialize)]
        struct Tag {
            id: String,
        }
        impl Model for Tag {
            const TYPE_NAME: &'static str = "Tag";
        }

        let reg = blog();
        assert!(matches!(
            reg.encode(&Tag { id: "1".into() }),
            Err(CodecError::Unsupported { .. })
        ));
        assert!(matches!(
            reg.decode_list::<Tag>(&Document::default()),
            Err(CodecError::Unsupported { .. })
        ));
        assert!(reg.lookup("Tag").is_none());
    }
}

mod decoding {
    use super::*;

    #[test]
    fn unresolved_reference_fails_whole_decode() {
        let reg = blog();
        let doc: Document = serde_json::from_value(json!({
            "data": {
                "type": "articles",
                "id": "1",
                "attributes": { "title": "Hi", "subtitle": null },
                "relationships": {
                    "author": { "data": { "type": "people", "id": "404" } },
                    "comments": { "data": [] }
                }
            }
        }))
        .unwrap();

        let err = reg.decode::<Article>(&doc).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decode(DecodeError::UnresolvedReference { ref id, .. }) if id == "404"
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn errors_coexist_with_data() {
        let reg = blog();
        let doc: Document = serde_json::from_value(json!({
            "data": { "type": "people", "id": "9", "attributes": { "name": "Amy" } },
            "errors": [{ "status": "409", "title": "stale" }]
        }))
        .unwrap();

        assert_eq!(reg.decode::<Person>(&doc).unwrap(), amy());
        assert_eq!(doc.errors().len(), 1);
        assert_eq!(doc.errors()[0]["status"], "409");
    }

    #[test]
    fn decoded_type_mismatch_is_reported() {
        let reg = blog();
        let doc: Document = serde_json::from_value(json!({
            "data": {
                "type": "comments",
                "id": "5",
                "attributes": { "body": "x" },
                "relationships": { "author": { "data": { "type": "articles", "id": "1" } } }
            }
        }))
        .unwrap();
        assert!(matches!(
            reg.decode::<Comment>(&doc),
            Err(CodecError::Decode(DecodeError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn cyclic_graph_terminates() {
        let reg = Registry::builder()
            .register(
                ResourceDecl::new("Person", "people")
                    .field(FieldDecl::typed("name", "String"))
                    .field(FieldDecl::typed("articles", "Vec<Article>")),
            )
            .register(
                ResourceDecl::new("Article", "articles")
                    .field(FieldDecl::typed("title", "String"))
                    .field(FieldDecl::typed("author", "Option<Person>")),
            )
            .build()
            .unwrap();

        // Bare ids on the related hop keep the encoded graph finite.
        let person = json!({
            "id": "9",
            "name": "Amy",
            "articles": [
                { "id": "1", "title": "A", "author": "9" },
                { "id": "2", "title": "B", "author": "9" }
            ]
        });
        let adapter = reg.lookup("Person").unwrap();
        let doc = adapter.encode(&person).unwrap();
        assert_eq!(doc.included.len(), 2);

        let value = adapter.decode(&doc).unwrap();
        assert_eq!(value["articles"][0]["author"]["id"], "9");
        assert_eq!(value["articles"][0]["author"]["name"], "Amy");
        assert_eq!(value["articles"][1]["author"]["articles"], json!([]));
    }
}

mod links_and_meta {
    use super::*;

    fn registry() -> Registry {
        Registry::builder()
            .register(
                ResourceDecl::new("Article", "articles")
                    .field(FieldDecl::typed("title", "String"))
                    .field(FieldDecl::typed("author", "Option<Person>"))
                    .field(FieldDecl::typed("links", "Option<ArticleLinks>"))
                    .field(FieldDecl::typed("relationship_links", "Option<AuthorLinks>"))
                    .field(FieldDecl::typed("page", "Option<PageMeta>")),
            )
            .register(ResourceDecl::new("Person", "people").field(FieldDecl::typed("name", "String")))
            .links("articles", Placement::Data, "ArticleLinks")
            .links("articles", Placement::Relationships, "AuthorLinks")
            .meta("articles", Placement::Root, "PageMeta")
            .build()
            .unwrap()
    }

    fn value(id: &str) -> Value {
        json!({
            "id": id,
            "title": "Hi",
            "author": { "id": "9", "name": "Amy" },
            "links": { "self": format!("/articles/{id}") },
            "relationship_links": { "author": { "related": format!("/articles/{id}/author") } },
            "page": { "total": 2 }
        })
    }

    #[test]
    fn fields_are_classified_by_binding() {
        let reg = registry();
        let schema = reg.schema("Article").unwrap();
        assert_eq!(schema.links_field(Placement::Data).unwrap().name, "links");
        assert_eq!(
            schema.links_field(Placement::Relationships).unwrap().name,
            "relationship_links"
        );
        assert_eq!(schema.meta_field(Placement::Root).unwrap().name, "page");
        assert_eq!(schema.attributes().count(), 1);
    }

    #[test]
    fn placements_round_trip() {
        let reg = registry();
        let adapter = reg.lookup("Article").unwrap();
        let original = value("1");

        let doc = adapter.encode(&original).unwrap();
        let wire = serde_json::to_value(&doc).unwrap();
        assert_eq!(wire["meta"], json!({ "total": 2 }));
        assert_eq!(wire["data"]["links"], json!({ "self": "/articles/1" }));
        assert_eq!(
            wire["data"]["relationships"]["author"]["links"],
            json!({ "related": "/articles/1/author" })
        );
        assert!(wire["data"]["attributes"].get("links").is_none());

        assert_eq!(adapter.decode(&doc).unwrap(), original);
    }

    #[test]
    fn root_meta_is_copied_to_every_list_element() {
        let reg = registry();
        let adapter = reg.lookup_for_collection("Article").unwrap();
        let doc = adapter.encode(&[value("1"), value("2")]).unwrap();
        assert_eq!(doc.meta, Some(json!({ "total": 2 })));

        let values = adapter.decode(&doc).unwrap();
        assert!(values.iter().all(|v| v["page"] == json!({ "total": 2 })));
        assert_eq!(values[1]["links"]["self"], "/articles/2");
    }
}

mod polymorphic {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "#class")]
    enum Entry {
        Person(Person),
        Comment(Comment),
    }

    #[test]
    fn mixed_list_round_trips_through_discriminator() {
        let reg = blog();
        let entries = vec![
            Entry::Person(amy()),
            Entry::Comment(Comment {
                id: "5".into(),
                body: "First".into(),
                author: None,
            }),
        ];

        let values: Vec<Value> = entries
            .iter()
            .map(|e| serde_json::to_value(e).unwrap())
            .collect();
        let doc = reg.encode_polymorphic(&values).unwrap();
        let types: Vec<_> = doc.data.iter().map(|r| r.resource_type.as_str()).collect();
        assert_eq!(types, ["people", "comments"]);

        let decoded: Vec<Entry> = reg
            .decode_polymorphic(&doc)
            .unwrap()
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        assert_eq!(decoded, entries);
    }
}

mod registry {
    use super::*;

    #[test]
    fn shared_across_threads() {
        let reg = Arc::new(blog());
        let handles: Vec<_> = (1..=4)
            .map(|i| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    let original = article(&i.to_string());
                    let doc = reg.encode(&original).unwrap();
                    reg.decode::<Article>(&doc).unwrap() == original
                })
            })
            .collect();
        assert!(handles.into_iter().all(|h| h.join().unwrap()));
    }

    #[test]
    fn built_from_schema_file() {
        let reg = load_registry_str(
            r#"{
                "resources": [
                    {
                        "type_name": "Person",
                        "resource_type": "people",
                        "id_field": "handle",
                        "fields": [
                            { "name": "name", "type": "String" },
                            { "name": "team", "role": { "kind": "attribute" }, "default": "core" }
                        ]
                    }
                ]
            }"#,
            CodecOptions::new(),
        )
        .unwrap();

        let adapter = reg.lookup("Person").unwrap();
        let doc = adapter.encode(&json!({ "handle": "amy", "name": "Amy" })).unwrap();
        let PrimaryData::Single(ro) = &doc.data else {
            panic!("expected single primary data");
        };
        assert_eq!(ro.id, "amy");
        assert_eq!(ro.attributes["team"], "core");

        let value = adapter
            .decode_str(r#"{ "data": { "type": "people", "id": "amy", "attributes": { "name": "Amy" } } }"#)
            .unwrap();
        assert_eq!(value, json!({ "handle": "amy", "name": "Amy", "team": "core" }));
    }
}
