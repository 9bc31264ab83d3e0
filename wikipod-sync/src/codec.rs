//! Metadata codec.
//!
//! Non-body fields travel to the pod as a linked-data sidecar. The default
//! [`TurtleCodec`] writes the store's native Turtle: one triple per field on
//! the sidecar itself (`<>`), with the wiki's well-known fields mapped onto
//! schema.org predicates and every other field under [`WIKI_VOCAB`].
//!
//! Tags are written as one `schema:keywords` triple per tag. Other arrays and
//! objects are kept whole as `rdf:JSON` literals so list order survives.
//!
//! [`JsonLdCodec`] carries the same mapping as a JSON-LD `@context`, for
//! stores that prefer JSON.

use crate::error::{SyncError, SyncResult};
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{Literal, NamedNode, NamedNodeRef, Subject, Term, Triple};
use oxttl::{TurtleParser, TurtleSerializer};
use serde_json::{Number, Value, json};
use std::collections::BTreeMap;
use tracing::debug;
use wikipod_types::FieldMap;

/// Fields never written to the sidecar.
pub const TRANSIENT_FIELDS: &[&str] = &["text", "revision", "bag"];

/// JSON-LD keywords wrapped around the plain fields.
const ENVELOPE_KEYS: &[&str] = &["@context", "@id", "@type"];

/// Namespace for fields without a schema.org counterpart.
pub const WIKI_VOCAB: &str = "https://tiddlywiki.com/fields#";

const SCHEMA: &str = "http://schema.org/";

/// Well-known fields and their schema.org predicates.
const FIELD_PREDICATES: &[(&str, &str)] = &[
    ("title", "http://schema.org/name"),
    ("type", "http://schema.org/encodingFormat"),
    ("created", "http://schema.org/dateCreated"),
    ("modified", "http://schema.org/dateModified"),
    ("creator", "http://schema.org/creator"),
    ("modifier", "http://schema.org/contributor"),
    ("tags", "http://schema.org/keywords"),
    ("list", "http://schema.org/hasPart"),
    ("caption", "http://schema.org/alternateName"),
];

const CREATIVE_WORK: &str = "http://schema.org/CreativeWork";
const RDF_JSON: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#JSON";

/// Resolves `<>` while parsing; a store may also answer with the sidecar's
/// absolute URL as subject.
const SIDECAR_BASE: &str = "https://wikipod.invalid/sidecar";

/// Converts tiddler fields to and from the store's linked-data text form.
pub trait MetadataCodec: Send + Sync {
    /// MIME type of the encoded text.
    fn content_type(&self) -> &'static str;

    /// Encodes every field except the body and transient fields.
    fn encode(&self, fields: &FieldMap) -> SyncResult<String>;

    /// Decodes a sidecar back into plain fields.
    fn decode(&self, text: &str) -> SyncResult<FieldMap>;
}

fn is_encoded(key: &str) -> bool {
    !TRANSIENT_FIELDS.contains(&key) && !key.starts_with('@')
}

// ── Turtle ───────────────────────────────────────────────────────

/// Turtle codec over the schema.org mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurtleCodec;

impl TurtleCodec {
    /// Predicate IRI for a field name.
    pub fn predicate(field: &str) -> String {
        match FIELD_PREDICATES.iter().find(|(name, _)| *name == field) {
            Some((_, iri)) => (*iri).to_string(),
            None => format!("{WIKI_VOCAB}{}", urlencoding::encode(field)),
        }
    }

    /// Field name for a predicate IRI, if it belongs to the mapping.
    pub fn field(predicate: &str) -> Option<String> {
        if let Some((name, _)) = FIELD_PREDICATES.iter().find(|(_, iri)| *iri == predicate) {
            return Some((*name).to_string());
        }
        let local = predicate.strip_prefix(WIKI_VOCAB)?;
        urlencoding::decode(local).ok().map(|name| name.into_owned())
    }

    fn objects(field: &str, value: &Value) -> SyncResult<Vec<Term>> {
        let literal = match value {
            Value::Array(items) if field == "tags" => {
                return items
                    .iter()
                    .map(|item| match item {
                        Value::String(tag) => {
                            Ok(Term::from(Literal::new_simple_literal(tag.as_str())))
                        }
                        other => Err(SyncError::Encode(format!("tag {other} is not a string"))),
                    })
                    .collect();
            }
            Value::String(s) => Literal::new_simple_literal(s.as_str()),
            Value::Bool(b) => Literal::new_typed_literal(b.to_string(), xsd::BOOLEAN),
            Value::Number(n) if n.is_f64() => {
                Literal::new_typed_literal(n.to_string(), xsd::DOUBLE)
            }
            Value::Number(n) => Literal::new_typed_literal(n.to_string(), xsd::INTEGER),
            other => Literal::new_typed_literal(
                serde_json::to_string(other)?,
                NamedNodeRef::new_unchecked(RDF_JSON),
            ),
        };
        Ok(vec![literal.into()])
    }

    fn value(literal: &Literal) -> SyncResult<Value> {
        let text = literal.value();
        let datatype = literal.datatype();
        let bad = |kind: &str| SyncError::Decode(format!("{text:?} is not a valid {kind}"));

        if datatype == xsd::BOOLEAN {
            text.parse::<bool>().map(Value::Bool).map_err(|_| bad("boolean"))
        } else if datatype == xsd::INTEGER {
            text.parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| bad("integer"))
        } else if datatype == xsd::DOUBLE || datatype == xsd::DECIMAL {
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| bad("double"))
        } else if datatype.as_str() == RDF_JSON {
            serde_json::from_str(text).map_err(|_| bad("JSON literal"))
        } else {
            Ok(Value::String(text.to_string()))
        }
    }
}

impl MetadataCodec for TurtleCodec {
    fn content_type(&self) -> &'static str {
        "text/turtle"
    }

    fn encode(&self, fields: &FieldMap) -> SyncResult<String> {
        // `<>`: the sidecar resource itself, resolved by the store on write.
        let subject = NamedNode::new_unchecked("");
        let mut triples = vec![Triple::new(
            subject.clone(),
            rdf::TYPE,
            NamedNode::new_unchecked(CREATIVE_WORK),
        )];

        for (key, value) in fields {
            if !is_encoded(key) {
                continue;
            }
            let predicate = NamedNode::new(Self::predicate(key))
                .map_err(|e| SyncError::Encode(format!("field {key:?}: {e}")))?;
            for object in Self::objects(key, value)? {
                triples.push(Triple::new(subject.clone(), predicate.clone(), object));
            }
        }

        let mut writer = TurtleSerializer::new().for_writer(Vec::new());
        for triple in &triples {
            writer
                .serialize_triple(triple)
                .map_err(|e| SyncError::Encode(e.to_string()))?;
        }
        let bytes = writer.finish().map_err(|e| SyncError::Encode(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| SyncError::Encode(e.to_string()))
    }

    fn decode(&self, text: &str) -> SyncResult<FieldMap> {
        let parser = TurtleParser::new()
            .with_base_iri(SIDECAR_BASE)
            .map_err(|e| SyncError::Decode(e.to_string()))?;

        let mut node: Option<Subject> = None;
        let mut values: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        let mut triples = 0usize;

        for triple in parser.for_slice(text.as_bytes()) {
            let triple =
                triple.map_err(|e| SyncError::Decode(format!("sidecar is not Turtle: {e}")))?;
            triples += 1;

            match &node {
                Some(subject) if *subject != triple.subject => {
                    return Err(SyncError::Decode(
                        "sidecar describes more than one resource".to_string(),
                    ));
                }
                Some(_) => {}
                None => node = Some(triple.subject.clone()),
            }

            if triple.predicate.as_ref() == rdf::TYPE {
                continue;
            }
            let Some(field) = Self::field(triple.predicate.as_str()) else {
                debug!("Ignoring unmapped predicate {}", triple.predicate);
                continue;
            };
            let value = match &triple.object {
                Term::Literal(literal) => Self::value(literal)?,
                Term::NamedNode(iri) => Value::String(iri.as_str().to_string()),
                _ => {
                    debug!("Ignoring non-literal value of {:?}", field);
                    continue;
                }
            };

            values.entry(field).or_default().push(value);
        }

        if triples == 0 {
            return Err(SyncError::Decode("sidecar is empty".to_string()));
        }

        let mut fields = FieldMap::new();
        for (field, mut found) in values {
            let value = if field == "tags" || found.len() > 1 {
                Value::Array(found)
            } else {
                found.remove(0)
            };
            fields.insert(field, value);
        }
        Ok(fields)
    }
}

// ── JSON-LD ──────────────────────────────────────────────────────

/// JSON-LD codec with a schema.org context.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLdCodec;

impl JsonLdCodec {
    /// The fixed `@context` block.
    pub fn context() -> Value {
        json!({
            "@vocab": WIKI_VOCAB,
            "schema": SCHEMA,
            "title": "schema:name",
            "type": "schema:encodingFormat",
            "created": { "@id": "schema:dateCreated" },
            "modified": { "@id": "schema:dateModified" },
            "creator": "schema:creator",
            "modifier": "schema:contributor",
            "tags": "schema:keywords",
            "list": "schema:hasPart",
            "caption": "schema:alternateName"
        })
    }
}

impl MetadataCodec for JsonLdCodec {
    fn content_type(&self) -> &'static str {
        "application/ld+json"
    }

    fn encode(&self, fields: &FieldMap) -> SyncResult<String> {
        let mut doc = FieldMap::new();
        doc.insert("@context".to_string(), Self::context());
        doc.insert("@id".to_string(), Value::String(String::new()));
        doc.insert("@type".to_string(), Value::String("schema:CreativeWork".to_string()));

        for (key, value) in fields {
            if is_encoded(key) {
                doc.insert(key.clone(), value.clone());
            }
        }

        Ok(serde_json::to_string_pretty(&Value::Object(doc))?)
    }

    fn decode(&self, text: &str) -> SyncResult<FieldMap> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SyncError::Decode(format!("sidecar is not JSON-LD: {e}")))?;

        // Some stores answer with a single-node @graph wrapper.
        let node = match value {
            Value::Object(mut map) if map.contains_key("@graph") => match map.remove("@graph") {
                Some(Value::Array(mut nodes)) if nodes.len() == 1 => nodes.remove(0),
                Some(node @ Value::Object(_)) => node,
                _ => return Err(SyncError::Decode("unexpected @graph shape".to_string())),
            },
            other => other,
        };

        let Value::Object(mut fields) = node else {
            return Err(SyncError::Decode("sidecar is not a JSON object".to_string()));
        };

        for key in ENVELOPE_KEYS {
            fields.remove(*key);
        }
        Ok(fields)
    }
}
