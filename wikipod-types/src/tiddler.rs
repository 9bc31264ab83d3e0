//! The tiddler record.
//!
//! A tiddler is a fixed core of well-known fields plus an open extension map.
//! Unknown fields survive a save/load cycle untouched.

use crate::{Error, WikiTimestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Content type assumed when a tiddler carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "text/vnd.tiddlywiki";

/// A loosely typed field bag, the shape the codec and the index file work on.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// The unit of synchronization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tiddler {
    /// Unique, stable identifier.
    pub title: String,
    /// Body. `None` in skinny form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// MIME-like content type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<WikiTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<WikiTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    /// Unordered tag set.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Ordered title references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<String>,
    /// Container the tiddler was last seen in. Kept by the host, never sent
    /// to the store.
    #[serde(skip)]
    pub location: Option<String>,
    /// Every other field.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Tiddler {
    /// Creates an empty tiddler with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Sets the body text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Sets the location hint.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// The content type, falling back to the wiki's native type.
    pub fn effective_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Returns true if the body is absent.
    pub fn is_skinny(&self) -> bool {
        self.text.is_none()
    }

    /// Returns a copy without the body.
    #[must_use]
    pub fn to_skinny(&self) -> Self {
        Self {
            text: None,
            ..self.clone()
        }
    }

    /// Flattens the tiddler into a field bag. `location` is not included.
    pub fn to_fields(&self) -> Result<FieldMap, Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(Error::MissingField("title")),
        }
    }

    /// Rebuilds a tiddler from a field bag. The bag must carry a title.
    pub fn from_fields(fields: FieldMap) -> Result<Self, Error> {
        if !fields.contains_key("title") {
            return Err(Error::MissingField("title"));
        }
        Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
    }

    /// Rebuilds a tiddler from a field bag that is keyed externally by title,
    /// such as an index file entry or a decoded metadata sidecar.
    pub fn from_fields_with_title(title: &str, mut fields: FieldMap) -> Result<Self, Error> {
        fields.insert("title".to_string(), serde_json::Value::String(title.to_string()));
        Self::from_fields(fields)
    }
}
