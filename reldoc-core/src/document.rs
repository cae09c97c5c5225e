//! Documents as the engine sees them.
//!
//! A [`Document`] is an opaque id plus an arbitrary JSON object. The engine never mutates
//! stored documents; population produces new copies carrying hydrated relation values.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, from_value};
use std::borrow::Cow;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Pseudo field exposing the document id.
pub const ID_FIELD: &str = "id";
/// Pseudo field exposing the creation timestamp.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Pseudo field exposing the last update timestamp.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// One record of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within the collection.
    pub id: String,
    /// Name of the collection the document belongs to.
    pub collection: String,
    /// Arbitrary field data.
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a document with the given id, timestamped now.
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: id.into(),
            collection: collection.into(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a document with a freshly generated id.
    pub fn with_generated_id(collection: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::new(collection, Uuid::new_v4().to_string(), data)
    }

    /// Builds a document from a JSON object such as `{"id": "p1", "title": "A"}`.
    ///
    /// The `id` key becomes the document id (generated when absent); `created_at` and
    /// `updated_at`, when present as RFC 3339 strings, become the timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDocument`] if `value` is not an object, if `id` is not
    /// a string, or if a timestamp cannot be parsed.
    pub fn from_json(collection: impl Into<String>, value: Value) -> EngineResult<Self> {
        let Value::Object(mut data) = value else {
            return Err(EngineError::InvalidDocument("expected a JSON object".to_string()));
        };

        let id = match data.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            Some(other) => {
                return Err(EngineError::InvalidDocument(format!(
                    "document id must be a string, got {other}"
                )));
            }
            None => Uuid::new_v4().to_string(),
        };
        let created_at = take_timestamp(&mut data, CREATED_AT_FIELD)?;
        let updated_at = take_timestamp(&mut data, UPDATED_AT_FIELD)?;
        let now = Utc::now();

        Ok(Self {
            id,
            collection: collection.into(),
            data,
            created_at: created_at.unwrap_or(now),
            updated_at: updated_at.or(created_at).unwrap_or(now),
        })
    }

    /// Looks up a field by name, including the `id`, `created_at` and `updated_at`
    /// pseudo fields.
    pub fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            ID_FIELD => Some(Cow::Owned(Value::String(self.id.clone()))),
            CREATED_AT_FIELD => Some(Cow::Owned(timestamp_value(&self.created_at))),
            UPDATED_AT_FIELD => Some(Cow::Owned(timestamp_value(&self.updated_at))),
            _ => self.data.get(name).map(Cow::Borrowed),
        }
    }

    /// Renders the document as a flat JSON entity: `{id, created_at, updated_at, ...data}`.
    pub fn to_entity(&self) -> Value {
        let mut entity = self.data.clone();

        entity.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        entity.insert(CREATED_AT_FIELD.to_string(), timestamp_value(&self.created_at));
        entity.insert(UPDATED_AT_FIELD.to_string(), timestamp_value(&self.updated_at));

        Value::Object(entity)
    }

    /// Deserializes the flat entity form into a caller-defined type.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Serialization`] if the entity does not fit `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> EngineResult<T> {
        Ok(from_value(self.to_entity())?)
    }
}

/// A document from the user collection, with the fields the auth layer maintains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TryFrom<&Document> for UserEntity {
    type Error = EngineError;

    fn try_from(document: &Document) -> EngineResult<Self> {
        document.decode()
    }
}

fn timestamp_value(at: &DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn take_timestamp(
    data: &mut Map<String, Value>,
    key: &str,
) -> EngineResult<Option<DateTime<Utc>>> {
    match data.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| {
                EngineError::InvalidDocument(format!("invalid `{key}` timestamp `{raw}`: {e}"))
            }),
        Some(other) => Err(EngineError::InvalidDocument(format!(
            "`{key}` must be a string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_extracts_id_and_timestamps() {
        let doc = Document::from_json(
            "posts",
            json!({"id": "p1", "title": "A", "created_at": "2024-01-02T03:04:05Z"}),
        )
        .unwrap();

        assert_eq!(doc.id, "p1");
        assert_eq!(doc.collection, "posts");
        assert_eq!(doc.data.get("title"), Some(&json!("A")));
        assert!(!doc.data.contains_key("id"));
        assert_eq!(doc.created_at, doc.updated_at);
        assert_eq!(doc.field("created_at").unwrap().as_str(), Some("2024-01-02T03:04:05.000Z"));
    }

    #[test]
    fn from_json_rejects_non_objects_and_bad_ids() {
        assert!(Document::from_json("posts", json!([1, 2])).is_err());
        assert!(Document::from_json("posts", json!({"id": 7})).is_err());
    }

    #[test]
    fn entity_flattens_data() {
        let doc = Document::from_json(
            "users",
            json!({"id": "u1", "email": "a@b.c", "roles": ["admin"]}),
        )
        .unwrap();
        let entity = doc.to_entity();

        assert_eq!(entity["id"], json!("u1"));
        assert_eq!(entity["email"], json!("a@b.c"));

        let user = UserEntity::try_from(&doc).unwrap();
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
        assert_eq!(user.roles, vec!["admin".to_string()]);
    }
}
