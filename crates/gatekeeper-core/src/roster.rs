//! Caller-supplied user roster, read as a JSON array of user records.

use crate::types::{Embedding, RosterEntry};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("roster is not a JSON array of user records: {0}")]
    Json(#[from] serde_json::Error),
}

/// One user record as stored by the calling application.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    /// Stored embedding, either a JSON array or its string rendering.
    #[serde(default)]
    pub encodedimagedata: StoredEmbedding,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{n}"),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredEmbedding {
    Values(Vec<f32>),
    Encoded(String),
    /// Missing, null, or any other shape; never decodes.
    Other(serde_json::Value),
}

impl Default for StoredEmbedding {
    fn default() -> Self {
        StoredEmbedding::Other(serde_json::Value::Null)
    }
}

impl StoredEmbedding {
    /// Decode into a vector. Strings may be `"[0.1, 0.2]"` or whitespace separated.
    pub fn decode(&self) -> Option<Vec<f32>> {
        match self {
            StoredEmbedding::Values(v) => Some(v.clone()),
            StoredEmbedding::Encoded(s) => s
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|tok| !tok.is_empty())
                .map(|tok| tok.parse::<f32>().ok())
                .collect(),
            StoredEmbedding::Other(_) => None,
        }
    }
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// Parse the roster JSON. Records whose embedding cannot be decoded are
/// skipped with a warning rather than failing the whole roster.
pub fn parse_roster(json: &str) -> Result<Vec<RosterEntry>, RosterError> {
    let records: Vec<UserRecord> = serde_json::from_str(json)?;
    let total = records.len();

    let entries: Vec<RosterEntry> = records
        .into_iter()
        .filter_map(|record| match record.encodedimagedata.decode() {
            Some(values) if !values.is_empty() => Some(RosterEntry {
                id: record.id.to_string(),
                name: record.display_name(),
                embedding: Embedding::new(values),
            }),
            _ => {
                tracing::warn!(id = %record.id, "skipping user with unreadable embedding");
                None
            }
        })
        .collect();

    tracing::debug!(total, usable = entries.len(), "roster parsed");
    Ok(entries)
}
