// Data models for gallery assets

use serde::{Deserialize, Serialize};

/// A persisted image blob plus metadata. Read-only after creation except deletion.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AssetEntry {
    pub id: String,
    pub blob: Vec<u8>,
    pub name: String,
    /// Unix milliseconds
    pub added_at: i64,
}

/// Listing row without the blob, for views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: String,
    pub name: String,
    pub added_at: i64,
    pub size_bytes: usize,
}

impl From<&AssetEntry> for AssetSummary {
    fn from(entry: &AssetEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            added_at: entry.added_at,
            size_bytes: entry.blob.len(),
        }
    }
}

/// Where the image in an analysis slot came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotSource {
    Gallery { asset_id: String, name: String },
    Upload { name: String },
}

impl SlotSource {
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            SlotSource::Gallery { asset_id, .. } => Some(asset_id),
            SlotSource::Upload { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SlotSource::Gallery { name, .. } | SlotSource::Upload { name } => name,
        }
    }
}
