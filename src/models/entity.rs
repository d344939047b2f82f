//! Identity and audit fields embedded in every persisted entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Identity, optimistic-lock version and audit timestamps.
///
/// An `id` of 0 marks an entity that has not been saved yet; stores assign
/// the identity on save. Two metas are equal when their ids are equal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EntityMeta {
    pub id: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityMeta {
    pub fn unsaved() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id != 0
    }

    /// Stamp a freshly inserted row
    pub fn assign(&mut self, id: i64) {
        let now = Utc::now();
        self.id = id;
        self.version = 1;
        self.created_at = now;
        self.updated_at = now;
    }

    /// Advance the version after a successful update
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

impl PartialEq for EntityMeta {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityMeta {}
