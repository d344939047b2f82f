//! Book category model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::entity::EntityMeta;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub description: Option<String>,
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.meta == other.meta
    }
}

impl Category {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            meta: EntityMeta::unsaved(),
            name: name.into(),
            description,
        }
    }

    pub fn id(&self) -> i64 {
        self.meta.id
    }
}

/// Create or replace category request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}
