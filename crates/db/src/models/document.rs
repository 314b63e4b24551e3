//! Uploaded source document model.

use docureel_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `documents` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: DbId,
    pub project_id: DbId,
    pub file_path: String,
    pub page_count: Option<i32>,
    pub extracted_text: Option<String>,
    pub created_at: Timestamp,
}
