//! Repository for the `documents` table.

use docureel_core::types::DbId;
use sqlx::PgPool;

use crate::models::document::Document;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, file_path, page_count, extracted_text, created_at";

/// Provides insert/read operations for uploaded documents.
pub struct DocumentRepo;

impl DocumentRepo {
    /// Record an uploaded document, returning the created row.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        file_path: &str,
        page_count: Option<i32>,
        extracted_text: Option<&str>,
    ) -> Result<Document, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents (project_id, file_path, page_count, extracted_text)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(project_id)
            .bind(file_path)
            .bind(page_count)
            .bind(extracted_text)
            .fetch_one(pool)
            .await
    }

    /// Find a document by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Document>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
