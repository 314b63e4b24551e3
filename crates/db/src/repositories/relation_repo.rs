//! Repository for the `relation_tuples` permission table.
//!
//! A permission check is a single relation-tuple lookup:
//! `(subject, namespace, object, relation)` exists ⇒ allowed.

use sqlx::PgPool;

/// Provides relation-tuple checks and maintenance.
pub struct RelationRepo;

impl RelationRepo {
    /// Check whether the subject holds `relation` on `namespace:object`.
    pub async fn check(
        pool: &PgPool,
        subject: &str,
        namespace: &str,
        object: &str,
        relation: &str,
    ) -> Result<bool, sqlx::Error> {
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM relation_tuples
             WHERE subject = $1 AND namespace = $2 AND object = $3 AND relation = $4
             LIMIT 1",
        )
        .bind(subject)
        .bind(namespace)
        .bind(object)
        .bind(relation)
        .fetch_optional(pool)
        .await?;
        Ok(exists.is_some())
    }

    /// Grant a relation. Idempotent.
    pub async fn grant(
        pool: &PgPool,
        subject: &str,
        namespace: &str,
        object: &str,
        relation: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO relation_tuples (subject, namespace, object, relation)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT DO NOTHING",
        )
        .bind(subject)
        .bind(namespace)
        .bind(object)
        .bind(relation)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Revoke a relation. Returns `true` if a tuple was removed.
    pub async fn revoke(
        pool: &PgPool,
        subject: &str,
        namespace: &str,
        object: &str,
        relation: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM relation_tuples
             WHERE subject = $1 AND namespace = $2 AND object = $3 AND relation = $4",
        )
        .bind(subject)
        .bind(namespace)
        .bind(object)
        .bind(relation)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
