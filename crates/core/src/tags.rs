//! Tag Repository: per-(category, name) reference counts.
//!
//! Names are matched case-insensitively through the `name_key` column; the
//! display casing of the first reference is kept in `name`. A stored tag
//! always has `count > 0`.

use chrono::Utc;
use sqlx::SqlitePool;
use storage::models::TagRow;
use tracing::debug;

use crate::error::Result;
use crate::models::{tag_key, Category, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOrder {
    /// Highest count first, name ascending on ties.
    Count,
    /// Name ascending.
    Name,
}

/// Outcome of an atomic decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    /// The tag did not exist; nothing changed.
    Missing,
    /// Count went down and is still positive.
    Decremented,
    /// Count reached zero and the tag was removed.
    Deleted,
}

#[derive(Clone)]
pub struct TagRepository {
    pool: SqlitePool,
}

impl TagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_name(&self, category: Category, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query_as::<_, TagRow>(
            "SELECT id, category, name, name_key, count, modified_at FROM tags WHERE category = ?1 AND name_key = ?2",
        )
        .bind(category.as_str())
        .bind(tag_key(name))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Tag::try_from).transpose()
    }

    /// Write `tag` as-is. A tag whose count is not positive is deleted instead,
    /// so zero-count rows never reach storage.
    pub async fn upsert(&self, tag: &mut Tag) -> Result<()> {
        if tag.count <= 0 {
            return self.delete(tag).await;
        }
        tag.modified_at = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO tags (category, name, name_key, count, modified_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(category, name_key) DO UPDATE SET
                name=excluded.name,
                count=excluded.count,
                modified_at=excluded.modified_at
            "#,
        )
        .bind(tag.category.as_str())
        .bind(&tag.name)
        .bind(tag.key())
        .bind(tag.count)
        .bind(tag.modified_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, tag: &Tag) -> Result<()> {
        sqlx::query("DELETE FROM tags WHERE category = ?1 AND name_key = ?2")
            .bind(tag.category.as_str())
            .bind(tag.key())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Tags, optionally restricted to one category.
    pub async fn list(&self, category: Option<Category>, order: Option<TagOrder>) -> Result<Vec<Tag>> {
        let order_by = match order {
            Some(TagOrder::Count) => " ORDER BY count DESC, name_key ASC",
            Some(TagOrder::Name) => " ORDER BY name_key ASC",
            None => " ORDER BY id",
        };
        let rows = match category {
            Some(category) => {
                let sql = format!(
                    "SELECT id, category, name, name_key, count, modified_at FROM tags WHERE category = ?1{order_by}"
                );
                sqlx::query_as::<_, TagRow>(&sql)
                    .bind(category.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT id, category, name, name_key, count, modified_at FROM tags{order_by}"
                );
                sqlx::query_as::<_, TagRow>(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.into_iter().map(Tag::try_from).collect()
    }

    /// The `n` most referenced tags of a category.
    pub async fn top_n(&self, category: Category, n: usize) -> Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT id, category, name, name_key, count, modified_at FROM tags WHERE category = ?1 \
             ORDER BY count DESC, name_key ASC LIMIT ?2",
        )
        .bind(category.as_str())
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Tag::try_from).collect()
    }

    /// Increment-or-create as one statement. Returns the new count.
    pub async fn increment(&self, category: Category, name: &str) -> Result<i64> {
        let now = Utc::now().timestamp();
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tags (category, name, name_key, count, modified_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            ON CONFLICT(category, name_key) DO UPDATE SET
                count=tags.count + 1,
                modified_at=excluded.modified_at
            RETURNING count
            "#,
        )
        .bind(category.as_str())
        .bind(name)
        .bind(tag_key(name))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        debug!(%category, tag = name, count, "tag incremented");
        Ok(count)
    }

    /// Decrement-or-delete inside one transaction, so no reader ever sees a
    /// zero count.
    pub async fn decrement(&self, category: Category, name: &str) -> Result<Decrement> {
        let key = tag_key(name);
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE tags SET count = count - 1, modified_at = ?3 WHERE category = ?1 AND name_key = ?2 AND count > 1",
        )
        .bind(category.as_str())
        .bind(&key)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;
        let outcome = if updated.rows_affected() > 0 {
            Decrement::Decremented
        } else {
            let deleted = sqlx::query(
                "DELETE FROM tags WHERE category = ?1 AND name_key = ?2 AND count <= 1",
            )
            .bind(category.as_str())
            .bind(&key)
            .execute(&mut *tx)
            .await?;
            if deleted.rows_affected() > 0 {
                Decrement::Deleted
            } else {
                Decrement::Missing
            }
        };
        tx.commit().await?;
        debug!(%category, tag = name, ?outcome, "tag decremented");
        Ok(outcome)
    }
}
