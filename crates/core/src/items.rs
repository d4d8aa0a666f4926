//! Item Repository: canonical CRUD for item records.
//!
//! The repository never touches tag counts or images; callers sequence those
//! (see [`crate::catalog`]).

use chrono::Utc;
use sqlx::SqlitePool;
use storage::models::ItemRow;
use tracing::debug;

use crate::error::Result;
use crate::models::{tag_key, Category, Item, ItemId};

const COLUMNS: &str = "id, name, manufacturer, model, serial_numbers, url, notes, types_json, \
     locations_json, purchase_price, value, quantity, acquired_date, deleted, archived, \
     created_at, modified_at";

#[derive(Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert by id. Assigns an id to new records and stamps `modified_at`.
    pub async fn save(&self, item: &mut Item) -> Result<ItemId> {
        let now = Utc::now().timestamp();
        item.modified_at = now;
        if item.created_at == 0 {
            item.created_at = now;
        }
        let types_json = serde_json::to_string(item.types())?;
        let locations_json = serde_json::to_string(item.locations())?;

        let res = sqlx::query(
            r#"
            INSERT INTO items (id, name, manufacturer, model, serial_numbers, url, notes,
                types_json, locations_json, purchase_price, value, quantity, acquired_date,
                deleted, archived, created_at, modified_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(id) DO UPDATE SET
                name=excluded.name,
                manufacturer=excluded.manufacturer,
                model=excluded.model,
                serial_numbers=excluded.serial_numbers,
                url=excluded.url,
                notes=excluded.notes,
                types_json=excluded.types_json,
                locations_json=excluded.locations_json,
                purchase_price=excluded.purchase_price,
                value=excluded.value,
                quantity=excluded.quantity,
                acquired_date=excluded.acquired_date,
                deleted=excluded.deleted,
                archived=excluded.archived,
                modified_at=excluded.modified_at
            "#,
        )
        .bind(item.id.map(|id| id.0))
        .bind(&item.name)
        .bind(&item.manufacturer)
        .bind(&item.model)
        .bind(&item.serial_numbers)
        .bind(&item.url)
        .bind(&item.notes)
        .bind(types_json)
        .bind(locations_json)
        .bind(&item.purchase_price)
        .bind(&item.value)
        .bind(item.quantity)
        .bind(item.acquired_date)
        .bind(item.deleted)
        .bind(item.archived)
        .bind(item.created_at)
        .bind(item.modified_at)
        .execute(&self.pool)
        .await?;

        let id = match item.id {
            Some(id) => id,
            None => {
                let id = ItemId(res.last_insert_rowid());
                item.id = Some(id);
                id
            }
        };
        debug!(item = %id, "item saved");
        Ok(id)
    }

    /// Fetch a record that has not been soft-deleted.
    pub async fn get(&self, id: ItemId) -> Result<Option<Item>> {
        let sql = format!("SELECT {COLUMNS} FROM items WHERE id = ?1 AND deleted = 0");
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Item::try_from).transpose()
    }

    /// Soft delete: the record stays in storage with `deleted` set.
    pub async fn delete(&self, item: &mut Item) -> Result<ItemId> {
        item.deleted = true;
        self.save(item).await
    }

    pub async fn archive(&self, item: &mut Item) -> Result<ItemId> {
        item.archived = true;
        self.save(item).await
    }

    pub async fn unarchive(&self, item: &mut Item) -> Result<ItemId> {
        item.archived = false;
        self.save(item).await
    }

    /// Non-deleted items ordered by name.
    pub async fn list(&self, with_archived: bool) -> Result<Vec<Item>> {
        let sql = if with_archived {
            format!("SELECT {COLUMNS} FROM items WHERE deleted = 0 ORDER BY name")
        } else {
            format!("SELECT {COLUMNS} FROM items WHERE deleted = 0 AND archived = 0 ORDER BY name")
        };
        self.fetch(sqlx::query_as::<_, ItemRow>(&sql)).await
    }

    pub async fn list_archived(&self) -> Result<Vec<Item>> {
        let sql = format!("SELECT {COLUMNS} FROM items WHERE deleted = 0 AND archived = 1 ORDER BY name");
        self.fetch(sqlx::query_as::<_, ItemRow>(&sql)).await
    }

    /// Full-text search over item text fields. Any matching term is enough.
    pub async fn search(&self, query: &str, archived: bool) -> Result<Vec<Item>> {
        let Some(expr) = fts_expression(query) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {cols} FROM items WHERE id IN (SELECT rowid FROM items_fts WHERE items_fts MATCH ?1) \
             AND deleted = 0 AND archived = ?2 ORDER BY name",
            cols = COLUMNS
        );
        self.fetch(sqlx::query_as::<_, ItemRow>(&sql).bind(expr).bind(archived))
            .await
    }

    /// Non-deleted items whose tag set for `category` contains `tag`,
    /// compared case-insensitively.
    pub async fn by_tag(&self, category: Category, tag: &str, archived: bool) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {cols} FROM items WHERE deleted = 0 AND archived = ?2 AND {member} ORDER BY name",
            cols = COLUMNS,
            member = membership_clause(category)
        );
        self.fetch(
            sqlx::query_as::<_, ItemRow>(&sql)
                .bind(tag_key(tag))
                .bind(archived),
        )
        .await
    }

    /// Any one non-deleted item carrying `tag`, lowest id first.
    pub async fn first_by_tag(&self, category: Category, tag: &str) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT {cols} FROM items WHERE deleted = 0 AND {member} ORDER BY id LIMIT 1",
            cols = COLUMNS,
            member = membership_clause(category)
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(tag_key(tag))
            .fetch_optional(&self.pool)
            .await?;
        row.map(Item::try_from).transpose()
    }

    /// Non-deleted items carrying `tag` in `category`, in id order.
    pub(crate) async fn all_by_tag(&self, category: Category, tag: &str) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {cols} FROM items WHERE deleted = 0 AND {member} ORDER BY id",
            cols = COLUMNS,
            member = membership_clause(category)
        );
        self.fetch(sqlx::query_as::<_, ItemRow>(&sql).bind(tag_key(tag)))
            .await
    }

    async fn fetch<'q>(
        &self,
        query: sqlx::query::QueryAs<'q, sqlx::Sqlite, ItemRow, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Vec<Item>> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Item::try_from).collect()
    }
}

fn membership_clause(category: Category) -> &'static str {
    match category {
        Category::Type => {
            "EXISTS (SELECT 1 FROM json_each(items.types_json) WHERE lower(json_each.value) = ?1)"
        }
        Category::Location => {
            "EXISTS (SELECT 1 FROM json_each(items.locations_json) WHERE lower(json_each.value) = ?1)"
        }
    }
}

/// Quote each whitespace-separated term so user input is never parsed as
/// FTS5 query syntax, and OR the terms together.
fn fts_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}
