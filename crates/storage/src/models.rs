use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ItemRow {
    pub id: i64,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_numbers: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub types_json: String,
    pub locations_json: String,
    pub purchase_price: Option<String>,
    pub value: Option<String>,
    pub quantity: i64,
    pub acquired_date: Option<i64>,
    pub deleted: bool,
    pub archived: bool,
    pub created_at: i64,
    pub modified_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TagRow {
    pub id: i64,
    pub category: String,
    pub name: String,
    pub name_key: String,
    pub count: i64,
    pub modified_at: i64,
}
