//! Operator commands over a [`Catalog`]. Each returns a serialisable value so
//! the binary can print either JSON or plain text.

use anyhow::{Context, Result};
use inventory_core::images::ImageUpload;
use inventory_core::models::{Category, Item, ItemId, Tag};
use inventory_core::tags::TagOrder;
use inventory_core::{Catalog, CoreError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct TagLine {
    pub category: Category,
    pub name: String,
    pub count: i64,
}

impl From<Tag> for TagLine {
    fn from(t: Tag) -> Self {
        Self {
            category: t.category,
            name: t.name,
            count: t.count,
        }
    }
}

pub fn parse_order(s: &str) -> Result<Option<TagOrder>> {
    match s {
        "" | "id" => Ok(None),
        "count" => Ok(Some(TagOrder::Count)),
        "name" => Ok(Some(TagOrder::Name)),
        other => anyhow::bail!("unknown tag order: {other} (expected count|name|id)"),
    }
}

pub async fn list_tags(
    catalog: &Catalog,
    category: Option<&str>,
    order: &str,
) -> Result<Vec<TagLine>> {
    let category = category.map(str::parse::<Category>).transpose()?;
    let tags = catalog.tags().list(category, parse_order(order)?).await?;
    Ok(tags.into_iter().map(TagLine::from).collect())
}

pub async fn top_tags(catalog: &Catalog, category: &str) -> Result<Vec<TagLine>> {
    let tags = catalog.top_tags(category.parse()?).await?;
    Ok(tags.into_iter().map(TagLine::from).collect())
}

/// Create an item from command-line fields after boundary validation.
pub async fn add_item(
    catalog: &Catalog,
    name: &str,
    types: &[String],
    locations: &[String],
    manufacturer: Option<String>,
) -> Result<Item> {
    let mut item = Item::new(name.trim())
        .with_types(types.iter().map(|s| s.trim()))
        .with_locations(locations.iter().map(|s| s.trim()));
    item.manufacturer = manufacturer;
    item.validate()?;
    let changes = catalog.save_item(&mut item).await?;
    info!(item = ?item.id, created = changes.types.incremented.len() + changes.locations.incremented.len(), "item added");
    Ok(item)
}

pub async fn show_item(catalog: &Catalog, id: ItemId) -> Result<Item> {
    let item = catalog.items().get(id).await?;
    Ok(item.ok_or(CoreError::ItemNotFound(id))?)
}

pub async fn list_items(catalog: &Catalog, archived: bool, query: Option<&str>) -> Result<Vec<Item>> {
    let items = match query {
        Some(q) => catalog.items().search(q, archived).await?,
        None if archived => catalog.items().list_archived().await?,
        None => catalog.items().list(false).await?,
    };
    Ok(items)
}

/// Read files from disk as uploads. With `generate_names` each upload is
/// renamed `<unix>i<n>.<ext>` from its content.
pub fn read_uploads(paths: &[PathBuf], generate_names: bool) -> Result<Vec<ImageUpload>> {
    paths
        .iter()
        .enumerate()
        .map(|(n, path)| {
            let bytes =
                std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
            if generate_names {
                return Ok(ImageUpload::generated(bytes, n));
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("no usable file name in {}", path.display()))?;
            Ok(ImageUpload::new(name, bytes))
        })
        .collect()
}

pub async fn upload(
    catalog: &Catalog,
    id: ItemId,
    paths: &[PathBuf],
    generate_names: bool,
) -> Result<Vec<String>> {
    let uploads = read_uploads(paths, generate_names)?;
    Ok(catalog.upload_images(id, uploads).await?)
}

pub async fn image_path(
    catalog: &Catalog,
    id: ItemId,
    filename: &str,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<PathBuf> {
    catalog
        .image_path(id, filename, width, height)
        .await?
        .with_context(|| format!("image {filename} of item {id} is unavailable"))
}

pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
