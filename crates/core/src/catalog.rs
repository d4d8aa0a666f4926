//! Catalog: the item use cases that keep tag counts and image derivatives in
//! step with the canonical item record.
//!
//! Every mutation persists the item first, then applies the tag diff, then
//! tears down images. Nothing is rolled back if a later step fails.

use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::path::PathBuf;
use storage::{connect, migrate};
use tracing::info;

use crate::config::AppConfig;
use crate::error::{CoreError, Result};
use crate::images::{DerivativeCache, ImageUpload};
use crate::items::ItemRepository;
use crate::models::{Category, Item, ItemId, Lifecycle, Tag};
use crate::reconciler::{ReconcileReport, TagReconciler};
use crate::tags::TagRepository;

/// Tag changes applied by one use case, per category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TagChanges {
    pub types: ReconcileReport,
    pub locations: ReconcileReport,
}

impl TagChanges {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.locations.is_empty()
    }

    fn slot(&mut self, category: Category) -> &mut ReconcileReport {
        match category {
            Category::Type => &mut self.types,
            Category::Location => &mut self.locations,
        }
    }
}

/// One image picked to illustrate a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCover {
    pub tag: String,
    pub item: ItemId,
    pub filename: String,
}

pub struct Catalog {
    pool: SqlitePool,
    items: ItemRepository,
    tags: TagRepository,
    reconciler: TagReconciler,
    images: DerivativeCache,
    top_n: usize,
}

impl Catalog {
    /// Connect, run migrations and prepare the image root. Call once at
    /// startup before serving anything.
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = connect(&config.database.path).await.context("db connect")?;
        migrate(&pool).await.context("db migrate")?;
        tokio::fs::create_dir_all(&config.images.base_path)
            .await
            .with_context(|| format!("create image root {}", config.images.base_path))?;
        info!(db = %config.database.path, images = %config.images.base_path, "catalog ready");
        Ok(Self::new(pool, DerivativeCache::from_config(&config.images)).with_top_n(config.tags.top_n))
    }

    pub fn new(pool: SqlitePool, images: DerivativeCache) -> Self {
        let items = ItemRepository::new(pool.clone());
        let tags = TagRepository::new(pool.clone());
        let reconciler = TagReconciler::new(tags.clone());
        Self {
            pool,
            items,
            tags,
            reconciler,
            images,
            top_n: 5,
        }
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn items(&self) -> &ItemRepository {
        &self.items
    }

    pub fn tags(&self) -> &TagRepository {
        &self.tags
    }

    pub fn images(&self) -> &DerivativeCache {
        &self.images
    }

    /// Persist `item` and move the tag counts from its stored contribution
    /// to its new one. A record saved into the archived or deleted state
    /// loses its images as through `archive_item`/`delete_item`.
    pub async fn save_item(&self, item: &mut Item) -> Result<TagChanges> {
        let prior = match item.id {
            Some(id) => self.items.get(id).await?,
            None => None,
        };
        let id = self.items.save(item).await?;
        let changes = self
            .reconcile(|category| {
                let before = prior
                    .as_ref()
                    .map(|p| p.counted_tags(category))
                    .unwrap_or_default();
                (before, item.counted_tags(category))
            })
            .await?;
        let lifecycle = item.lifecycle();
        if lifecycle != Lifecycle::Active && prior.map(|p| p.lifecycle()) != Some(lifecycle) {
            self.images.delete_all(id).await?;
        }
        info!(item = %id, changed = !changes.is_empty(), "item saved");
        Ok(changes)
    }

    /// Soft delete: withdraw the tag contribution and drop every image.
    pub async fn delete_item(&self, id: ItemId) -> Result<TagChanges> {
        let mut item = self.require(id).await?;
        let before = Self::contribution(&item);
        self.items.delete(&mut item).await?;
        let changes = self.reconcile(|c| (before[c as usize].clone(), Default::default())).await?;
        self.images.delete_all(id).await?;
        info!(item = %id, "item deleted");
        Ok(changes)
    }

    /// Archiving removes the item from tag browsing and drops its images.
    pub async fn archive_item(&self, id: ItemId) -> Result<TagChanges> {
        let mut item = self.require(id).await?;
        let before = Self::contribution(&item);
        self.items.archive(&mut item).await?;
        let changes = self.reconcile(|c| (before[c as usize].clone(), Default::default())).await?;
        self.images.delete_all(id).await?;
        info!(item = %id, "item archived");
        Ok(changes)
    }

    /// Restore an archived item and its tag contribution.
    pub async fn unarchive_item(&self, id: ItemId) -> Result<TagChanges> {
        let mut item = self.require(id).await?;
        let before = Self::contribution(&item);
        self.items.unarchive(&mut item).await?;
        let changes = self
            .reconcile(|c| (before[c as usize].clone(), item.counted_tags(c)))
            .await?;
        info!(item = %id, "item unarchived");
        Ok(changes)
    }

    pub async fn upload_images(&self, id: ItemId, files: Vec<ImageUpload>) -> Result<Vec<String>> {
        self.require(id).await?;
        self.images.store(id, files).await
    }

    pub async fn item_images(&self, id: ItemId) -> Result<Vec<String>> {
        self.require(id).await?;
        self.images.list_originals(id).await
    }

    /// Path to the original or a derivative of it, `None` if the image is
    /// unavailable.
    pub async fn image_path(
        &self,
        id: ItemId,
        filename: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Option<PathBuf>> {
        self.require(id).await?;
        self.images.resolve(id, filename, width, height).await
    }

    pub async fn delete_image(&self, id: ItemId, filename: &str) -> Result<usize> {
        self.require(id).await?;
        self.images.delete_one(id, filename).await
    }

    /// The configured number of most referenced tags in `category`.
    pub async fn top_tags(&self, category: Category) -> Result<Vec<Tag>> {
        self.tags.top_n(category, self.top_n).await
    }

    /// For each tag, the first image of the first item carrying it that has
    /// any images. Tags with no illustrated item are left out.
    pub async fn tag_cover_images(&self, tags: &[Tag]) -> Result<Vec<TagCover>> {
        let mut covers = Vec::new();
        for tag in tags {
            for item in self.items.all_by_tag(tag.category, &tag.name).await? {
                let Some(id) = item.id else { continue };
                if let Some(filename) = self.images.list_originals(id).await?.into_iter().next() {
                    covers.push(TagCover {
                        tag: tag.name.clone(),
                        item: id,
                        filename,
                    });
                    break;
                }
            }
        }
        Ok(covers)
    }

    async fn require(&self, id: ItemId) -> Result<Item> {
        self.items.get(id).await?.ok_or(CoreError::ItemNotFound(id))
    }

    fn contribution(item: &Item) -> [BTreeSet<String>; 2] {
        Category::ALL.map(|c| item.counted_tags(c))
    }

    async fn reconcile<F>(&self, mut sets: F) -> Result<TagChanges>
    where
        F: FnMut(Category) -> (BTreeSet<String>, BTreeSet<String>),
    {
        let mut changes = TagChanges::default();
        for category in Category::ALL {
            let (before, after) = sets(category);
            match self.reconciler.reconcile(category, &before, &after).await {
                Ok(report) => *changes.slot(category) = report,
                Err(e) => {
                    *changes.slot(category) = e.applied.clone();
                    return Err(CoreError::TagSync {
                        applied: Box::new(changes),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(changes)
    }
}
