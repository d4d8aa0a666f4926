use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::TagChanges;
use crate::models::ItemId;
use crate::reconciler::ReconcileError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),
    #[error("invalid item: {0}")]
    Validation(String),
    #[error("invalid image filename {name:?}: {reason}")]
    InvalidFilename { name: String, reason: &'static str },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image transform failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("corrupt stored record: {0}")]
    Corrupt(#[from] serde_json::Error),
    /// Tag counts stopped part-way. `applied` holds every change that
    /// reached storage, across categories.
    #[error("tag counts partially applied")]
    TagSync {
        applied: Box<TagChanges>,
        #[source]
        source: Box<ReconcileError>,
    },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
