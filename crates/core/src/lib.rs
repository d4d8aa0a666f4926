//! Core library: item records and the tag counts and image derivatives
//! derived from them.

pub mod catalog;
pub mod config;
pub mod derivative;
pub mod error;
pub mod images;
pub mod items;
pub mod models;
pub mod reconciler;
pub mod resize;
pub mod tags;

pub use catalog::Catalog;
pub use error::{CoreError, Result};
