//! Tag Reconciler: applies the difference between an item's tag set before
//! and after a mutation to the tag counts.
//!
//! Removals are applied before additions so that a case-only rename of a tag
//! that only this item references is a delete followed by a re-create.
//! Each count change is its own store operation; a failure part-way leaves
//! the earlier changes in place and is reported with what was applied.

use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use crate::error::CoreError;
use crate::models::Category;
use crate::tags::{Decrement, TagRepository};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub incremented: Vec<String>,
    pub decremented: Vec<String>,
    pub deleted: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.incremented.is_empty() && self.decremented.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Error)]
#[error("tag reconciliation for category {category} stopped part-way ({} added, {} removed, {} deleted before failure)", applied.incremented.len(), applied.decremented.len(), applied.deleted.len())]
pub struct ReconcileError {
    pub category: Category,
    /// Changes that reached storage before the failure.
    pub applied: ReconcileReport,
    #[source]
    pub source: CoreError,
}

#[derive(Clone)]
pub struct TagReconciler {
    tags: TagRepository,
}

impl TagReconciler {
    pub fn new(tags: TagRepository) -> Self {
        Self { tags }
    }

    pub async fn reconcile(
        &self,
        category: Category,
        before: &BTreeSet<String>,
        after: &BTreeSet<String>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();

        for name in before.difference(after) {
            match self.tags.decrement(category, name).await {
                Ok(Decrement::Decremented) => report.decremented.push(name.clone()),
                Ok(Decrement::Deleted) => report.deleted.push(name.clone()),
                Ok(Decrement::Missing) => {
                    debug!(%category, tag = %name, "removed tag had no count");
                }
                Err(source) => {
                    return Err(ReconcileError {
                        category,
                        applied: report,
                        source,
                    })
                }
            }
        }

        for name in after.difference(before) {
            match self.tags.increment(category, name).await {
                Ok(_) => report.incremented.push(name.clone()),
                Err(source) => {
                    return Err(ReconcileError {
                        category,
                        applied: report,
                        source,
                    })
                }
            }
        }

        Ok(report)
    }
}
