use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use storage::models::{ItemRow, TagRow};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(ItemId)
    }
}

/// Tag namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Type,
    Location,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Type, Category::Location];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Type => "type",
            Category::Location => "location",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "type" | "types" => Ok(Category::Type),
            "location" | "locations" => Ok(Category::Location),
            other => Err(CoreError::Validation(format!("unknown tag category: {other}"))),
        }
    }
}

/// Storage key for a tag name. Tag identity is `(category, tag_key(name))`.
pub fn tag_key(name: &str) -> String {
    name.to_lowercase()
}

/// Collect tag names into a set, dropping case-insensitive duplicates.
/// The first spelling seen wins.
pub fn tag_set<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut set = BTreeSet::new();
    for name in names {
        let name: String = name.into();
        if seen.insert(tag_key(&name)) {
            set.insert(name);
        }
    }
    set
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub category: Category,
    pub name: String,
    pub count: i64,
    pub modified_at: i64,
}

impl Tag {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            count: 0,
            modified_at: 0,
        }
    }

    pub fn key(&self) -> String {
        tag_key(&self.name)
    }
}

impl TryFrom<TagRow> for Tag {
    type Error = CoreError;

    fn try_from(row: TagRow) -> Result<Self> {
        Ok(Tag {
            category: row.category.parse()?,
            name: row.name,
            count: row.count,
            modified_at: row.modified_at,
        })
    }
}

/// Derived lifecycle of an item. `deleted` wins over `archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Archived,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Option<ItemId>,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_numbers: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    types: BTreeSet<String>,
    locations: BTreeSet<String>,
    pub purchase_price: Option<String>,
    pub value: Option<String>,
    pub quantity: i64,
    pub acquired_date: Option<i64>,
    pub deleted: bool,
    pub archived: bool,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Default for Item {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            manufacturer: None,
            model: None,
            serial_numbers: None,
            url: None,
            notes: None,
            types: BTreeSet::new(),
            locations: BTreeSet::new(),
            purchase_price: None,
            value: None,
            quantity: 1,
            acquired_date: None,
            deleted: false,
            archived: false,
            created_at: 0,
            modified_at: 0,
        }
    }
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_types(types);
        self
    }

    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_locations(locations);
        self
    }

    pub fn set_types<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = tag_set(types);
    }

    pub fn set_locations<I, S>(&mut self, locations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations = tag_set(locations);
    }

    pub fn types(&self) -> &BTreeSet<String> {
        &self.types
    }

    pub fn locations(&self) -> &BTreeSet<String> {
        &self.locations
    }

    pub fn tags(&self, category: Category) -> &BTreeSet<String> {
        match category {
            Category::Type => &self.types,
            Category::Location => &self.locations,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.deleted {
            Lifecycle::Deleted
        } else if self.archived {
            Lifecycle::Archived
        } else {
            Lifecycle::Active
        }
    }

    /// Tags this item currently contributes to the tag counts. Only active
    /// items contribute; archiving withdraws the contribution like a removal.
    pub fn counted_tags(&self, category: Category) -> BTreeSet<String> {
        match self.lifecycle() {
            Lifecycle::Active => self.tags(category).clone(),
            Lifecycle::Archived | Lifecycle::Deleted => BTreeSet::new(),
        }
    }

    /// Boundary checks for user-supplied records. The repositories assume
    /// records have already passed these.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().chars().count() < 3 {
            return Err(CoreError::Validation(
                "name must be at least 3 characters".into(),
            ));
        }
        for name in self.types.iter().chain(self.locations.iter()) {
            if !is_valid_tag_name(name) {
                return Err(CoreError::Validation(format!(
                    "tag {name:?} must be at least 3 letters, digits or dashes"
                )));
            }
        }
        for (field, price) in [
            ("purchase price", &self.purchase_price),
            ("value", &self.value),
        ] {
            if let Some(p) = price {
                if p.trim().parse::<f64>().map(|v| !v.is_finite()).unwrap_or(true) {
                    return Err(CoreError::Validation(format!("{field} must be numeric")));
                }
            }
        }
        if self.quantity < 1 {
            return Err(CoreError::Validation("quantity must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn is_valid_tag_name(name: &str) -> bool {
    name.len() >= 3 && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl TryFrom<ItemRow> for Item {
    type Error = CoreError;

    fn try_from(row: ItemRow) -> Result<Self> {
        let types: Vec<String> = serde_json::from_str(&row.types_json)?;
        let locations: Vec<String> = serde_json::from_str(&row.locations_json)?;
        Ok(Item {
            id: Some(ItemId(row.id)),
            name: row.name,
            manufacturer: row.manufacturer,
            model: row.model,
            serial_numbers: row.serial_numbers,
            url: row.url,
            notes: row.notes,
            types: tag_set(types),
            locations: tag_set(locations),
            purchase_price: row.purchase_price,
            value: row.value,
            quantity: row.quantity,
            acquired_date: row.acquired_date,
            deleted: row.deleted,
            archived: row.archived,
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_set_drops_case_duplicates() {
        let set = tag_set(["tool", "Tool", "drill", "TOOL"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("tool"));
        assert!(set.contains("drill"));
    }

    #[test]
    fn archived_items_contribute_no_tags() {
        let mut item = Item::new("Hammer").with_types(["tool"]);
        assert_eq!(item.counted_tags(Category::Type).len(), 1);
        item.archived = true;
        assert_eq!(item.lifecycle(), Lifecycle::Archived);
        assert!(item.counted_tags(Category::Type).is_empty());
        item.deleted = true;
        assert_eq!(item.lifecycle(), Lifecycle::Deleted);
    }

    #[test]
    fn validate_rejects_bad_input() {
        assert!(Item::new("Hammer").with_types(["hand-tool"]).validate().is_ok());
        assert!(Item::new("Ha").validate().is_err());
        assert!(Item::new("Hammer").with_types(["to"]).validate().is_err());
        assert!(Item::new("Hammer").with_locations(["shed 1"]).validate().is_err());

        let mut priced = Item::new("Hammer");
        priced.purchase_price = Some("12.50".into());
        assert!(priced.validate().is_ok());
        priced.value = Some("lots".into());
        assert!(priced.validate().is_err());
    }

    #[test]
    fn category_parses_both_spellings() {
        assert_eq!("types".parse::<Category>().unwrap(), Category::Type);
        assert_eq!("Location".parse::<Category>().unwrap(), Category::Location);
        assert!("colour".parse::<Category>().is_err());
    }
}
