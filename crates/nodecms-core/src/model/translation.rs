use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::{Entity, Value};
use crate::catalog::{EntityDescriptor, NODE_SOURCE, TRANSLATION};

/// Locale descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub id: i64,
    pub locale: String,
    pub name: String,
    pub available: bool,
    pub is_default: bool,
}

impl Translation {
    /// Create an available, non-default translation.
    pub fn new(id: i64, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        Self {
            id,
            name: locale.clone(),
            locale,
            available: true,
            is_default: false,
        }
    }

    /// Mark as the default translation.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Set availability.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }
}

impl Entity for Translation {
    fn descriptor() -> &'static EntityDescriptor {
        &TRANSLATION
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            locale: row.get("locale")?,
            name: row.get("name")?,
            available: row.get("available")?,
            is_default: row.get("is_default")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("locale", self.locale.clone().into()),
            ("name", self.name.clone().into()),
            ("available", self.available.into()),
            ("is_default", self.is_default.into()),
        ]
    }
}

/// Translated projection of a node for one locale (a node source).
///
/// At most one exists per (node, translation) pair; the store enforces it
/// with a unique index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedContent {
    pub id: i64,
    pub node_id: i64,
    pub translation_id: i64,
    pub title: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub published_at: Option<i64>,
}

impl LocalizedContent {
    pub fn new(id: i64, node_id: i64, translation_id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            node_id,
            translation_id,
            title: title.into(),
            meta_title: None,
            meta_description: None,
            published_at: None,
        }
    }

    pub fn with_meta_description(mut self, description: impl Into<String>) -> Self {
        self.meta_description = Some(description.into());
        self
    }
}

impl Entity for LocalizedContent {
    fn descriptor() -> &'static EntityDescriptor {
        &NODE_SOURCE
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            node_id: row.get("node_id")?,
            translation_id: row.get("translation_id")?,
            title: row.get("title")?,
            meta_title: row.get("meta_title")?,
            meta_description: row.get("meta_description")?,
            published_at: row.get("published_at")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("node_id", self.node_id.into()),
            ("translation_id", self.translation_id.into()),
            ("title", self.title.clone().into()),
            ("meta_title", self.meta_title.clone().into()),
            ("meta_description", self.meta_description.clone().into()),
            ("published_at", self.published_at.into()),
        ]
    }
}
