use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::{Entity, Value};
use crate::catalog::{EntityDescriptor, FOLDER, FOLDER_TRANSLATION, TAG, TAG_TRANSLATION};

/// Named classification attached to nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub tag_name: String,
    pub parent_id: Option<i64>,
    pub visible: bool,
    pub position: f64,
}

impl Tag {
    pub fn new(id: i64, tag_name: impl Into<String>) -> Self {
        Self {
            id,
            tag_name: tag_name.into(),
            parent_id: None,
            visible: true,
            position: 0.0,
        }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

impl Entity for Tag {
    fn descriptor() -> &'static EntityDescriptor {
        &TAG
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            tag_name: row.get("tag_name")?,
            parent_id: row.get("parent_id")?,
            visible: row.get("visible")?,
            position: row.get("position")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("tag_name", self.tag_name.clone().into()),
            ("parent_id", self.parent_id.into()),
            ("visible", self.visible.into()),
            ("position", self.position.into()),
        ]
    }
}

/// Translated name of a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTranslation {
    pub id: i64,
    pub tag_id: i64,
    pub translation_id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl TagTranslation {
    pub fn new(id: i64, tag_id: i64, translation_id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            tag_id,
            translation_id,
            name: name.into(),
            description: None,
        }
    }
}

impl Entity for TagTranslation {
    fn descriptor() -> &'static EntityDescriptor {
        &TAG_TRANSLATION
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            tag_id: row.get("tag_id")?,
            translation_id: row.get("translation_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("tag_id", self.tag_id.into()),
            ("translation_id", self.translation_id.into()),
            ("name", self.name.clone().into()),
            ("description", self.description.clone().into()),
        ]
    }
}

/// Named container of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub folder_name: String,
    pub parent_id: Option<i64>,
    pub visible: bool,
    pub position: f64,
}

impl Folder {
    pub fn new(id: i64, folder_name: impl Into<String>) -> Self {
        Self {
            id,
            folder_name: folder_name.into(),
            parent_id: None,
            visible: true,
            position: 0.0,
        }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

impl Entity for Folder {
    fn descriptor() -> &'static EntityDescriptor {
        &FOLDER
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            folder_name: row.get("folder_name")?,
            parent_id: row.get("parent_id")?,
            visible: row.get("visible")?,
            position: row.get("position")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("folder_name", self.folder_name.clone().into()),
            ("parent_id", self.parent_id.into()),
            ("visible", self.visible.into()),
            ("position", self.position.into()),
        ]
    }
}

/// Translated name of a folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderTranslation {
    pub id: i64,
    pub folder_id: i64,
    pub translation_id: i64,
    pub name: String,
}

impl FolderTranslation {
    pub fn new(id: i64, folder_id: i64, translation_id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            folder_id,
            translation_id,
            name: name.into(),
        }
    }
}

impl Entity for FolderTranslation {
    fn descriptor() -> &'static EntityDescriptor {
        &FOLDER_TRANSLATION
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            folder_id: row.get("folder_id")?,
            translation_id: row.get("translation_id")?,
            name: row.get("name")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("folder_id", self.folder_id.into()),
            ("translation_id", self.translation_id.into()),
            ("name", self.name.clone().into()),
        ]
    }
}
