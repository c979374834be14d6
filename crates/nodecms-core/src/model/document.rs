use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::{Entity, Value};
use crate::catalog::{EntityDescriptor, DOCUMENT, DOCUMENT_TRANSLATION};

/// Uploaded or embedded media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub mime_type: Option<String>,
    pub private: bool,
    pub embed_platform: Option<String>,
    pub download_token: Option<String>,
    pub created_at: i64,
}

impl Document {
    pub fn new(id: i64, filename: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
            mime_type: None,
            private: false,
            embed_platform: None,
            download_token: None,
            created_at: 0,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_download_token(mut self, token: impl Into<String>) -> Self {
        self.download_token = Some(token.into());
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

impl Entity for Document {
    fn descriptor() -> &'static EntityDescriptor {
        &DOCUMENT
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            mime_type: row.get("mime_type")?,
            private: row.get("private")?,
            embed_platform: row.get("embed_platform")?,
            download_token: row.get("download_token")?,
            created_at: row.get("created_at")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("filename", self.filename.clone().into()),
            ("mime_type", self.mime_type.clone().into()),
            ("private", self.private.into()),
            ("embed_platform", self.embed_platform.clone().into()),
            ("download_token", self.download_token.clone().into()),
            ("created_at", self.created_at.into()),
        ]
    }
}

/// Translated metadata of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTranslation {
    pub id: i64,
    pub document_id: i64,
    pub translation_id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub copyright: Option<String>,
}

impl DocumentTranslation {
    pub fn new(id: i64, document_id: i64, translation_id: i64) -> Self {
        Self {
            id,
            document_id,
            translation_id,
            name: None,
            description: None,
            copyright: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Entity for DocumentTranslation {
    fn descriptor() -> &'static EntityDescriptor {
        &DOCUMENT_TRANSLATION
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            translation_id: row.get("translation_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            copyright: row.get("copyright")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("document_id", self.document_id.into()),
            ("translation_id", self.translation_id.into()),
            ("name", self.name.clone().into()),
            ("description", self.description.clone().into()),
            ("copyright", self.copyright.clone().into()),
        ]
    }
}
