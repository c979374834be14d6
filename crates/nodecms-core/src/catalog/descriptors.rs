use super::{
    EntityDescriptor, FieldDescriptor as F, FieldKind as K, LocalizedDescriptor, RelationDescriptor,
    RelationShape, StatusSource,
};

const fn many_to_one(
    name: &'static str,
    target: &'static str,
    alias: &'static str,
    local_column: &'static str,
) -> RelationDescriptor {
    RelationDescriptor {
        name,
        target,
        alias,
        shape: RelationShape::ManyToOne { local_column },
    }
}

const fn one_to_many(
    name: &'static str,
    target: &'static str,
    alias: &'static str,
    remote_column: &'static str,
) -> RelationDescriptor {
    RelationDescriptor {
        name,
        target,
        alias,
        shape: RelationShape::OneToMany { remote_column },
    }
}

const fn many_to_many(
    name: &'static str,
    target: &'static str,
    alias: &'static str,
    edge_table: &'static str,
    local_column: &'static str,
    remote_column: &'static str,
) -> RelationDescriptor {
    RelationDescriptor {
        name,
        target,
        alias,
        shape: RelationShape::ManyToMany {
            edge_table,
            local_column,
            remote_column,
        },
    }
}

pub static NODE: EntityDescriptor = EntityDescriptor {
    name: "node",
    table: "nodes",
    alias: "n",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::text("nodeName", "node_name", K::String),
        F::scalar("status", "status", K::Integer),
        F::scalar("visible", "visible", K::Boolean),
        F::scalar("position", "position", K::Float),
        F::scalar("parent", "parent_id", K::Reference),
        F::scalar("nodeType", "node_type_id", K::Reference),
        F::scalar("createdAt", "created_at", K::Timestamp),
        F::scalar("updatedAt", "updated_at", K::Timestamp),
    ],
    relations: &[
        many_to_one("parent", "node", "pn", "parent_id"),
        one_to_many("children", "node", "cn", "parent_id"),
        many_to_one("nodeType", "node_type", "nt", "node_type_id"),
        one_to_many("nodeSources", "node_source", "ns", "node_id"),
        many_to_many("tags", "tag", "tg", "nodes_tags", "node_id", "tag_id"),
    ],
    localized: Some(LocalizedDescriptor {
        relation: "nodeSources",
        translation_relation: "translation",
        name_field: Some("title"),
    }),
    status: StatusSource::Own { field: "status" },
    tag_path: Some("tags"),
    folder_path: None,
    identifier_fields: &["nodeName"],
};

pub static NODE_TYPE: EntityDescriptor = EntityDescriptor {
    name: "node_type",
    table: "node_types",
    alias: "nt",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::text("name", "name", K::String),
        F::text("displayName", "display_name", K::String),
        F::scalar("publishable", "publishable", K::Boolean),
        F::scalar("visible", "visible", K::Boolean),
    ],
    relations: &[],
    localized: None,
    status: StatusSource::Unmanaged,
    tag_path: None,
    folder_path: None,
    identifier_fields: &["name"],
};

pub static TRANSLATION: EntityDescriptor = EntityDescriptor {
    name: "translation",
    table: "translations",
    alias: "t",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::text("locale", "locale", K::String),
        F::text("name", "name", K::String),
        F::scalar("available", "available", K::Boolean),
        F::scalar("isDefault", "is_default", K::Boolean),
    ],
    relations: &[],
    localized: None,
    status: StatusSource::Unmanaged,
    tag_path: None,
    folder_path: None,
    identifier_fields: &["locale"],
};

pub static NODE_SOURCE: EntityDescriptor = EntityDescriptor {
    name: "node_source",
    table: "node_sources",
    alias: "ns",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::scalar("node", "node_id", K::Reference),
        F::scalar("translation", "translation_id", K::Reference),
        F::text("title", "title", K::String),
        F::text("metaTitle", "meta_title", K::String),
        F::text("metaDescription", "meta_description", K::Text),
        F::scalar("publishedAt", "published_at", K::Timestamp),
    ],
    relations: &[
        many_to_one("node", "node", "n", "node_id"),
        many_to_one("translation", "translation", "t", "translation_id"),
    ],
    localized: None,
    status: StatusSource::Via { relation: "node" },
    tag_path: Some("node.tags"),
    folder_path: None,
    identifier_fields: &["title"],
};

pub static TAG: EntityDescriptor = EntityDescriptor {
    name: "tag",
    table: "tags",
    alias: "tg",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::text("tagName", "tag_name", K::String),
        F::scalar("parent", "parent_id", K::Reference),
        F::scalar("visible", "visible", K::Boolean),
        F::scalar("position", "position", K::Float),
    ],
    relations: &[
        many_to_one("parent", "tag", "ptg", "parent_id"),
        one_to_many("children", "tag", "ctg", "parent_id"),
        one_to_many("translatedTags", "tag_translation", "tt", "tag_id"),
        many_to_many("nodes", "node", "n", "nodes_tags", "tag_id", "node_id"),
    ],
    localized: Some(LocalizedDescriptor {
        relation: "translatedTags",
        translation_relation: "translation",
        name_field: Some("name"),
    }),
    status: StatusSource::Unmanaged,
    tag_path: None,
    folder_path: None,
    identifier_fields: &["tagName"],
};

pub static TAG_TRANSLATION: EntityDescriptor = EntityDescriptor {
    name: "tag_translation",
    table: "tag_translations",
    alias: "tt",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::scalar("tag", "tag_id", K::Reference),
        F::scalar("translation", "translation_id", K::Reference),
        F::text("name", "name", K::String),
        F::text("description", "description", K::Text),
    ],
    relations: &[
        many_to_one("tag", "tag", "tg", "tag_id"),
        many_to_one("translation", "translation", "t", "translation_id"),
    ],
    localized: None,
    status: StatusSource::Unmanaged,
    tag_path: None,
    folder_path: None,
    identifier_fields: &[],
};

pub static FOLDER: EntityDescriptor = EntityDescriptor {
    name: "folder",
    table: "folders",
    alias: "f",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::text("folderName", "folder_name", K::String),
        F::scalar("parent", "parent_id", K::Reference),
        F::scalar("visible", "visible", K::Boolean),
        F::scalar("position", "position", K::Float),
    ],
    relations: &[
        many_to_one("parent", "folder", "pf", "parent_id"),
        one_to_many("children", "folder", "cf", "parent_id"),
        one_to_many("translatedFolders", "folder_translation", "ft", "folder_id"),
        many_to_many(
            "documents",
            "document",
            "d",
            "documents_folders",
            "folder_id",
            "document_id",
        ),
    ],
    localized: Some(LocalizedDescriptor {
        relation: "translatedFolders",
        translation_relation: "translation",
        name_field: Some("name"),
    }),
    status: StatusSource::Unmanaged,
    tag_path: None,
    folder_path: None,
    identifier_fields: &["folderName"],
};

pub static FOLDER_TRANSLATION: EntityDescriptor = EntityDescriptor {
    name: "folder_translation",
    table: "folder_translations",
    alias: "ft",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::scalar("folder", "folder_id", K::Reference),
        F::scalar("translation", "translation_id", K::Reference),
        F::text("name", "name", K::String),
    ],
    relations: &[
        many_to_one("folder", "folder", "f", "folder_id"),
        many_to_one("translation", "translation", "t", "translation_id"),
    ],
    localized: None,
    status: StatusSource::Unmanaged,
    tag_path: None,
    folder_path: None,
    identifier_fields: &[],
};

pub static DOCUMENT: EntityDescriptor = EntityDescriptor {
    name: "document",
    table: "documents",
    alias: "d",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::text("filename", "filename", K::String),
        F::text("mimeType", "mime_type", K::String),
        F::scalar("private", "private", K::Boolean),
        F::text("embedPlatform", "embed_platform", K::String),
        F::secret("downloadToken", "download_token"),
        F::scalar("createdAt", "created_at", K::Timestamp),
    ],
    relations: &[
        one_to_many(
            "documentTranslations",
            "document_translation",
            "dt",
            "document_id",
        ),
        many_to_many(
            "folders",
            "folder",
            "f",
            "documents_folders",
            "document_id",
            "folder_id",
        ),
    ],
    localized: Some(LocalizedDescriptor {
        relation: "documentTranslations",
        translation_relation: "translation",
        name_field: Some("name"),
    }),
    status: StatusSource::Unmanaged,
    tag_path: None,
    folder_path: Some("folders"),
    identifier_fields: &["filename"],
};

pub static DOCUMENT_TRANSLATION: EntityDescriptor = EntityDescriptor {
    name: "document_translation",
    table: "document_translations",
    alias: "dt",
    identity: "id",
    fields: &[
        F::scalar("id", "id", K::Integer),
        F::scalar("document", "document_id", K::Reference),
        F::scalar("translation", "translation_id", K::Reference),
        F::text("name", "name", K::String),
        F::text("description", "description", K::Text),
        F::text("copyright", "copyright", K::String),
    ],
    relations: &[
        many_to_one("document", "document", "d", "document_id"),
        many_to_one("translation", "translation", "t", "translation_id"),
    ],
    localized: None,
    status: StatusSource::Unmanaged,
    tag_path: None,
    folder_path: None,
    identifier_fields: &[],
};
