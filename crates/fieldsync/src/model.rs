//! 内置记录形态及其可编辑字段
//!
//! 每个 (实体种类, 字段) 对应一个 [`FieldAccessor`] 常量，视图直接拿来
//! 实例化控制器，不再为每种实体复制一份编辑器逻辑。

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind, FieldAccessor};

/// 作品集
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: EntityId,
    pub title: String,
    #[serde(rename = "type")]
    pub collection_type: String,
    pub status: String,
}

impl Entity for Collection {
    fn kind() -> EntityKind {
        EntityKind::Collection
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

/// 机构（期刊、出版社等）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub organization_type: String,
    pub status: String,
}

impl Entity for Organization {
    fn kind() -> EntityKind {
        EntityKind::Organization
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

/// 投稿记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: EntityId,
    pub work_id: EntityId,
    pub organization_id: EntityId,
    pub status: String,
    pub response: String,
}

impl Entity for Submission {
    fn kind() -> EntityKind {
        EntityKind::Submission
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

/// 书籍（正文前后附文为自由文本）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub front_matter: String,
    #[serde(default)]
    pub back_matter: String,
}

impl Entity for Book {
    fn kind() -> EntityKind {
        EntityKind::Book
    }

    fn id(&self) -> EntityId {
        self.id
    }
}

fn collection_type(c: &Collection) -> String {
    c.collection_type.clone()
}

fn with_collection_type(c: &Collection, value: String) -> Collection {
    Collection {
        collection_type: value,
        ..c.clone()
    }
}

fn collection_status(c: &Collection) -> String {
    c.status.clone()
}

fn with_collection_status(c: &Collection, value: String) -> Collection {
    Collection {
        status: value,
        ..c.clone()
    }
}

fn organization_type(o: &Organization) -> String {
    o.organization_type.clone()
}

fn with_organization_type(o: &Organization, value: String) -> Organization {
    Organization {
        organization_type: value,
        ..o.clone()
    }
}

fn organization_status(o: &Organization) -> String {
    o.status.clone()
}

fn with_organization_status(o: &Organization, value: String) -> Organization {
    Organization {
        status: value,
        ..o.clone()
    }
}

fn submission_status(s: &Submission) -> String {
    s.status.clone()
}

fn with_submission_status(s: &Submission, value: String) -> Submission {
    Submission {
        status: value,
        ..s.clone()
    }
}

fn submission_response(s: &Submission) -> String {
    s.response.clone()
}

fn with_submission_response(s: &Submission, value: String) -> Submission {
    Submission {
        response: value,
        ..s.clone()
    }
}

fn book_front_matter(b: &Book) -> String {
    b.front_matter.clone()
}

fn with_book_front_matter(b: &Book, value: String) -> Book {
    Book {
        front_matter: value,
        ..b.clone()
    }
}

fn book_back_matter(b: &Book) -> String {
    b.back_matter.clone()
}

fn with_book_back_matter(b: &Book, value: String) -> Book {
    Book {
        back_matter: value,
        ..b.clone()
    }
}

pub mod fields {
    use super::*;

    pub const COLLECTION_TYPE: FieldAccessor<Collection, String> =
        FieldAccessor::new("type", collection_type, with_collection_type);
    pub const COLLECTION_STATUS: FieldAccessor<Collection, String> =
        FieldAccessor::new("status", collection_status, with_collection_status);

    pub const ORGANIZATION_TYPE: FieldAccessor<Organization, String> =
        FieldAccessor::new("type", organization_type, with_organization_type);
    pub const ORGANIZATION_STATUS: FieldAccessor<Organization, String> =
        FieldAccessor::new("status", organization_status, with_organization_status);

    pub const SUBMISSION_STATUS: FieldAccessor<Submission, String> =
        FieldAccessor::new("status", submission_status, with_submission_status);
    pub const SUBMISSION_RESPONSE: FieldAccessor<Submission, String> =
        FieldAccessor::new("response", submission_response, with_submission_response);

    pub const BOOK_FRONT_MATTER: FieldAccessor<Book, String> =
        FieldAccessor::new("front_matter", book_front_matter, with_book_front_matter);
    pub const BOOK_BACK_MATTER: FieldAccessor<Book, String> =
        FieldAccessor::new("back_matter", book_back_matter, with_book_back_matter);
}

#[cfg(test)]
mod tests {
    use super::fields::*;
    use super::*;
    use crate::entity::FieldBinding;

    #[test]
    fn apply_touches_only_its_own_field() {
        let org = Organization {
            id: EntityId(3),
            name: "Tin House".into(),
            organization_type: "magazine".into(),
            status: "open".into(),
        };

        let updated = ORGANIZATION_STATUS.apply(&org, "closed".into());
        assert_eq!(updated.status, "closed");
        assert_eq!(updated.organization_type, "magazine");
        assert_eq!(updated.name, "Tin House");
        assert_eq!(ORGANIZATION_TYPE.read(&updated), "magazine");
    }

    #[test]
    fn collection_type_serializes_as_type() {
        let collection = Collection {
            id: EntityId(1),
            title: "Poems".into(),
            collection_type: "chapbook".into(),
            status: "draft".into(),
        };
        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["type"], "chapbook");
        assert_eq!(COLLECTION_TYPE.field(), "type");
    }

    #[test]
    fn book_matter_defaults_to_empty() {
        let book: Book = serde_json::from_str(r#"{"id": 9, "title": "Untitled"}"#).unwrap();
        assert_eq!(BOOK_FRONT_MATTER.read(&book), "");
        assert_eq!(BOOK_BACK_MATTER.read(&book), "");
    }
}
