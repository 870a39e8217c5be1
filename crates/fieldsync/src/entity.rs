//! 实体与字段绑定
//!
//! 控制器只通过 [`FieldBinding`] 读写实体的单个字段，同一套同步逻辑
//! 可以绑定到任意实体形态上。

use std::fmt::{self, Debug};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 实体种类（与后端更新接口一一对应）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Collection,
    Organization,
    Submission,
    Book,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Organization => "organization",
            Self::Submission => "submission",
            Self::Book => "book",
        }
    }
}

impl FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collection" => Ok(Self::Collection),
            "organization" => Ok(Self::Organization),
            "submission" => Ok(Self::Submission),
            "book" => Ok(Self::Book),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 记录主键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id)
    }
}

/// 由父级持有、向下传递的权威记录
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    fn kind() -> EntityKind;

    fn id(&self) -> EntityId;
}

/// 单字段读写能力
///
/// `apply` 必须基于传入的实体返回新实体，只修改本字段，
/// 兄弟字段保持原样。
pub trait FieldBinding<E>: Send + Sync + 'static {
    type Value: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// 字段（列）名，用于日志与可选值缓存
    fn field(&self) -> &str;

    fn read(&self, entity: &E) -> Self::Value;

    fn apply(&self, entity: &E, value: Self::Value) -> E;
}

/// 基于函数指针的字段绑定，内置实体的每个可编辑字段各有一个
pub struct FieldAccessor<E, V> {
    field: &'static str,
    read: fn(&E) -> V,
    apply: fn(&E, V) -> E,
}

impl<E, V> FieldAccessor<E, V> {
    pub const fn new(field: &'static str, read: fn(&E) -> V, apply: fn(&E, V) -> E) -> Self {
        Self { field, read, apply }
    }
}

impl<E, V> Clone for FieldAccessor<E, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, V> Copy for FieldAccessor<E, V> {}

impl<E, V> Debug for FieldAccessor<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor").field("field", &self.field).finish()
    }
}

impl<E, V> FieldBinding<E> for FieldAccessor<E, V>
where
    E: 'static,
    V: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    type Value = V;

    fn field(&self) -> &str {
        self.field
    }

    fn read(&self, entity: &E) -> V {
        (self.read)(entity)
    }

    fn apply(&self, entity: &E, value: V) -> E {
        (self.apply)(entity, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_as_str_and_from_str() {
        assert_eq!(EntityKind::Collection.as_str(), "collection");
        assert_eq!(EntityKind::Book.to_string(), "book");
        assert_eq!(EntityKind::from_str("submission").unwrap(), EntityKind::Submission);
        assert_eq!(EntityKind::from_str("organization").unwrap(), EntityKind::Organization);
        assert!(EntityKind::from_str("work").is_err());
    }

    #[test]
    fn entity_id_is_transparent_in_json() {
        let json = serde_json::to_string(&EntityId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
