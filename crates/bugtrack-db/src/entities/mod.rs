//! Database entities

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod comment;
pub mod project;
pub mod ticket;
pub mod user;

pub use comment::Entity as Comment;
pub use project::Entity as Project;
pub use ticket::Entity as Ticket;
pub use user::Entity as User;

pub mod prelude {
    pub use super::comment::Entity as Comment;
    pub use super::project::Entity as Project;
    pub use super::ticket::Entity as Ticket;
    pub use super::user::Entity as User;
}

/// Denormalized back-reference list stored as a JSON column.
///
/// Every entity carries the ids of the records that point at it (a user's
/// projects, a ticket's comments, ...). The cascade module is the only
/// writer; it keeps these lists exactly inverse to the forward references.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct IdList(pub Vec<Uuid>);

impl IdList {
    pub fn new(ids: Vec<Uuid>) -> Self {
        Self(ids)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.0.contains(&id)
    }

    /// Append `id` unless already present. Lists are sets; a document must
    /// never hold the same back-reference twice.
    pub fn insert(&mut self, id: Uuid) {
        if !self.0.contains(&id) {
            self.0.push(id);
        }
    }

    pub fn remove(&mut self, id: Uuid) {
        self.0.retain(|entry| *entry != id);
    }

    pub fn iter(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Uuid>> for IdList {
    fn from(ids: Vec<Uuid>) -> Self {
        Self(ids)
    }
}

impl FromIterator<Uuid> for IdList {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_keeps_set_semantics() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut list = IdList::default();
        list.insert(a);
        list.insert(b);
        list.insert(a);
        assert_eq!(list.len(), 2);

        list.remove(a);
        assert!(!list.contains(a));
        assert!(list.contains(b));
    }

    #[test]
    fn id_list_round_trips_as_json_column() {
        let list = IdList::new(vec![Uuid::new_v4(), Uuid::new_v4()]);

        let value = serde_json::to_value(&list).unwrap();
        assert!(value.is_array());

        let restored: IdList = serde_json::from_value(value).unwrap();
        assert_eq!(restored, list);
    }
}
