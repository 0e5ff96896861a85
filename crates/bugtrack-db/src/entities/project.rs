//! Project entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::IdList;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// Project UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub created: ChronoDateTimeUtc,

    /// Owning manager. Null only after the managing user was deleted.
    /// Invariant: when non-null, the manager is always a member of `users`.
    pub manager: Option<Uuid>,

    /// Assigned user ids (includes the manager)
    #[sea_orm(column_type = "Json")]
    pub users: IdList,

    /// Tickets filed under this project
    #[sea_orm(column_type = "Json")]
    pub tickets: IdList,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Project belongs to its managing user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::Manager",
        to = "super::user::Column::Id"
    )]
    Manager,

    /// Project has tickets
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manager.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
