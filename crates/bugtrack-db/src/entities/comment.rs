//! Comment entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    /// Comment UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub created: ChronoDateTimeUtc,

    /// Parent ticket (immutable after creation)
    pub ticket: Uuid,

    /// Authoring user. Null only after the author was deleted.
    pub submitter: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Comment belongs to a ticket
    #[sea_orm(
        belongs_to = "super::ticket::Entity",
        from = "Column::Ticket",
        to = "super::ticket::Column::Id"
    )]
    Ticket,

    /// Comment belongs to its authoring user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::Submitter",
        to = "super::user::Column::Id"
    )]
    Submitter,
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submitter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
