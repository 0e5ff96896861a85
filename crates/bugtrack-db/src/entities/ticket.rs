//! Ticket entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::IdList;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    /// Ticket UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// true = open, false = closed
    pub status: bool,

    /// Parent project (immutable after creation)
    pub project: Uuid,

    /// Filing user. Null only after the submitter was deleted.
    pub submitter: Option<Uuid>,

    /// Assigned developers. Invariant: every dev is a member of the parent
    /// project's `users`.
    #[sea_orm(column_type = "Json")]
    pub devs: IdList,

    /// Comments on this ticket
    #[sea_orm(column_type = "Json")]
    pub comments: IdList,

    pub created: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Ticket belongs to a project
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::Project",
        to = "super::project::Column::Id"
    )]
    Project,

    /// Ticket belongs to its submitting user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::Submitter",
        to = "super::user::Column::Id"
    )]
    Submitter,

    /// Ticket has comments
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submitter.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
