//! User entity for authentication and permission checks

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::IdList;

/// User role in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Role {
    /// System administrator with full access
    #[sea_orm(string_value = "Admin")]
    Admin,

    /// May create and manage projects
    #[sea_orm(string_value = "Project Manager")]
    #[serde(rename = "Project Manager")]
    ProjectManager,

    /// May be assigned to tickets as a developer
    #[sea_orm(string_value = "Developer")]
    Developer,

    /// Regular user
    #[sea_orm(string_value = "User")]
    User,
}

impl Role {
    /// Admin and Project Manager are the "management" roles: they may create
    /// projects and be appointed project manager.
    pub fn is_management(self) -> bool {
        matches!(self, Role::Admin | Role::ProjectManager)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// User UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User email (unique, matched case-insensitively)
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub role: Role,

    /// When the user signed up
    pub registered: ChronoDateTimeUtc,

    /// Projects the user manages or is assigned to
    #[sea_orm(column_type = "Json")]
    pub projects: IdList,

    /// Tickets the user submitted or develops
    #[sea_orm(column_type = "Json")]
    pub tickets: IdList,

    /// Comments the user authored
    #[sea_orm(column_type = "Json")]
    pub comments: IdList,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Projects whose `manager` column points at this user
    #[sea_orm(has_many = "super::project::Entity")]
    ManagedProjects,

    /// Tickets whose `submitter` column points at this user
    #[sea_orm(has_many = "super::ticket::Entity")]
    SubmittedTickets,

    /// Comments whose `submitter` column points at this user
    #[sea_orm(has_many = "super::comment::Entity")]
    AuthoredComments,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ManagedProjects.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubmittedTickets.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthoredComments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
