//! Persistent store for bugtrack.
//!
//! Entities are self-contained documents: besides their own fields they carry
//! denormalized back-reference lists (JSON columns) pointing at related
//! records. The [`cascade`] module is the single place that keeps those lists
//! consistent when entities are created, re-linked, or deleted; handlers call
//! it inside one transaction per logical request.

pub mod cascade;
pub mod entities;
pub mod migrator;

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use sea_orm_migration::MigratorTrait;

pub use cascade::CascadeError;
pub use entities::IdList;

use entities::user;

/// Connect to the database at the given URL (`sqlite:` or `postgres:`).
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(url).await
}

/// Run all pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    migrator::Migrator::up(db, None).await
}

/// Look up a user by email, case-insensitively.
///
/// Emails are stored as submitted but matched by lowercase comparison, so
/// `Alice@example.com` and `alice@EXAMPLE.com` resolve to the same account.
pub async fn find_user_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(
            Expr::expr(Func::lower(Expr::col((user::Entity, user::Column::Email))))
                .eq(email.trim().to_lowercase()),
        )
        .one(conn)
        .await
}
