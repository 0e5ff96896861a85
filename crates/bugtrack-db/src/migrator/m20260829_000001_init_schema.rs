//! Consolidated initial schema migration

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. Create users table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(string_len(User::Email, 255).not_null().unique_key())
                    .col(string_len(User::PasswordHash, 255).not_null())
                    .col(string_len(User::FirstName, 255).not_null())
                    .col(string_len(User::LastName, 255).not_null())
                    .col(string_len(User::Role, 32).not_null().default("User"))
                    .col(
                        timestamp_with_time_zone(User::Registered)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(json(User::Projects).not_null())
                    .col(json(User::Tickets).not_null())
                    .col(json(User::Comments).not_null())
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. Create projects table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Project::Table)
                    .if_not_exists()
                    .col(uuid(Project::Id).primary_key())
                    .col(string_len(Project::Title, 255).not_null())
                    .col(text(Project::Description).not_null().default(""))
                    .col(
                        timestamp_with_time_zone(Project::Created)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Project::Manager).uuid().null())
                    .col(json(Project::Users).not_null())
                    .col(json(Project::Tickets).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_projects_manager")
                    .table(Project::Table)
                    .col(Project::Manager)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. Create tickets table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Ticket::Table)
                    .if_not_exists()
                    .col(uuid(Ticket::Id).primary_key())
                    .col(string_len(Ticket::Title, 255).not_null())
                    .col(text(Ticket::Description).not_null())
                    .col(boolean(Ticket::Status).not_null().default(true))
                    .col(uuid(Ticket::Project).not_null())
                    .col(ColumnDef::new(Ticket::Submitter).uuid().null())
                    .col(json(Ticket::Devs).not_null())
                    .col(json(Ticket::Comments).not_null())
                    .col(
                        timestamp_with_time_zone(Ticket::Created)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_project")
                            .from(Ticket::Table, Ticket::Project)
                            .to(Project::Table, Project::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_project")
                    .table(Ticket::Table)
                    .col(Ticket::Project)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_submitter")
                    .table(Ticket::Table)
                    .col(Ticket::Submitter)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 4. Create comments table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Comment::Table)
                    .if_not_exists()
                    .col(uuid(Comment::Id).primary_key())
                    .col(text(Comment::Content).not_null())
                    .col(
                        timestamp_with_time_zone(Comment::Created)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(uuid(Comment::Ticket).not_null())
                    .col(ColumnDef::new(Comment::Submitter).uuid().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_ticket")
                            .from(Comment::Table, Comment::Ticket)
                            .to(Ticket::Table, Ticket::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_comments_ticket")
                    .table(Comment::Table)
                    .col(Comment::Ticket)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_comments_submitter")
                    .table(Comment::Table)
                    .col(Comment::Submitter)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order (respecting foreign keys)
        manager
            .drop_table(Table::drop().table(Comment::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Ticket::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Project::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;

        Ok(())
    }
}

// ============================================================
// Table identifiers
// ============================================================

#[derive(DeriveIden)]
enum User {
    #[sea_orm(iden = "users")]
    Table,
    Id,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Role,
    Registered,
    Projects,
    Tickets,
    Comments,
}

#[derive(DeriveIden)]
enum Project {
    #[sea_orm(iden = "projects")]
    Table,
    Id,
    Title,
    Description,
    Created,
    Manager,
    Users,
    Tickets,
}

#[derive(DeriveIden)]
enum Ticket {
    #[sea_orm(iden = "tickets")]
    Table,
    Id,
    Title,
    Description,
    Status,
    Project,
    Submitter,
    Devs,
    Comments,
    Created,
}

#[derive(DeriveIden)]
enum Comment {
    #[sea_orm(iden = "comments")]
    Table,
    Id,
    Content,
    Created,
    Ticket,
    Submitter,
}
