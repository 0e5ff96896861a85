//! Integration tests for the reference cascade logic, run against a real
//! SQLite in-memory database.

use bugtrack_db::entities::user::Role;
use bugtrack_db::entities::{comment, project, ticket, user};
use bugtrack_db::{cascade, connect, migrate, CascadeError, IdList};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

async fn setup_test_db() -> DatabaseConnection {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    db
}

async fn insert_user(db: &DatabaseConnection, email: &str, role: Role) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("$argon2id$test".to_string()),
        first_name: Set("Test".to_string()),
        last_name: Set("User".to_string()),
        role: Set(role),
        registered: Set(Utc::now()),
        projects: Set(IdList::default()),
        tickets: Set(IdList::default()),
        comments: Set(IdList::default()),
    }
    .insert(db)
    .await
    .expect("Failed to insert user")
}

async fn insert_project(db: &DatabaseConnection, title: &str, manager: &user::Model) -> project::Model {
    let project = project::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title.to_string()),
        description: Set(String::new()),
        created: Set(Utc::now()),
        manager: Set(Some(manager.id)),
        users: Set(IdList::new(vec![manager.id])),
        tickets: Set(IdList::default()),
    }
    .insert(db)
    .await
    .expect("Failed to insert project");

    cascade::project_created(db, &project)
        .await
        .expect("Failed to run project cascade");

    project
}

async fn insert_ticket(
    db: &DatabaseConnection,
    project: &project::Model,
    submitter: &user::Model,
) -> ticket::Model {
    let ticket = ticket::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("A bug".to_string()),
        description: Set("It is broken".to_string()),
        status: Set(true),
        project: Set(project.id),
        submitter: Set(Some(submitter.id)),
        devs: Set(IdList::default()),
        comments: Set(IdList::default()),
        created: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert ticket");

    cascade::ticket_created(db, &ticket)
        .await
        .expect("Failed to run ticket cascade");

    ticket
}

async fn insert_comment(
    db: &DatabaseConnection,
    ticket: &ticket::Model,
    submitter: &user::Model,
) -> comment::Model {
    let comment = comment::ActiveModel {
        id: Set(Uuid::new_v4()),
        content: Set("Looking into it".to_string()),
        created: Set(Utc::now()),
        ticket: Set(ticket.id),
        submitter: Set(Some(submitter.id)),
    }
    .insert(db)
    .await
    .expect("Failed to insert comment");

    cascade::comment_created(db, &comment)
        .await
        .expect("Failed to run comment cascade");

    comment
}

async fn reload_user(db: &DatabaseConnection, id: Uuid) -> user::Model {
    user::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query failed")
        .expect("user missing")
}

async fn reload_project(db: &DatabaseConnection, id: Uuid) -> project::Model {
    project::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query failed")
        .expect("project missing")
}

async fn reload_ticket(db: &DatabaseConnection, id: Uuid) -> ticket::Model {
    ticket::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query failed")
        .expect("ticket missing")
}

async fn set_project_users(db: &DatabaseConnection, project: &project::Model, users: &[Uuid]) {
    let resulting = cascade::update_project_users(db, project, users)
        .await
        .expect("member update failed");
    let mut active: project::ActiveModel = project.clone().into();
    active.users = Set(resulting);
    active.update(db).await.expect("project update failed");
}

async fn set_ticket_devs(
    db: &DatabaseConnection,
    ticket: &ticket::Model,
    project: &project::Model,
    devs: &[Uuid],
) {
    let resulting = cascade::update_ticket_devs(db, ticket, project, devs)
        .await
        .expect("dev update failed");
    let mut active: ticket::ActiveModel = ticket.clone().into();
    active.devs = Set(resulting);
    active.update(db).await.expect("ticket update failed");
}

#[tokio::test]
async fn create_project_links_manager() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let project = insert_project(&db, "X", &manager).await;

    let manager = reload_user(&db, manager.id).await;
    assert!(manager.projects.contains(project.id));
    assert!(project.users.contains(manager.id));
}

#[tokio::test]
async fn create_ticket_links_project_and_submitter() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let project = insert_project(&db, "X", &manager).await;
    let ticket = insert_ticket(&db, &project, &manager).await;

    let project = reload_project(&db, project.id).await;
    let manager = reload_user(&db, manager.id).await;
    assert!(project.tickets.contains(ticket.id));
    assert!(manager.tickets.contains(ticket.id));
}

#[tokio::test]
async fn create_comment_links_ticket_and_author() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let project = insert_project(&db, "X", &manager).await;
    let ticket = insert_ticket(&db, &project, &manager).await;
    let comment = insert_comment(&db, &ticket, &manager).await;

    let ticket = reload_ticket(&db, ticket.id).await;
    let manager = reload_user(&db, manager.id).await;
    assert!(ticket.comments.contains(comment.id));
    assert!(manager.comments.contains(comment.id));
}

#[tokio::test]
async fn member_add_and_remove_updates_their_project_lists() {
    let db = setup_test_db().await;
    let u1 = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let u2 = insert_user(&db, "dev@example.com", Role::Developer).await;
    let project = insert_project(&db, "X", &u1).await;

    // Edit users: [u1, u2] -> u2 gains the project.
    set_project_users(&db, &project, &[u1.id, u2.id]).await;
    assert!(reload_user(&db, u2.id).await.projects.contains(project.id));
    let project = reload_project(&db, project.id).await;
    assert!(project.users.contains(u1.id) && project.users.contains(u2.id));

    // Edit users: [u1] -> u2 loses the project again.
    set_project_users(&db, &project, &[u1.id]).await;
    assert!(!reload_user(&db, u2.id).await.projects.contains(project.id));
    let project = reload_project(&db, project.id).await;
    assert!(!project.users.contains(u2.id));
}

#[tokio::test]
async fn removing_member_pulls_them_from_ticket_devs() {
    let db = setup_test_db().await;
    let u1 = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let u2 = insert_user(&db, "dev@example.com", Role::Developer).await;
    let project = insert_project(&db, "X", &u1).await;
    set_project_users(&db, &project, &[u1.id, u2.id]).await;
    let project = reload_project(&db, project.id).await;

    let ticket = insert_ticket(&db, &project, &u1).await;
    set_ticket_devs(&db, &ticket, &project, &[u2.id]).await;
    assert!(reload_user(&db, u2.id).await.tickets.contains(ticket.id));

    let project = reload_project(&db, project.id).await;
    set_project_users(&db, &project, &[u1.id]).await;

    let ticket = reload_ticket(&db, ticket.id).await;
    assert!(!ticket.devs.contains(u2.id));
    let u2 = reload_user(&db, u2.id).await;
    assert!(!u2.tickets.contains(ticket.id));
    assert!(!u2.projects.contains(project.id));
}

#[tokio::test]
async fn removed_submitter_keeps_ticket_reference() {
    let db = setup_test_db().await;
    let u1 = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let u2 = insert_user(&db, "dev@example.com", Role::Developer).await;
    let project = insert_project(&db, "X", &u1).await;
    set_project_users(&db, &project, &[u1.id, u2.id]).await;
    let project = reload_project(&db, project.id).await;

    // u2 submits the ticket and also works on it.
    let ticket = insert_ticket(&db, &project, &u2).await;
    set_ticket_devs(&db, &ticket, &project, &[u2.id]).await;

    let project = reload_project(&db, project.id).await;
    set_project_users(&db, &project, &[u1.id]).await;

    // Pulled from devs, but the submitter reference survives.
    let ticket = reload_ticket(&db, ticket.id).await;
    assert!(!ticket.devs.contains(u2.id));
    assert!(reload_user(&db, u2.id).await.tickets.contains(ticket.id));
}

#[tokio::test]
async fn member_update_rejects_unknown_user() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let project = insert_project(&db, "X", &manager).await;

    let result =
        cascade::update_project_users(&db, &project, &[manager.id, Uuid::new_v4()]).await;
    assert!(matches!(result, Err(CascadeError::NotFound("User"))));
}

#[tokio::test]
async fn member_update_never_drops_the_manager() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let other = insert_user(&db, "dev@example.com", Role::Developer).await;
    let project = insert_project(&db, "X", &manager).await;

    set_project_users(&db, &project, &[other.id]).await;

    let project = reload_project(&db, project.id).await;
    assert!(project.users.contains(manager.id));
    assert!(reload_user(&db, manager.id).await.projects.contains(project.id));
}

#[tokio::test]
async fn manager_reassignment_requires_membership_and_role() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let outsider = insert_user(&db, "pm2@example.com", Role::ProjectManager).await;
    let plain = insert_user(&db, "user@example.com", Role::User).await;
    let project = insert_project(&db, "X", &manager).await;

    let result = cascade::update_project_manager(&db, &project, outsider.id, None).await;
    assert!(matches!(result, Err(CascadeError::NotProjectMember)));

    set_project_users(&db, &project, &[manager.id, plain.id]).await;
    let project = reload_project(&db, project.id).await;
    let result = cascade::update_project_manager(&db, &project, plain.id, None).await;
    assert!(matches!(result, Err(CascadeError::ManagerNotQualified)));
}

#[tokio::test]
async fn manager_reassignment_keeps_old_manager_assigned() {
    let db = setup_test_db().await;
    let old = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let new = insert_user(&db, "pm2@example.com", Role::ProjectManager).await;
    let project = insert_project(&db, "X", &old).await;
    set_project_users(&db, &project, &[old.id, new.id]).await;
    let project = reload_project(&db, project.id).await;

    let users = cascade::update_project_manager(&db, &project, new.id, None)
        .await
        .expect("reassignment failed");
    let mut active: project::ActiveModel = project.clone().into();
    active.manager = Set(Some(new.id));
    active.users = Set(users);
    active.update(&db).await.expect("project update failed");

    let project = reload_project(&db, project.id).await;
    assert_eq!(project.manager, Some(new.id));
    assert!(project.users.contains(old.id));
    assert!(project.users.contains(new.id));
    assert_eq!(
        project.users.iter().filter(|id| *id == new.id).count(),
        1,
        "new manager must appear exactly once"
    );
}

#[tokio::test]
async fn dev_update_rejects_non_members_and_plain_users() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let outsider = insert_user(&db, "dev@example.com", Role::Developer).await;
    let plain = insert_user(&db, "user@example.com", Role::User).await;
    let project = insert_project(&db, "X", &manager).await;
    let ticket = insert_ticket(&db, &project, &manager).await;

    let result = cascade::update_ticket_devs(&db, &ticket, &project, &[outsider.id]).await;
    assert!(matches!(result, Err(CascadeError::NotProjectMember)));

    set_project_users(&db, &project, &[manager.id, plain.id]).await;
    let project = reload_project(&db, project.id).await;
    let result = cascade::update_ticket_devs(&db, &ticket, &project, &[plain.id]).await;
    assert!(matches!(result, Err(CascadeError::NotDeveloper)));
}

#[tokio::test]
async fn dev_update_exempts_submitter_from_bookkeeping() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let project = insert_project(&db, "X", &manager).await;
    let ticket = insert_ticket(&db, &project, &manager).await;

    // Submitter added and removed as dev: their tickets list never changes,
    // creation already guarantees the reference.
    set_ticket_devs(&db, &ticket, &project, &[manager.id]).await;
    assert!(reload_user(&db, manager.id).await.tickets.contains(ticket.id));

    let ticket = reload_ticket(&db, ticket.id).await;
    set_ticket_devs(&db, &ticket, &project, &[]).await;
    assert!(reload_user(&db, manager.id).await.tickets.contains(ticket.id));
}

#[tokio::test]
async fn every_dev_is_a_project_member_after_updates() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let dev = insert_user(&db, "dev@example.com", Role::Developer).await;
    let project = insert_project(&db, "X", &manager).await;
    set_project_users(&db, &project, &[manager.id, dev.id]).await;
    let project = reload_project(&db, project.id).await;
    let ticket = insert_ticket(&db, &project, &manager).await;
    set_ticket_devs(&db, &ticket, &project, &[dev.id]).await;

    let project = reload_project(&db, project.id).await;
    let ticket = reload_ticket(&db, ticket.id).await;
    for dev_id in ticket.devs.iter() {
        assert!(project.users.contains(dev_id));
    }
}

#[tokio::test]
async fn delete_comment_prunes_references() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let project = insert_project(&db, "X", &manager).await;
    let ticket = insert_ticket(&db, &project, &manager).await;
    let comment = insert_comment(&db, &ticket, &manager).await;

    let stored = comment::Entity::find_by_id(comment.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    cascade::delete_comment(&db, stored).await.expect("delete failed");

    assert!(comment::Entity::find_by_id(comment.id).one(&db).await.unwrap().is_none());
    assert!(!reload_ticket(&db, ticket.id).await.comments.contains(comment.id));
    assert!(!reload_user(&db, manager.id).await.comments.contains(comment.id));
}

#[tokio::test]
async fn delete_ticket_cascades_to_comments() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let dev = insert_user(&db, "dev@example.com", Role::Developer).await;
    let project = insert_project(&db, "X", &manager).await;
    set_project_users(&db, &project, &[manager.id, dev.id]).await;
    let project = reload_project(&db, project.id).await;
    let ticket = insert_ticket(&db, &project, &manager).await;
    set_ticket_devs(&db, &ticket, &project, &[dev.id]).await;
    let comment = insert_comment(&db, &ticket, &dev).await;

    let stored = reload_ticket(&db, ticket.id).await;
    cascade::delete_ticket(&db, stored).await.expect("delete failed");

    assert!(ticket::Entity::find_by_id(ticket.id).one(&db).await.unwrap().is_none());
    assert!(comment::Entity::find_by_id(comment.id).one(&db).await.unwrap().is_none());
    assert!(!reload_project(&db, project.id).await.tickets.contains(ticket.id));
    let manager = reload_user(&db, manager.id).await;
    let dev = reload_user(&db, dev.id).await;
    assert!(!manager.tickets.contains(ticket.id));
    assert!(!dev.tickets.contains(ticket.id));
    assert!(!dev.comments.contains(comment.id));
}

#[tokio::test]
async fn delete_project_cascades_to_tickets_and_comments() {
    let db = setup_test_db().await;
    let admin = insert_user(&db, "admin@example.com", Role::Admin).await;
    let dev = insert_user(&db, "dev@example.com", Role::Developer).await;
    let project = insert_project(&db, "X", &admin).await;
    set_project_users(&db, &project, &[admin.id, dev.id]).await;
    let project = reload_project(&db, project.id).await;

    // Two tickets, one comment each.
    let t1 = insert_ticket(&db, &project, &admin).await;
    let t2 = insert_ticket(&db, &project, &dev).await;
    let c1 = insert_comment(&db, &t1, &admin).await;
    let c2 = insert_comment(&db, &t2, &dev).await;

    let stored = reload_project(&db, project.id).await;
    cascade::delete_project(&db, stored).await.expect("delete failed");

    assert!(project::Entity::find_by_id(project.id).one(&db).await.unwrap().is_none());
    for ticket_id in [t1.id, t2.id] {
        assert!(ticket::Entity::find_by_id(ticket_id).one(&db).await.unwrap().is_none());
    }
    for comment_id in [c1.id, c2.id] {
        assert!(comment::Entity::find_by_id(comment_id).one(&db).await.unwrap().is_none());
    }

    for user_id in [admin.id, dev.id] {
        let user = reload_user(&db, user_id).await;
        assert!(!user.projects.contains(project.id));
        assert!(user.tickets.is_empty());
        assert!(user.comments.is_empty());
    }
}

#[tokio::test]
async fn delete_user_nulls_references_but_keeps_content() {
    let db = setup_test_db().await;
    let manager = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let dev = insert_user(&db, "dev@example.com", Role::Developer).await;
    let project = insert_project(&db, "X", &manager).await;
    set_project_users(&db, &project, &[manager.id, dev.id]).await;
    let project = reload_project(&db, project.id).await;
    let ticket = insert_ticket(&db, &project, &manager).await;
    set_ticket_devs(&db, &ticket, &project, &[dev.id]).await;
    let comment = insert_comment(&db, &ticket, &manager).await;

    let stored = reload_user(&db, manager.id).await;
    cascade::delete_user(&db, stored).await.expect("delete failed");

    assert!(user::Entity::find_by_id(manager.id).one(&db).await.unwrap().is_none());

    // Content survives; references to the deleted user are nulled or pruned.
    let project = reload_project(&db, project.id).await;
    assert_eq!(project.manager, None);
    assert!(!project.users.contains(manager.id));

    let ticket = reload_ticket(&db, ticket.id).await;
    assert_eq!(ticket.submitter, None);
    assert!(!ticket.devs.contains(manager.id));
    assert!(ticket.devs.contains(dev.id));

    let comment = comment::Entity::find_by_id(comment.id)
        .one(&db)
        .await
        .unwrap()
        .expect("comment must survive");
    assert_eq!(comment.submitter, None);
}

#[tokio::test]
async fn user_project_lists_stay_inverse_of_membership() {
    let db = setup_test_db().await;
    let pm = insert_user(&db, "pm@example.com", Role::ProjectManager).await;
    let dev = insert_user(&db, "dev@example.com", Role::Developer).await;
    let p1 = insert_project(&db, "One", &pm).await;
    let p2 = insert_project(&db, "Two", &pm).await;
    set_project_users(&db, &p1, &[pm.id, dev.id]).await;

    for user in [reload_user(&db, pm.id).await, reload_user(&db, dev.id).await] {
        for project_id in [p1.id, p2.id] {
            let project = reload_project(&db, project_id).await;
            let forward = project.users.contains(user.id) || project.manager == Some(user.id);
            let backward = user.projects.contains(project_id);
            assert_eq!(forward, backward, "inverse invariant violated");
        }
    }
}
