//! Entity Reference Manager.
//!
//! Creating, re-linking, or deleting an entity must update the back-reference
//! lists of every related entity, or the store ends up with dangling ids.
//! These functions perform exactly that bookkeeping. They are generic over
//! [`ConnectionTrait`] and deliberately do not open transactions themselves:
//! the caller begins one transaction per logical request, runs the entity
//! write plus the matching cascade call inside it, and commits only when both
//! succeeded.
//!
//! Deletion semantics are asymmetric by design: deleting a Project or Ticket
//! cascade-deletes its children, while deleting a User only nulls or prunes
//! references to them. Content outlives its author, not its container.

use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{comment, project, ticket, user, IdList};
use crate::entities::user::Role;

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error(transparent)]
    Db(#[from] DbErr),

    /// A referenced entity does not exist. Carries the entity kind.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Appointed manager does not hold a management role.
    #[error("User is not a project manager")]
    ManagerNotQualified,

    /// Referenced user is not a member of the project.
    #[error("User is not assigned to the project")]
    NotProjectMember,

    /// Users with the plain "User" role cannot be assigned as developers.
    #[error("User is not a developer")]
    NotDeveloper,
}

async fn require_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<user::Model, CascadeError> {
    user::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(CascadeError::NotFound("User"))
}

async fn require_project<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<project::Model, CascadeError> {
    project::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(CascadeError::NotFound("Project"))
}

async fn require_ticket<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<ticket::Model, CascadeError> {
    ticket::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(CascadeError::NotFound("Ticket"))
}

async fn require_comment<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<comment::Model, CascadeError> {
    comment::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(CascadeError::NotFound("Comment"))
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

// ============================================================
// Create
// ============================================================

/// Bookkeeping after inserting a project: the manager gains the project in
/// their `projects` list. The inserted row itself must already satisfy the
/// `manager ∈ users` invariant (callers create projects with
/// `users = [manager]`).
pub async fn project_created<C: ConnectionTrait>(
    conn: &C,
    project: &project::Model,
) -> Result<(), CascadeError> {
    let Some(manager_id) = project.manager else {
        return Ok(());
    };

    let manager = require_user(conn, manager_id).await?;
    let mut projects = manager.projects.clone();
    projects.insert(project.id);

    let mut active: user::ActiveModel = manager.into();
    active.projects = Set(projects);
    active.update(conn).await?;

    Ok(())
}

/// Bookkeeping after inserting a ticket: the parent project and the submitter
/// both gain the ticket in their `tickets` lists.
pub async fn ticket_created<C: ConnectionTrait>(
    conn: &C,
    ticket: &ticket::Model,
) -> Result<(), CascadeError> {
    let project = require_project(conn, ticket.project).await?;
    let mut tickets = project.tickets.clone();
    tickets.insert(ticket.id);

    let mut active: project::ActiveModel = project.into();
    active.tickets = Set(tickets);
    active.update(conn).await?;

    if let Some(submitter_id) = ticket.submitter {
        let submitter = require_user(conn, submitter_id).await?;
        let mut tickets = submitter.tickets.clone();
        tickets.insert(ticket.id);

        let mut active: user::ActiveModel = submitter.into();
        active.tickets = Set(tickets);
        active.update(conn).await?;
    }

    Ok(())
}

/// Bookkeeping after inserting a comment: the parent ticket and the author
/// both gain the comment in their `comments` lists.
pub async fn comment_created<C: ConnectionTrait>(
    conn: &C,
    comment: &comment::Model,
) -> Result<(), CascadeError> {
    let ticket = require_ticket(conn, comment.ticket).await?;
    let mut comments = ticket.comments.clone();
    comments.insert(comment.id);

    let mut active: ticket::ActiveModel = ticket.into();
    active.comments = Set(comments);
    active.update(conn).await?;

    if let Some(submitter_id) = comment.submitter {
        let submitter = require_user(conn, submitter_id).await?;
        let mut comments = submitter.comments.clone();
        comments.insert(comment.id);

        let mut active: user::ActiveModel = submitter.into();
        active.comments = Set(comments);
        active.update(conn).await?;
    }

    Ok(())
}

// ============================================================
// Relationship updates
// ============================================================

/// Reassign a project's member list.
///
/// Errors if any new id does not resolve to an existing user. Removed members
/// lose the project from their `projects` list and are pulled from the `devs`
/// of every ticket under the project; a removed dev also loses the ticket
/// from their `tickets` list unless they submitted it. Added members gain the
/// project in their `projects` list.
///
/// The current manager is retained in the resulting list even when the
/// caller's list omits them (`manager ∈ users` invariant). Returns the list
/// the caller must store on the project row.
pub async fn update_project_users<C: ConnectionTrait>(
    conn: &C,
    project: &project::Model,
    new_users: &[Uuid],
) -> Result<IdList, CascadeError> {
    let mut resulting = dedup(new_users);
    if let Some(manager_id) = project.manager {
        if !resulting.contains(&manager_id) {
            resulting.push(manager_id);
        }
    }

    let added: Vec<Uuid> = resulting
        .iter()
        .copied()
        .filter(|id| !project.users.contains(*id))
        .collect();
    let removed: Vec<Uuid> = project
        .users
        .iter()
        .filter(|id| !resulting.contains(id))
        .collect();

    for user_id in added {
        let member = require_user(conn, user_id).await?;
        let mut projects = member.projects.clone();
        projects.insert(project.id);

        let mut active: user::ActiveModel = member.into();
        active.projects = Set(projects);
        active.update(conn).await?;
    }

    for user_id in removed {
        let member = require_user(conn, user_id).await?;
        let mut projects = member.projects.clone();
        projects.remove(project.id);
        let mut tickets = member.tickets.clone();

        // A removed member cannot stay assigned as a developer on the
        // project's tickets. Submitters keep their ticket reference.
        for ticket_id in project.tickets.iter() {
            let ticket = require_ticket(conn, ticket_id).await?;
            if !ticket.devs.contains(user_id) {
                continue;
            }

            let submitter = ticket.submitter;
            let mut devs = ticket.devs.clone();
            devs.remove(user_id);

            let mut active: ticket::ActiveModel = ticket.into();
            active.devs = Set(devs);
            active.update(conn).await?;

            if submitter != Some(user_id) {
                tickets.remove(ticket_id);
            }
        }

        let mut active: user::ActiveModel = member.into();
        active.projects = Set(projects);
        active.tickets = Set(tickets);
        active.update(conn).await?;
    }

    Ok(IdList::new(resulting))
}

/// Validate a manager reassignment and compute the resulting member list.
///
/// The appointee must hold a management role and be a member of the resulting
/// user set (`pending_users` when the same request also edits members,
/// otherwise the stored set). The outgoing manager stays a member. Returns
/// the member list the caller must store alongside `manager = new_manager`.
pub async fn update_project_manager<C: ConnectionTrait>(
    conn: &C,
    project: &project::Model,
    new_manager: Uuid,
    pending_users: Option<&IdList>,
) -> Result<IdList, CascadeError> {
    let current: Vec<Uuid> = match pending_users {
        Some(list) => list.iter().collect(),
        None => project.users.iter().collect(),
    };

    let appointee = require_user(conn, new_manager).await?;
    if !appointee.role.is_management() {
        return Err(CascadeError::ManagerNotQualified);
    }
    if !current.contains(&new_manager) {
        return Err(CascadeError::NotProjectMember);
    }

    let mut resulting = IdList::default();
    if let Some(old_manager) = project.manager {
        resulting.insert(old_manager);

        // A pending member edit may have dropped the outgoing manager; keep
        // them assigned, which also means keeping the project in their list.
        if !current.contains(&old_manager) {
            let outgoing = require_user(conn, old_manager).await?;
            let mut projects = outgoing.projects.clone();
            projects.insert(project.id);

            let mut active: user::ActiveModel = outgoing.into();
            active.projects = Set(projects);
            active.update(conn).await?;
        }
    }
    for id in current {
        resulting.insert(id);
    }

    Ok(resulting)
}

/// Reassign a ticket's developer list.
///
/// Every new dev must be a member of the parent project and must not hold the
/// plain "User" role. The submitter is implicitly linked to the ticket and is
/// exempt from `tickets` push/pull bookkeeping. Returns the list the caller
/// must store on the ticket row.
pub async fn update_ticket_devs<C: ConnectionTrait>(
    conn: &C,
    ticket: &ticket::Model,
    project: &project::Model,
    new_devs: &[Uuid],
) -> Result<IdList, CascadeError> {
    let resulting = dedup(new_devs);

    let mut loaded: Vec<user::Model> = Vec::with_capacity(resulting.len());
    for dev_id in &resulting {
        if !project.users.contains(*dev_id) {
            return Err(CascadeError::NotProjectMember);
        }
        let dev = require_user(conn, *dev_id).await?;
        if dev.role == Role::User {
            return Err(CascadeError::NotDeveloper);
        }
        loaded.push(dev);
    }

    let submitter = ticket.submitter;

    for dev_id in ticket.devs.iter() {
        if resulting.contains(&dev_id) || Some(dev_id) == submitter {
            continue;
        }
        let dev = require_user(conn, dev_id).await?;
        let mut tickets = dev.tickets.clone();
        tickets.remove(ticket.id);

        let mut active: user::ActiveModel = dev.into();
        active.tickets = Set(tickets);
        active.update(conn).await?;
    }

    for dev in loaded {
        if ticket.devs.contains(dev.id) || Some(dev.id) == submitter {
            continue;
        }
        let mut tickets = dev.tickets.clone();
        tickets.insert(ticket.id);

        let mut active: user::ActiveModel = dev.into();
        active.tickets = Set(tickets);
        active.update(conn).await?;
    }

    Ok(IdList::new(resulting))
}

// ============================================================
// Delete
// ============================================================

/// Delete a comment and pull its id from the parent ticket's and the
/// author's `comments` lists.
pub async fn delete_comment<C: ConnectionTrait>(
    conn: &C,
    comment: comment::Model,
) -> Result<(), CascadeError> {
    remove_comment(conn, comment, true).await
}

/// Delete a ticket: pull it from the project's, submitter's, and every dev's
/// reference lists, then delete all child comments.
pub async fn delete_ticket<C: ConnectionTrait>(
    conn: &C,
    ticket: ticket::Model,
) -> Result<(), CascadeError> {
    remove_ticket(conn, ticket, true).await
}

/// Delete a project: pull it from the manager's and every member's `projects`
/// list, then cascade-delete all its tickets (and their comments).
pub async fn delete_project<C: ConnectionTrait>(
    conn: &C,
    project: project::Model,
) -> Result<(), CascadeError> {
    let mut members: Vec<Uuid> = project.users.iter().collect();
    if let Some(manager_id) = project.manager {
        if !members.contains(&manager_id) {
            members.push(manager_id);
        }
    }

    for user_id in members {
        let member = require_user(conn, user_id).await?;
        let mut projects = member.projects.clone();
        projects.remove(project.id);

        let mut active: user::ActiveModel = member.into();
        active.projects = Set(projects);
        active.update(conn).await?;
    }

    for ticket_id in project.tickets.iter() {
        let ticket = require_ticket(conn, ticket_id).await?;
        remove_ticket(conn, ticket, false).await?;
    }

    project::Entity::delete_by_id(project.id).exec(conn).await?;

    Ok(())
}

/// Delete a user: null or prune every reference to them, but never delete
/// the projects, tickets, or comments they touched.
pub async fn delete_user<C: ConnectionTrait>(
    conn: &C,
    user: user::Model,
) -> Result<(), CascadeError> {
    for project_id in user.projects.iter() {
        let project = require_project(conn, project_id).await?;
        let manager = project.manager;
        let mut users = project.users.clone();
        users.remove(user.id);

        let mut active: project::ActiveModel = project.into();
        active.users = Set(users);
        if manager == Some(user.id) {
            active.manager = Set(None);
        }
        active.update(conn).await?;
    }

    for ticket_id in user.tickets.iter() {
        let ticket = require_ticket(conn, ticket_id).await?;
        let submitter = ticket.submitter;
        let mut devs = ticket.devs.clone();
        devs.remove(user.id);

        let mut active: ticket::ActiveModel = ticket.into();
        active.devs = Set(devs);
        if submitter == Some(user.id) {
            active.submitter = Set(None);
        }
        active.update(conn).await?;
    }

    for comment_id in user.comments.iter() {
        let comment = require_comment(conn, comment_id).await?;
        let mut active: comment::ActiveModel = comment.into();
        active.submitter = Set(None);
        active.update(conn).await?;
    }

    user::Entity::delete_by_id(user.id).exec(conn).await?;

    Ok(())
}

// `update_parent` is false when the parent is itself being deleted; pulling
// references out of a doomed row is wasted work.
async fn remove_ticket<C: ConnectionTrait>(
    conn: &C,
    ticket: ticket::Model,
    update_parent: bool,
) -> Result<(), CascadeError> {
    if update_parent {
        let project = require_project(conn, ticket.project).await?;
        let mut tickets = project.tickets.clone();
        tickets.remove(ticket.id);

        let mut active: project::ActiveModel = project.into();
        active.tickets = Set(tickets);
        active.update(conn).await?;
    }

    let mut holders: Vec<Uuid> = ticket.devs.iter().collect();
    if let Some(submitter_id) = ticket.submitter {
        if !holders.contains(&submitter_id) {
            holders.push(submitter_id);
        }
    }

    for user_id in holders {
        let holder = require_user(conn, user_id).await?;
        let mut tickets = holder.tickets.clone();
        tickets.remove(ticket.id);

        let mut active: user::ActiveModel = holder.into();
        active.tickets = Set(tickets);
        active.update(conn).await?;
    }

    for comment_id in ticket.comments.iter() {
        let comment = require_comment(conn, comment_id).await?;
        remove_comment(conn, comment, false).await?;
    }

    ticket::Entity::delete_by_id(ticket.id).exec(conn).await?;

    Ok(())
}

async fn remove_comment<C: ConnectionTrait>(
    conn: &C,
    comment: comment::Model,
    update_parent: bool,
) -> Result<(), CascadeError> {
    if update_parent {
        let ticket = require_ticket(conn, comment.ticket).await?;
        let mut comments = ticket.comments.clone();
        comments.remove(comment.id);

        let mut active: ticket::ActiveModel = ticket.into();
        active.comments = Set(comments);
        active.update(conn).await?;
    }

    if let Some(submitter_id) = comment.submitter {
        let author = require_user(conn, submitter_id).await?;
        let mut comments = author.comments.clone();
        comments.remove(comment.id);

        let mut active: user::ActiveModel = author.into();
        active.comments = Set(comments);
        active.update(conn).await?;
    }

    comment::Entity::delete_by_id(comment.id).exec(conn).await?;

    Ok(())
}
