//! Access control policy
//!
//! Pure decisions over the requester and the target entity. Handlers load
//! whatever rows the decision needs and call in here before mutating.

use bugtrack_db::entities::user::{Model as User, Role};
use bugtrack_db::entities::{comment, ticket};
use uuid::Uuid;

fn is_admin(user: &User) -> bool {
    user.role == Role::Admin
}

fn is_manager(user: &User, manager: Option<Uuid>) -> bool {
    manager == Some(user.id)
}

/// Project creation: Admin or Project Manager.
pub fn can_create_project(requester: &User) -> bool {
    requester.role.is_management()
}

/// Project edit/delete (title, description, users, manager): Admin or the
/// project's manager.
pub fn can_manage_project(requester: &User, manager: Option<Uuid>) -> bool {
    is_admin(requester) || is_manager(requester, manager)
}

/// Ticket creation: Admin, or member of the target project.
pub fn can_create_ticket(requester: &User, project_id: Uuid) -> bool {
    is_admin(requester) || requester.projects.contains(project_id)
}

/// Any ticket edit at all: Admin, project manager, submitter, or assigned dev.
pub fn can_touch_ticket(requester: &User, manager: Option<Uuid>, ticket: &ticket::Model) -> bool {
    is_admin(requester)
        || is_manager(requester, manager)
        || ticket.submitter == Some(requester.id)
        || ticket.devs.contains(requester.id)
}

/// Ticket title/description: Admin, project manager, or submitter.
pub fn can_edit_ticket_text(
    requester: &User,
    manager: Option<Uuid>,
    ticket: &ticket::Model,
) -> bool {
    is_admin(requester) || is_manager(requester, manager) || ticket.submitter == Some(requester.id)
}

/// Ticket status: Admin, project manager, or assigned dev.
pub fn can_edit_ticket_status(
    requester: &User,
    manager: Option<Uuid>,
    ticket: &ticket::Model,
) -> bool {
    is_admin(requester) || is_manager(requester, manager) || ticket.devs.contains(requester.id)
}

/// Ticket devs list and ticket deletion: Admin or project manager.
pub fn can_manage_ticket(requester: &User, manager: Option<Uuid>) -> bool {
    is_admin(requester) || is_manager(requester, manager)
}

/// Comment creation: Admin, or user already linked to the parent ticket.
pub fn can_create_comment(requester: &User, ticket_id: Uuid) -> bool {
    is_admin(requester) || requester.tickets.contains(ticket_id)
}

/// Comment edit: the original submitter only, no Admin override.
pub fn can_edit_comment(requester: &User, comment: &comment::Model) -> bool {
    comment.submitter == Some(requester.id)
}

/// Comment deletion: Admin or the original submitter.
pub fn can_delete_comment(requester: &User, comment: &comment::Model) -> bool {
    is_admin(requester) || comment.submitter == Some(requester.id)
}

/// User listing: Admin or Project Manager.
pub fn can_list_users(requester: &User) -> bool {
    requester.role.is_management()
}

/// Profile edits (name/email/password): Admin or the user themselves.
pub fn can_edit_user(requester: &User, target_id: Uuid) -> bool {
    is_admin(requester) || requester.id == target_id
}

/// Role changes: Admin only, never on their own account.
pub fn can_edit_role(requester: &User, target_id: Uuid) -> bool {
    is_admin(requester) && requester.id != target_id
}

/// User deletion: Admin or the user themselves. Admin accounts can never be
/// deleted; the handler reports that case separately.
pub fn can_delete_user(requester: &User, target_id: Uuid) -> bool {
    is_admin(requester) || requester.id == target_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugtrack_db::IdList;
    use chrono::Utc;

    fn make_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: String::new(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
            registered: Utc::now(),
            projects: IdList::default(),
            tickets: IdList::default(),
            comments: IdList::default(),
        }
    }

    fn make_ticket(project: Uuid, submitter: Uuid) -> ticket::Model {
        ticket::Model {
            id: Uuid::new_v4(),
            title: "T".to_string(),
            description: "D".to_string(),
            status: true,
            project,
            submitter: Some(submitter),
            devs: IdList::default(),
            comments: IdList::default(),
            created: Utc::now(),
        }
    }

    #[test]
    fn project_creation_is_management_only() {
        assert!(can_create_project(&make_user(Role::Admin)));
        assert!(can_create_project(&make_user(Role::ProjectManager)));
        assert!(!can_create_project(&make_user(Role::Developer)));
        assert!(!can_create_project(&make_user(Role::User)));
    }

    #[test]
    fn project_management_needs_admin_or_manager() {
        let admin = make_user(Role::Admin);
        let pm = make_user(Role::ProjectManager);
        let other = make_user(Role::ProjectManager);

        assert!(can_manage_project(&admin, Some(pm.id)));
        assert!(can_manage_project(&pm, Some(pm.id)));
        assert!(!can_manage_project(&other, Some(pm.id)));
        assert!(!can_manage_project(&other, None));
    }

    #[test]
    fn ticket_creation_needs_project_membership() {
        let project_id = Uuid::new_v4();
        let mut dev = make_user(Role::Developer);
        assert!(!can_create_ticket(&dev, project_id));
        dev.projects.insert(project_id);
        assert!(can_create_ticket(&dev, project_id));
        assert!(can_create_ticket(&make_user(Role::Admin), project_id));
    }

    #[test]
    fn ticket_status_is_for_devs_not_submitter() {
        let manager = make_user(Role::ProjectManager);
        let submitter = make_user(Role::User);
        let dev = make_user(Role::Developer);
        let mut ticket = make_ticket(Uuid::new_v4(), submitter.id);
        ticket.devs.insert(dev.id);

        assert!(can_edit_ticket_status(&manager, Some(manager.id), &ticket));
        assert!(can_edit_ticket_status(&dev, Some(manager.id), &ticket));
        assert!(!can_edit_ticket_status(&submitter, Some(manager.id), &ticket));

        // Text edits are the inverse: submitter yes, dev no.
        assert!(can_edit_ticket_text(&submitter, Some(manager.id), &ticket));
        assert!(!can_edit_ticket_text(&dev, Some(manager.id), &ticket));
    }

    #[test]
    fn comment_edit_has_no_admin_override() {
        let admin = make_user(Role::Admin);
        let author = make_user(Role::User);
        let comment = comment::Model {
            id: Uuid::new_v4(),
            content: "C".to_string(),
            created: Utc::now(),
            ticket: Uuid::new_v4(),
            submitter: Some(author.id),
        };

        assert!(can_edit_comment(&author, &comment));
        assert!(!can_edit_comment(&admin, &comment));

        assert!(can_delete_comment(&author, &comment));
        assert!(can_delete_comment(&admin, &comment));
        assert!(!can_delete_comment(&make_user(Role::User), &comment));
    }

    #[test]
    fn role_change_excludes_self() {
        let admin = make_user(Role::Admin);
        let target = make_user(Role::User);

        assert!(can_edit_role(&admin, target.id));
        assert!(!can_edit_role(&admin, admin.id));
        assert!(!can_edit_role(&make_user(Role::ProjectManager), target.id));
    }

    #[test]
    fn user_edit_and_delete_rules() {
        let admin = make_user(Role::Admin);
        let user = make_user(Role::User);
        let other = make_user(Role::User);

        assert!(can_edit_user(&admin, user.id));
        assert!(can_edit_user(&user, user.id));
        assert!(!can_edit_user(&other, user.id));

        assert!(can_delete_user(&admin, user.id));
        assert!(can_delete_user(&user, user.id));
        assert!(!can_delete_user(&other, user.id));
    }
}
