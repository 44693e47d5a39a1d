/// Task authorization policy
///
/// Pure decision functions over an [`Identity`] and the ownership facts of a
/// [`Task`]. Nothing here touches storage or writes responses; callers turn a
/// denial into whatever their boundary needs.
///
/// # Permission Model
///
/// | Operation | Allowed for |
/// |-----------|-------------|
/// | create, update, delete, list all, assign, change priority | `ADMIN` |
/// | change status, add comment | `ADMIN`, or the task's assignee; nobody while unassigned |
///
/// Task authors get no extra rights: an author who is not the assignee is
/// treated like any other non-admin.
///
/// # Example
///
/// ```
/// use taskdesk_shared::auth::authorization::can_manage_all_tasks;
/// use taskdesk_shared::models::user::{Identity, Role};
///
/// let admin = Identity { id: 1, subject: "admin@x.com".to_string(), role: Role::Admin };
/// assert!(can_manage_all_tasks(&admin));
/// ```

use crate::models::task::Task;
use crate::models::user::{Identity, Role};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller's role doesn't permit the operation
    #[error("Access denied")]
    AccessDenied,

    /// Task has no assignee
    #[error("Access denied: task {0} has no assignee")]
    Unassigned(i64),
}

/// Whether the identity may run task management operations
///
/// True iff the role is `ADMIN`.
pub fn can_manage_all_tasks(identity: &Identity) -> bool {
    match identity.role {
        Role::Admin => true,
        Role::User => false,
    }
}

/// Whether the identity may change the task's status or comment on it
///
/// True iff the task has an assignee and the role is `ADMIN` or the
/// identity is that assignee. Always false on an unassigned task.
pub fn can_act_on_task(identity: &Identity, task: &Task) -> bool {
    require_task_access(identity, task).is_ok()
}

/// Requires task management rights
pub fn require_manage_all_tasks(identity: &Identity) -> Result<(), AuthzError> {
    if can_manage_all_tasks(identity) {
        Ok(())
    } else {
        Err(AuthzError::AccessDenied)
    }
}

/// Requires self-service rights on a task
///
/// # Errors
///
/// - `AuthzError::Unassigned` when nobody is assigned to the task
/// - `AuthzError::AccessDenied` when a non-admin isn't the assignee
pub fn require_task_access(identity: &Identity, task: &Task) -> Result<(), AuthzError> {
    let Some(assignee) = task.assignee_subject() else {
        return Err(AuthzError::Unassigned(task.id));
    };

    match identity.role {
        Role::Admin => Ok(()),
        Role::User if assignee == identity.subject => Ok(()),
        Role::User => Err(AuthzError::AccessDenied),
    }
}
