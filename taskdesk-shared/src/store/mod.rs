/// Storage collaborators
///
/// The auth core and the HTTP layer only see these traits. Two backends are
/// provided:
///
/// - [`memory::MemoryStore`]: process-local maps, used by tests and when no
///   database is configured
/// - [`postgres::PgStore`]: PostgreSQL via sqlx
///
/// Lookups that may legitimately find nothing return `Option`; `Err` is
/// reserved for backend failures, constraint violations and access denied
/// at write time.

use async_trait::async_trait;

use crate::auth::authorization::AuthzError;
use crate::models::task::{
    Comment, CreateTask, Page, PageRequest, Task, TaskPriority, TaskStatus, UpdateTask,
};
use crate::models::user::{CreateUser, Identity, User};

pub mod memory;
pub mod postgres;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint was violated (e.g. duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist
    #[error("Referenced {0} does not exist")]
    MissingReference(&'static str),

    /// The caller lost access to the task before the write landed
    #[error("Denied: {0}")]
    Denied(#[from] AuthzError),

    /// Backend failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Identity store contract
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Finds a user by unique subject (email)
    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>, StoreError>;

    /// Finds a user by numeric ID
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Creates a user
    ///
    /// Fails with `StoreError::Conflict` if the email is taken.
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError>;
}

/// Task store contract
///
/// Mutating lookups by task ID return `Ok(None)` when the task doesn't exist.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, data: CreateTask) -> Result<Task, StoreError>;

    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError>;

    async fn update_task(&self, id: i64, data: UpdateTask) -> Result<Option<Task>, StoreError>;

    /// Deletes a task and its comments; `false` if it didn't exist
    async fn delete_task(&self, id: i64) -> Result<bool, StoreError>;

    async fn list_tasks(&self, page: PageRequest) -> Result<Page<Task>, StoreError>;

    async fn list_by_author(
        &self,
        author_id: i64,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError>;

    async fn list_by_assignee(
        &self,
        assignee_id: i64,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError>;

    /// Sets the assignee; the caller checks that the user exists
    async fn assign_task(&self, id: i64, assignee_id: i64) -> Result<Option<Task>, StoreError>;

    /// Sets the status on behalf of `caller`
    ///
    /// Task access is checked against the row being written, in the same
    /// critical section as the write. Fails with `StoreError::Denied` when
    /// the caller isn't allowed at that point.
    async fn set_status(
        &self,
        id: i64,
        status: TaskStatus,
        caller: &Identity,
    ) -> Result<Option<Task>, StoreError>;

    async fn set_priority(
        &self,
        id: i64,
        priority: TaskPriority,
    ) -> Result<Option<Task>, StoreError>;

    /// Appends a comment written by `caller`
    ///
    /// Task access is checked as in [`TaskStore::set_status`]. Fails with
    /// `StoreError::MissingReference` if the task or author is gone.
    async fn add_comment(
        &self,
        task_id: i64,
        caller: &Identity,
        text: &str,
    ) -> Result<Comment, StoreError>;
}
