/// Domain models for TaskDesk
///
/// # Models
///
/// - `user`: User accounts, roles and resolved identities
/// - `task`: Tasks, comments and pagination

pub mod task;
pub mod user;
