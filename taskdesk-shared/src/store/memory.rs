/// In-memory store
///
/// Keeps users, tasks and comments in ordered maps behind a single
/// `tokio::sync::RwLock`. The lock is held for one operation at a time and
/// never across an await on anything else.
///
/// # Example
///
/// ```
/// use taskdesk_shared::models::user::{CreateUser, Role};
/// use taskdesk_shared::store::{memory::MemoryStore, IdentityStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let user = store
///     .create_user(CreateUser {
///         email: "a@x.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         role: Role::User,
///     })
///     .await?;
///
/// assert!(store.find_by_subject("a@x.com").await?.is_some());
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{IdentityStore, StoreError, TaskStore};
use crate::auth::authorization::require_task_access;
use crate::models::task::{
    Comment, CreateTask, Page, PageRequest, Task, TaskPriority, TaskStatus, UpdateTask, UserRef,
};
use crate::models::user::{CreateUser, Identity, User};

#[derive(Debug, Clone)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    author_id: i64,
    assignee_id: Option<i64>,
}

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    tasks: BTreeMap<i64, TaskRow>,
    comments: Vec<Comment>,
    next_user_id: i64,
    next_task_id: i64,
    next_comment_id: i64,
}

impl Inner {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn user_ref(&self, id: i64) -> Result<UserRef, StoreError> {
        self.users
            .get(&id)
            .map(|u| UserRef { id: u.id, email: u.email.clone() })
            .ok_or(StoreError::MissingReference("user"))
    }

    fn materialize(&self, row: &TaskRow) -> Result<Task, StoreError> {
        let assignee = match row.assignee_id {
            Some(id) => Some(self.user_ref(id)?),
            None => None,
        };

        Ok(Task {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            status: row.status,
            priority: row.priority,
            author: self.user_ref(row.author_id)?,
            assignee,
            comments: self
                .comments
                .iter()
                .filter(|c| c.task_id == row.id)
                .cloned()
                .collect(),
        })
    }

    fn page_where<F>(&self, page: PageRequest, filter: F) -> Result<Page<Task>, StoreError>
    where
        F: Fn(&TaskRow) -> bool,
    {
        let matching: Vec<&TaskRow> = self.tasks.values().filter(|row| filter(row)).collect();
        let total = matching.len() as u64;

        let content = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .map(|row| self.materialize(row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(content, page, total))
    }

    /// Checks task access against the current row; `false` if the task is gone
    fn authorize(&self, id: i64, caller: &Identity) -> Result<bool, StoreError> {
        let Some(row) = self.tasks.get(&id) else {
            return Ok(false);
        };
        require_task_access(caller, &self.materialize(row)?)?;
        Ok(true)
    }

    fn modify<F>(&mut self, id: i64, apply: F) -> Result<Option<Task>, StoreError>
    where
        F: FnOnce(&mut TaskRow),
    {
        let Some(row) = self.tasks.get_mut(&id) else {
            return Ok(None);
        };
        apply(row);

        let row = row.clone();
        self.materialize(&row).map(Some)
    }
}

/// Process-local store implementing both store contracts
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == subject).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.email == data.email) {
            return Err(StoreError::Conflict("Email already exists".to_string()));
        }

        let id = Inner::next_id(&mut inner.next_user_id);
        let user = User {
            id,
            email: data.email,
            password_hash: data.password_hash,
            role: data.role,
        };
        inner.users.insert(id, user.clone());

        Ok(user)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, data: CreateTask) -> Result<Task, StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(&data.author_id) {
            return Err(StoreError::MissingReference("user"));
        }

        let id = Inner::next_id(&mut inner.next_task_id);
        let row = TaskRow {
            id,
            title: data.title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            author_id: data.author_id,
            assignee_id: None,
        };
        let task = inner.materialize(&row)?;
        inner.tasks.insert(id, row);

        Ok(task)
    }

    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let inner = self.inner.read().await;
        inner.tasks.get(&id).map(|row| inner.materialize(row)).transpose()
    }

    async fn update_task(&self, id: i64, data: UpdateTask) -> Result<Option<Task>, StoreError> {
        self.inner.write().await.modify(id, |row| {
            row.title = data.title;
            row.description = data.description;
            row.status = data.status;
            row.priority = data.priority;
        })
    }

    async fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.tasks.remove(&id).is_none() {
            return Ok(false);
        }
        inner.comments.retain(|c| c.task_id != id);
        Ok(true)
    }

    async fn list_tasks(&self, page: PageRequest) -> Result<Page<Task>, StoreError> {
        self.inner.read().await.page_where(page, |_| true)
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError> {
        self.inner
            .read()
            .await
            .page_where(page, |row| row.author_id == author_id)
    }

    async fn list_by_assignee(
        &self,
        assignee_id: i64,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError> {
        self.inner
            .read()
            .await
            .page_where(page, |row| row.assignee_id == Some(assignee_id))
    }

    async fn assign_task(&self, id: i64, assignee_id: i64) -> Result<Option<Task>, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&assignee_id) {
            return Err(StoreError::MissingReference("user"));
        }
        inner.modify(id, |row| row.assignee_id = Some(assignee_id))
    }

    async fn set_status(
        &self,
        id: i64,
        status: TaskStatus,
        caller: &Identity,
    ) -> Result<Option<Task>, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.authorize(id, caller)? {
            return Ok(None);
        }
        inner.modify(id, |row| row.status = Some(status))
    }

    async fn set_priority(
        &self,
        id: i64,
        priority: TaskPriority,
    ) -> Result<Option<Task>, StoreError> {
        self.inner.write().await.modify(id, |row| row.priority = Some(priority))
    }

    async fn add_comment(
        &self,
        task_id: i64,
        caller: &Identity,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.authorize(task_id, caller)? {
            return Err(StoreError::MissingReference("task"));
        }
        let author = inner.user_ref(caller.id)?;

        let id = Inner::next_id(&mut inner.next_comment_id);
        let comment = Comment {
            id,
            task_id,
            author_email: author.email,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        inner.comments.push(comment.clone());

        Ok(comment)
    }
}
