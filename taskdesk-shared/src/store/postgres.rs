/// PostgreSQL store
///
/// Implements both store contracts on a sqlx `PgPool`. Queries are checked at
/// runtime so the crate builds without a live database. The schema lives in
/// `migrations/` and is applied with [`crate::db::migrations::run_migrations`].
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskdesk_shared::store::{postgres::PgStore, IdentityStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgStore::new(pool);
/// let user = store.find_by_subject("user@example.com").await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;

use super::{IdentityStore, StoreError, TaskStore};
use crate::auth::authorization::require_task_access;
use crate::models::task::{
    Comment, CreateTask, Page, PageRequest, Task, TaskPriority, TaskStatus, UpdateTask, UserRef,
};
use crate::models::user::{CreateUser, Identity, User};

const TASK_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.status, t.priority,
           t.author_id, a.email AS author_email,
           t.assignee_id, s.email AS assignee_email
    FROM tasks t
    JOIN users a ON a.id = t.author_id
    LEFT JOIN users s ON s.id = t.assignee_id
"#;

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    author_id: i64,
    author_email: String,
    assignee_id: Option<i64>,
    assignee_email: Option<String>,
}

impl TaskRow {
    fn into_task(self, comments: Vec<Comment>) -> Task {
        let assignee = match (self.assignee_id, self.assignee_email) {
            (Some(id), Some(email)) => Some(UserRef { id, email }),
            _ => None,
        };

        Task {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            author: UserRef {
                id: self.author_id,
                email: self.author_email,
            },
            assignee,
            comments,
        }
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unique");
            if constraint.contains("email") {
                return StoreError::Conflict("Email already exists".to_string());
            }
            return StoreError::Conflict(format!("Constraint violation: {}", constraint));
        }
        if db_err.is_foreign_key_violation() {
            let reference = match db_err.constraint() {
                Some("comments_task_fkey") => "task",
                _ => "user",
            };
            return StoreError::MissingReference(reference);
        }
    }
    StoreError::Database(err)
}

/// Locks the task row and checks task access against it
///
/// Returns `false` if the task doesn't exist. The row lock lasts until the
/// surrounding transaction ends.
async fn lock_and_authorize(
    conn: &mut PgConnection,
    id: i64,
    caller: &Identity,
) -> Result<bool, StoreError> {
    let query = format!("{} WHERE t.id = $1 FOR UPDATE OF t", TASK_SELECT);
    let row = sqlx::query_as::<_, TaskRow>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    match row {
        Some(row) => {
            require_task_access(caller, &row.into_task(Vec::new()))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn comments_for(
        &self,
        task_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Comment>>, StoreError> {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.task_id, u.email AS author_email, c.text, c.created_at
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.task_id = ANY($1)
            ORDER BY c.id
            "#,
        )
        .bind(task_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<Comment>> = HashMap::new();
        for comment in comments {
            grouped.entry(comment.task_id).or_default().push(comment);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<TaskRow>) -> Result<Vec<Task>, StoreError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut comments = self.comments_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let task_comments = comments.remove(&row.id).unwrap_or_default();
                row.into_task(task_comments)
            })
            .collect())
    }

    /// Pages through tasks, optionally filtered on one column
    ///
    /// `column` is always one of the fixed names used below, never user input.
    async fn page_where(
        &self,
        column: Option<&'static str>,
        value: i64,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError> {
        let (filter, count_filter) = match column {
            Some(col) => (format!("WHERE t.{} = $3", col), format!("WHERE {} = $1", col)),
            None => (String::new(), String::new()),
        };

        let query = format!("{} {} ORDER BY t.id LIMIT $1 OFFSET $2", TASK_SELECT, filter);
        let mut rows_query = sqlx::query_as::<_, TaskRow>(&query)
            .bind(i64::from(page.size))
            .bind(page.offset() as i64);
        if column.is_some() {
            rows_query = rows_query.bind(value);
        }
        let rows = rows_query.fetch_all(&self.pool).await?;

        let count_query = format!("SELECT COUNT(*) FROM tasks {}", count_filter);
        let mut total_query = sqlx::query_scalar::<_, i64>(&count_query);
        if column.is_some() {
            total_query = total_query.bind(value);
        }
        let total = total_query.fetch_one(&self.pool).await?;

        let content = self.hydrate(rows).await?;
        Ok(Page::new(content, page, total.max(0) as u64))
    }

    /// Re-reads a task after a mutation that reported a touched row
    async fn reload(&self, touched: Option<i64>) -> Result<Option<Task>, StoreError> {
        match touched {
            Some(id) => self.find_task(id).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, role
            "#,
        )
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, data: CreateTask) -> Result<Task, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tasks (title, description, status, priority, author_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.find_task(id)
            .await?
            .ok_or(StoreError::MissingReference("task"))
    }

    async fn find_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let query = format!("{} WHERE t.id = $1", TASK_SELECT);
        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_task(&self, id: i64, data: UpdateTask) -> Result<Option<Task>, StoreError> {
        let touched: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, status = $4, priority = $5
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .fetch_optional(&self.pool)
        .await?;

        self.reload(touched).await
    }

    async fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_tasks(&self, page: PageRequest) -> Result<Page<Task>, StoreError> {
        self.page_where(None, 0, page).await
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError> {
        self.page_where(Some("author_id"), author_id, page).await
    }

    async fn list_by_assignee(
        &self,
        assignee_id: i64,
        page: PageRequest,
    ) -> Result<Page<Task>, StoreError> {
        self.page_where(Some("assignee_id"), assignee_id, page).await
    }

    async fn assign_task(&self, id: i64, assignee_id: i64) -> Result<Option<Task>, StoreError> {
        let touched: Option<i64> =
            sqlx::query_scalar("UPDATE tasks SET assignee_id = $2 WHERE id = $1 RETURNING id")
                .bind(id)
                .bind(assignee_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_write_error)?;

        self.reload(touched).await
    }

    async fn set_status(
        &self,
        id: i64,
        status: TaskStatus,
        caller: &Identity,
    ) -> Result<Option<Task>, StoreError> {
        let mut tx = self.pool.begin().await?;
        if !lock_and_authorize(&mut *tx, id, caller).await? {
            return Ok(None);
        }

        let touched: Option<i64> =
            sqlx::query_scalar("UPDATE tasks SET status = $2 WHERE id = $1 RETURNING id")
                .bind(id)
                .bind(status)
                .fetch_optional(&mut *tx)
                .await?;
        tx.commit().await?;

        self.reload(touched).await
    }

    async fn set_priority(
        &self,
        id: i64,
        priority: TaskPriority,
    ) -> Result<Option<Task>, StoreError> {
        let touched: Option<i64> =
            sqlx::query_scalar("UPDATE tasks SET priority = $2 WHERE id = $1 RETURNING id")
                .bind(id)
                .bind(priority)
                .fetch_optional(&self.pool)
                .await?;

        self.reload(touched).await
    }

    async fn add_comment(
        &self,
        task_id: i64,
        caller: &Identity,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let mut tx = self.pool.begin().await?;
        if !lock_and_authorize(&mut *tx, task_id, caller).await? {
            return Err(StoreError::MissingReference("task"));
        }

        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (task_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, task_id, author_id, text, created_at
            )
            SELECT i.id, i.task_id, u.email AS author_email, i.text, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(task_id)
        .bind(caller.id)
        .bind(text)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;
        tx.commit().await?;

        Ok(comment)
    }
}
