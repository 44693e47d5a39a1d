/// Task endpoints
///
/// Every handler takes a [`CurrentUser`], so anonymous callers get 403
/// before any store access. Management operations require `ADMIN`;
/// status changes and comments require `ADMIN` or the task's assignee.
///
/// # Endpoints
///
/// - `POST   /api/tasks` - Create task
/// - `GET    /api/tasks?page&size` - List all tasks
/// - `GET    /api/tasks/assignee?userId&page&size` - List tasks assigned to a user
/// - `GET    /api/tasks/author?userId&page&size` - List tasks created by a user
/// - `PUT    /api/tasks/:id` - Replace task fields
/// - `DELETE /api/tasks/:id` - Delete task
/// - `PUT    /api/tasks/:id/priority?newPriority` - Change priority
/// - `PUT    /api/tasks/:id/assign?assigneeId` - Assign task
/// - `PUT    /api/tasks/:id/status?newStatus` - Change status
/// - `POST   /api/tasks/:id/comment?comment` - Add comment

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::CurrentUser,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use taskdesk_shared::{
    auth::authorization::require_manage_all_tasks,
    models::task::{
        Comment, CreateTask, Page, PageRequest, Task, TaskPriority, TaskStatus, UpdateTask,
    },
    models::user::Identity,
    store::StoreError,
};
use validator::Validate;

/// Create/update request body
#[derive(Debug, Deserialize, Validate)]
pub struct TaskRequest {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: String,

    #[validate(length(max = 500, message = "Description too long"))]
    pub description: Option<String>,

    pub status: Option<TaskStatus>,

    pub priority: Option<TaskPriority>,
}

/// Task as returned to clients
///
/// Author and assignee are reduced to their emails; an unassigned task has
/// an empty `assignee`. Comments are reduced to their text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: i64,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    pub author: String,

    pub assignee: String,

    pub comments: Vec<String>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            author: task.author.email,
            assignee: task.assignee.map(|a| a.email).unwrap_or_default(),
            comments: task.comments.into_iter().map(|c| c.text).collect(),
        }
    }
}

/// `?page&size`
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(0),
            self.size.unwrap_or(PageRequest::DEFAULT_SIZE),
        )
    }
}

/// `?userId&page&size`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTasksQuery {
    pub user_id: i64,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl UserTasksQuery {
    fn request(&self) -> PageRequest {
        PageQuery {
            page: self.page,
            size: self.size,
        }
        .request()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityQuery {
    pub new_priority: TaskPriority,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignQuery {
    pub assignee_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub new_status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub comment: String,
}

fn task_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Task {} not found", id))
}

fn user_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("User {} not found", id))
}

async fn load_task(state: &AppState, id: i64) -> ApiResult<Task> {
    state.tasks.find_task(id).await?.ok_or_else(|| task_not_found(id))
}

/// Maps a failed assignee-guarded write, logging access denials
fn guarded_write_error(err: StoreError, id: i64, caller: &Identity, action: &str) -> ApiError {
    match err {
        StoreError::Denied(reason) => {
            tracing::warn!(
                task_id = id,
                subject = %caller.subject,
                reason = %reason,
                "{} denied",
                action
            );
            reason.into()
        }
        StoreError::MissingReference("task") => task_not_found(id),
        other => other.into(),
    }
}

async fn ensure_user_exists(state: &AppState, id: i64) -> ApiResult<()> {
    state
        .identities
        .find_user_by_id(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| user_not_found(id))
}

/// Create a task authored by the caller (`ADMIN`)
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an administrator
/// - `422 Unprocessable Entity`: Empty title or description over 500 characters
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(req): Json<TaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    require_manage_all_tasks(&caller)?;
    req.validate()?;

    let task = state
        .tasks
        .create_task(CreateTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            author_id: caller.id,
        })
        .await?;

    tracing::info!(task_id = task.id, author = %caller.subject, "Task created");

    Ok((StatusCode::CREATED, Json(task.into())))
}

/// Replace a task's editable fields (`ADMIN`)
pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<TaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    require_manage_all_tasks(&caller)?;
    req.validate()?;

    let task = state
        .tasks
        .update_task(
            id,
            UpdateTask {
                title: req.title,
                description: req.description,
                status: req.status,
                priority: req.priority,
            },
        )
        .await?
        .ok_or_else(|| task_not_found(id))?;

    tracing::info!(task_id = id, by = %caller.subject, "Task updated");

    Ok(Json(task.into()))
}

/// Delete a task (`ADMIN`)
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_manage_all_tasks(&caller)?;

    if !state.tasks.delete_task(id).await? {
        return Err(task_not_found(id));
    }

    tracing::info!(task_id = id, by = %caller.subject, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// List all tasks (`ADMIN`)
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<TaskResponse>>> {
    require_manage_all_tasks(&caller)?;

    let page = state.tasks.list_tasks(query.request()).await?;

    Ok(Json(page.map(TaskResponse::from)))
}

/// List tasks assigned to a user (any authenticated caller)
///
/// # Errors
///
/// - `404 Not Found`: No user with `userId`
pub async fn list_by_assignee(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Query(query): Query<UserTasksQuery>,
) -> ApiResult<Json<Page<TaskResponse>>> {
    ensure_user_exists(&state, query.user_id).await?;

    let page = state
        .tasks
        .list_by_assignee(query.user_id, query.request())
        .await?;

    Ok(Json(page.map(TaskResponse::from)))
}

/// List tasks created by a user (any authenticated caller)
///
/// # Errors
///
/// - `404 Not Found`: No user with `userId`
pub async fn list_by_author(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Query(query): Query<UserTasksQuery>,
) -> ApiResult<Json<Page<TaskResponse>>> {
    ensure_user_exists(&state, query.user_id).await?;

    let page = state
        .tasks
        .list_by_author(query.user_id, query.request())
        .await?;

    Ok(Json(page.map(TaskResponse::from)))
}

/// Change a task's priority (`ADMIN`)
pub async fn update_priority(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<PriorityQuery>,
) -> ApiResult<Json<TaskResponse>> {
    require_manage_all_tasks(&caller)?;

    let task = state
        .tasks
        .set_priority(id, query.new_priority)
        .await?
        .ok_or_else(|| task_not_found(id))?;

    tracing::info!(task_id = id, priority = ?query.new_priority, "Task priority changed");

    Ok(Json(task.into()))
}

/// Assign a task to a user (`ADMIN`)
///
/// # Errors
///
/// - `404 Not Found`: Task or user doesn't exist
pub async fn assign_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<AssignQuery>,
) -> ApiResult<Json<TaskResponse>> {
    require_manage_all_tasks(&caller)?;

    load_task(&state, id).await?;
    ensure_user_exists(&state, query.assignee_id).await?;

    let task = state
        .tasks
        .assign_task(id, query.assignee_id)
        .await?
        .ok_or_else(|| task_not_found(id))?;

    tracing::info!(task_id = id, assignee_id = query.assignee_id, "Task assigned");

    Ok(Json(task.into()))
}

/// Change a task's status (`ADMIN` or assignee)
///
/// # Errors
///
/// - `404 Not Found`: Task doesn't exist
/// - `403 Forbidden`: Task is unassigned, or caller is neither admin nor assignee
pub async fn update_status(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<TaskResponse>> {
    let task = state
        .tasks
        .set_status(id, query.new_status, &caller)
        .await
        .map_err(|e| guarded_write_error(e, id, &caller, "Status change"))?
        .ok_or_else(|| task_not_found(id))?;

    tracing::info!(
        task_id = id,
        status = ?query.new_status,
        by = %caller.subject,
        "Task status changed"
    );

    Ok(Json(task.into()))
}

/// Comment on a task (`ADMIN` or assignee)
///
/// # Errors
///
/// - `404 Not Found`: Task doesn't exist
/// - `403 Forbidden`: Task is unassigned, or caller is neither admin nor assignee
/// - `422 Unprocessable Entity`: Blank comment
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<CommentQuery>,
) -> ApiResult<Json<Comment>> {
    if query.comment.trim().is_empty() {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "comment".to_string(),
            message: "Comment cannot be empty".to_string(),
        }]));
    }

    let comment = state
        .tasks
        .add_comment(id, &caller, &query.comment)
        .await
        .map_err(|e| guarded_write_error(e, id, &caller, "Comment"))?;

    tracing::info!(task_id = id, comment_id = comment.id, by = %caller.subject, "Comment added");

    Ok(Json(comment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskdesk_shared::models::task::UserRef;

    fn task(assignee: Option<&str>) -> Task {
        Task {
            id: 3,
            title: "Write docs".to_string(),
            description: None,
            status: Some(TaskStatus::InProgress),
            priority: None,
            author: UserRef {
                id: 1,
                email: "admin@x.com".to_string(),
            },
            assignee: assignee.map(|email| UserRef {
                id: 2,
                email: email.to_string(),
            }),
            comments: vec![Comment {
                id: 1,
                task_id: 3,
                author_email: "admin@x.com".to_string(),
                text: "first".to_string(),
                created_at: Utc::now(),
            }],
        }
    }

    #[test]
    fn test_task_response_shape() {
        let json = serde_json::to_value(TaskResponse::from(task(Some("u@x.com")))).unwrap();

        assert_eq!(json["author"], "admin@x.com");
        assert_eq!(json["assignee"], "u@x.com");
        assert_eq!(json["status"], "IN_PROGRESS");
        assert_eq!(json["comments"], serde_json::json!(["first"]));
        assert!(json.get("description").is_none());
        assert!(json.get("priority").is_none());
    }

    #[test]
    fn test_unassigned_task_has_empty_assignee() {
        let response = TaskResponse::from(task(None));
        assert_eq!(response.assignee, "");
    }

    #[test]
    fn test_page_query_defaults() {
        let request = PageQuery::default().request();
        assert_eq!(request, PageRequest::new(0, 20));

        let request = PageQuery {
            page: Some(2),
            size: Some(1000),
        }
        .request();
        assert_eq!(request.page, 2);
        assert_eq!(request.size, PageRequest::MAX_SIZE);
    }

    #[test]
    fn test_task_request_validation() {
        let ok = TaskRequest {
            title: "t".to_string(),
            description: Some("d".repeat(500)),
            status: None,
            priority: None,
        };
        assert!(ok.validate().is_ok());

        let empty_title = TaskRequest {
            title: String::new(),
            description: None,
            status: None,
            priority: None,
        };
        assert!(empty_title.validate().is_err());

        let long_description = TaskRequest {
            title: "t".to_string(),
            description: Some("d".repeat(501)),
            status: None,
            priority: None,
        };
        assert!(long_description.validate().is_err());
    }
}
