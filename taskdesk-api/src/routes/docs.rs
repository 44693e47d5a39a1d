/// API documentation endpoint
///
/// `GET /v3/api-docs` lists every endpoint with its access rule. The path is
/// on the default public allow-list, so it is served without authentication
/// even when a bad token is presented.

use axum::Json;
use serde::Serialize;

/// One documented endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointDoc {
    pub method: &'static str,
    pub path: &'static str,
    pub access: &'static str,
    pub summary: &'static str,
}

/// Documentation response
#[derive(Debug, Serialize)]
pub struct ApiDocs {
    pub title: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<EndpointDoc>,
}

const fn endpoint(
    method: &'static str,
    path: &'static str,
    access: &'static str,
    summary: &'static str,
) -> EndpointDoc {
    EndpointDoc {
        method,
        path,
        access,
        summary,
    }
}

const ENDPOINTS: &[EndpointDoc] = &[
    endpoint("POST", "/api/user/register", "public", "Register a user account"),
    endpoint("POST", "/api/user/login", "public", "Exchange credentials for a bearer token"),
    endpoint("POST", "/api/tasks", "ADMIN", "Create a task"),
    endpoint("GET", "/api/tasks", "ADMIN", "List all tasks"),
    endpoint("PUT", "/api/tasks/{id}", "ADMIN", "Update a task"),
    endpoint("DELETE", "/api/tasks/{id}", "ADMIN", "Delete a task"),
    endpoint("GET", "/api/tasks/assignee", "USER, ADMIN", "List tasks by assignee"),
    endpoint("GET", "/api/tasks/author", "USER, ADMIN", "List tasks by author"),
    endpoint("PUT", "/api/tasks/{id}/priority", "ADMIN", "Change task priority"),
    endpoint("PUT", "/api/tasks/{id}/assign", "ADMIN", "Assign a task"),
    endpoint("PUT", "/api/tasks/{id}/status", "assignee, ADMIN", "Change task status"),
    endpoint("POST", "/api/tasks/{id}/comment", "assignee, ADMIN", "Comment on a task"),
    endpoint("GET", "/health", "public", "Health check"),
];

pub async fn api_docs() -> Json<ApiDocs> {
    Json(ApiDocs {
        title: "TaskDesk API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS.to_vec(),
    })
}
