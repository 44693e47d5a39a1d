/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `docs`: Endpoint listing
/// - `user`: Registration and login
/// - `tasks`: Task management, assignment, status and comments

pub mod docs;
pub mod health;
pub mod tasks;
pub mod user;
