//! # TaskDesk Shared Library
//!
//! Authentication/authorization core, domain models and storage used by the
//! TaskDesk API server.
//!
//! ## Module Organization
//!
//! - `auth`: Token codec, credential hashing, identity resolution, request
//!   authentication and the task access policy
//! - `models`: Users, identities, tasks, comments and pagination
//! - `store`: Identity and task store contracts with in-memory and
//!   PostgreSQL backends
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod store;

