/// Database layer
///
/// - `pool`: PostgreSQL connection pool with health check
/// - `migrations`: Embedded schema migrations
///
/// Row mapping lives in [`crate::store::postgres`].

pub mod migrations;
pub mod pool;
