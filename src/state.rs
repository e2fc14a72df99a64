use crate::db::{DbPool, OrmConn};

/// Shared handler state: the sqlx pool for raw statements and the
/// SeaORM connection for entity CRUD, both over the same database.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn) -> Self {
        Self { pool, orm }
    }
}
