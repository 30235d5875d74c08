//! Shared helpers for `PostgreSQL` end-to-end tests.
//!
//! All tests share one pool and one schema, so they serialise on
//! [`DB_LOCK`] and truncate the tables before running.

use chrono::{DateTime, Local, TimeZone, Utc};
use conveyor::archive::adapters::postgres::PostgresArchiveRepository;
use conveyor::queue::adapters::postgres::{PostgresQueueRepository, QueuePgPool};
use diesel::PgConnection;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::Clock;
use once_cell::sync::Lazy;

const UP_SQL: &str =
    include_str!("../../migrations/2026-08-01-000000_create_queue_and_archive/up.sql");
const DOWN_SQL: &str =
    include_str!("../../migrations/2026-08-01-000000_create_queue_and_archive/down.sql");

/// Serialises tests that observe global queue state.
pub static DB_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

static POOL: Lazy<QueuePgPool> = Lazy::new(|| {
    let url = std::env::var("CONVEYOR_TEST_DATABASE_URL")
        .expect("CONVEYOR_TEST_DATABASE_URL must point at a scratch database");
    let pool = Pool::builder()
        .max_size(4)
        .build(ConnectionManager::<PgConnection>::new(url))
        .expect("connection pool builds");
    let mut connection = pool.get().expect("connection available");
    // A failed drop just means the schema was never created.
    let _ = connection.batch_execute(DOWN_SQL);
    connection.batch_execute(UP_SQL).expect("schema setup succeeds");
    drop(connection);
    pool
});

/// Empties all tables so a test starts from a clean queue.
pub fn truncate_tables() {
    let mut connection = POOL.get().expect("connection available");
    connection
        .batch_execute("TRUNCATE task_queue, task_characteristics, task_activity")
        .expect("truncate succeeds");
}

/// Queue repository over the shared pool.
pub fn queue_repository() -> PostgresQueueRepository {
    PostgresQueueRepository::new(POOL.clone())
}

/// Archive repository over the shared pool.
pub fn archive_repository() -> PostgresArchiveRepository {
    PostgresArchiveRepository::new(POOL.clone())
}

/// Clock pinned to a configurable instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock reading `secs` seconds after the epoch.
    pub fn at(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().expect("valid timestamp"))
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}
