use actix_web::web;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::{CircuitBreaker, Config, StateMachine};

use crate::error::{trips_breaker, AppError};

pub(crate) type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub(crate) type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

/// How long a connection waits on another writer's lock before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

pub(crate) fn build_pool(database_url: &str, max_size: u32) -> Result<DbPool, AppError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: BUSY_TIMEOUT_MS,
        }))
        .build(manager)?;
    Ok(pool)
}

/// Database access guarded by a circuit breaker. Every call runs on the
/// blocking thread pool.
#[derive(Clone)]
pub(crate) struct Store {
    pool: DbPool,
    breaker: CircuitBreakerType,
}

impl Store {
    pub(crate) fn new(pool: DbPool) -> Self {
        Store {
            pool,
            breaker: Config::new().build(),
        }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) async fn run<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&SqliteConnection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        web::block(move || store.call(f)).await?
    }

    fn call<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&SqliteConnection) -> Result<T, AppError>,
    {
        let result = self.breaker.call_with(trips_breaker, || {
            let conn = self.pool.get()?;
            f(&conn)
        });
        match result {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                //rejected which means the store is not responsive
                log::warn!("circuit breaker rejected a store call");
                Err(AppError::Unavailable)
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_store() -> Store {
    // a single connection so every checkout sees the same in-memory database
    let pool = build_pool(":memory:", 1).unwrap();
    crate::migrations::run_migrations(&pool.get().unwrap()).unwrap();
    Store::new(pool)
}
