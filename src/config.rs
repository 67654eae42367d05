use crate::error::AppError;

const DEFAULT_DATABASE_URL: &str = "menu.sqlite3";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_POOL_SIZE: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub db_pool_size: u32,
}

impl Config {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick
    /// up a `.env` file.
    pub(crate) fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT must be a port number, got {:?}", raw)))?,
            None => DEFAULT_PORT,
        };
        let db_pool_size = match get("DB_POOL_SIZE") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(AppError::Config(format!(
                        "DB_POOL_SIZE must be a positive integer, got {:?}",
                        raw
                    )))
                }
            },
            None => DEFAULT_DB_POOL_SIZE,
        };

        Ok(Config {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            redis_url: get("REDIS_URL"),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            port,
            db_pool_size,
        })
    }
}
