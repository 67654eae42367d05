use std::ops::DerefMut;
use std::time::Duration;

use chrono::NaiveDate;
use r2d2_redis::r2d2;
use r2d2_redis::redis::{Commands, RedisError};
use r2d2_redis::RedisConnectionManager;

use crate::models::Menu;

pub(crate) type RedisPool = r2d2::Pool<RedisConnectionManager>;

const CACHE_POOL_MAX_OPEN: u32 = 16;
const CACHE_POOL_MIN_IDLE: u32 = 8;
const CACHE_POOL_EXPIRE_SECONDS: u64 = 60;
const CACHE_CONNECT_TIMEOUT_SECONDS: u64 = 1;
const CURRENT_MENUS_TTL_SECONDS: usize = 300;
const GENERATION_KEY: &str = "menus:generation";

/// Redis cache for the current-menu listing. Every failure is logged and
/// treated as a miss so the store stays the source of truth.
///
/// Listing keys embed a generation counter that every write bumps. A reader
/// that loaded the store before a write therefore caches under a key nobody
/// reads any more.
#[derive(Clone)]
pub(crate) struct MenuCache {
    pool: Option<RedisPool>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Lookup {
    Hit(Vec<Menu>),
    /// Nothing cached; a fresh listing may be stored under this key.
    Miss(String),
    Unavailable,
}

pub(crate) fn current_menus_key(generation: u64, today: NaiveDate) -> String {
    format!("menus:current:{}:{}", generation, today.format("%Y-%m-%d"))
}

impl MenuCache {
    pub(crate) fn disabled() -> Self {
        MenuCache { pool: None }
    }

    /// Builds the pool lazily; an unreachable server only shows up as misses.
    pub(crate) fn connect(redis_url: &str) -> Result<Self, RedisError> {
        let manager = RedisConnectionManager::new(redis_url)?;
        let pool = r2d2::Pool::builder()
            .max_size(CACHE_POOL_MAX_OPEN)
            .max_lifetime(Some(Duration::from_secs(CACHE_POOL_EXPIRE_SECONDS)))
            .min_idle(Some(CACHE_POOL_MIN_IDLE))
            .connection_timeout(Duration::from_secs(CACHE_CONNECT_TIMEOUT_SECONDS))
            .build_unchecked(manager);
        Ok(MenuCache { pool: Some(pool) })
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    /// Reads the current generation, then the listing cached under it.
    pub(crate) fn lookup(&self, today: NaiveDate) -> Lookup {
        let pool = match self.pool.as_ref() {
            Some(pool) => pool,
            None => return Lookup::Unavailable,
        };
        let mut redis_conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!("menu cache unavailable: {}", e);
                return Lookup::Unavailable;
            }
        };
        let redis_conn = redis_conn.deref_mut();

        let generation: Result<Option<u64>, RedisError> = redis_conn.get(GENERATION_KEY);
        let key = match generation {
            Ok(generation) => current_menus_key(generation.unwrap_or(0), today),
            Err(e) => {
                log::warn!("menu cache generation read failed: {}", e);
                return Lookup::Unavailable;
            }
        };

        let value: Result<Vec<u8>, RedisError> = redis_conn.get(key.as_str());
        match value {
            // missing keys come back empty
            Ok(bytes) if bytes.is_empty() => Lookup::Miss(key),
            Ok(bytes) => match Menu::list_from_u8(&bytes) {
                Ok(menus) => Lookup::Hit(menus),
                Err(e) => {
                    log::warn!("discarding undecodable menu cache entry: {}", e);
                    Lookup::Miss(key)
                }
            },
            Err(e) => {
                log::warn!("menu cache read failed: {}", e);
                Lookup::Unavailable
            }
        }
    }

    /// Stores a listing under a key handed out by [`MenuCache::lookup`].
    pub(crate) fn store_current_menus(&self, key: &str, menus: &[Menu]) {
        let pool = match self.pool.as_ref() {
            Some(pool) => pool,
            None => return,
        };
        let bytes = match Menu::list_to_u8(menus) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("could not encode menus for the cache: {}", e);
                return;
            }
        };
        match pool.get() {
            Ok(mut redis_conn) => {
                let redis_conn = redis_conn.deref_mut();
                let result: Result<(), RedisError> =
                    redis_conn.set_ex(key, bytes, CURRENT_MENUS_TTL_SECONDS);
                if let Err(e) = result {
                    log::warn!("menu cache write failed: {}", e);
                }
            }
            Err(e) => log::warn!("menu cache unavailable: {}", e),
        }
    }

    /// Bumps the generation so every listing cached so far goes stale.
    pub(crate) fn invalidate(&self) {
        let pool = match self.pool.as_ref() {
            Some(pool) => pool,
            None => return,
        };
        match pool.get() {
            Ok(mut redis_conn) => {
                let redis_conn = redis_conn.deref_mut();
                let result: Result<u64, RedisError> = redis_conn.incr(GENERATION_KEY, 1);
                match result {
                    Ok(generation) => log::debug!("menu cache generation is now {}", generation),
                    Err(e) => log::warn!("menu cache invalidation failed: {}", e),
                }
            }
            Err(e) => log::warn!("menu cache unavailable: {}", e),
        }
    }
}
