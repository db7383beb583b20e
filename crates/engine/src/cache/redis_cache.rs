//! Redis cache backend (optional).
//!
//! Keys are written with `SET .. EX` so abandoned jobs age out on their own.
//! A connection is taken per call; the client handles reconnects.

use std::time::Duration;

use redis::Commands;

use super::{CacheError, KeyValueCache};

#[derive(Debug, Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(unavailable)?;
        Ok(Self { client })
    }

    fn connection(&self) -> Result<redis::Connection, CacheError> {
        self.client.get_connection().map_err(unavailable)
    }
}

fn unavailable(err: redis::RedisError) -> CacheError {
    CacheError::Unavailable(err.to_string())
}

impl KeyValueCache for RedisCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection()?;
        conn.get(key).map_err(unavailable)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).map_err(unavailable)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        conn.del::<_, ()>(key).map_err(unavailable)
    }
}
