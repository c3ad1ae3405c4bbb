//! Redis-backed [`KvStore`].

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};

use crate::application::gateways::{KvError, KvStore};
use crate::infra::error::InfraError;

#[derive(Clone)]
pub struct RedisKvStore {
    manager: ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(url: &str) -> Result<Self, InfraError> {
        let client = Client::open(url)
            .map_err(|err| InfraError::cache(format!("invalid redis url: {err}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| InfraError::cache(format!("redis connection failed: {err}")))?;
        Ok(Self { manager })
    }

    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Handle to the shared multiplexed connection.
    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

pub(crate) fn map_redis_error(err: RedisError) -> KvError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        KvError::Unavailable(err.to_string())
    } else {
        KvError::Command(err.to_string())
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(map_redis_error)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds.max(1))
            .await
            .map_err(map_redis_error)
    }

    async fn incr(&self, key: &str) -> Result<u64, KvError> {
        let mut conn = self.manager.clone();
        conn.incr(key, 1_u64).await.map_err(map_redis_error)
    }
}
