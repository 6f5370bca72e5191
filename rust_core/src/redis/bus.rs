use anyhow::{Context, Result};
use redis::aio::Connection;
use redis::{AsyncCommands, Client};
use std::env;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thin wrapper over one shared async Redis connection. Short commands
/// (GET/SET/DEL/LPUSH) go through the shared connection; blocking pops get
/// a dedicated connection via `get_connection` so they cannot starve the
/// cache path.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    connection: Arc<Mutex<Connection>>,
}

impl RedisBus {
    pub async fn new() -> Result<Self> {
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Self::with_url(&redis_url).await
    }

    pub async fn with_url(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Invalid Redis URL")?;
        let connection = client
            .get_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.lock().await;
        conn.get(key).await.context("Redis GET failed")
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection.lock().await;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .context("Redis SETEX failed")
    }

    pub async fn del(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.lock().await;
        conn.del::<_, ()>(keys).await.context("Redis DEL failed")
    }

    pub async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection.lock().await;
        conn.lpush::<_, _, ()>(key, value)
            .await
            .context("Redis LPUSH failed")
    }

    /// Blocking right-pop with a timeout in seconds. Returns `None` when the
    /// timeout elapses with nothing queued. Call this on a dedicated
    /// connection from `get_connection`, never on the shared one.
    pub async fn brpop(
        conn: &mut Connection,
        key: &str,
        timeout_secs: u64,
    ) -> Result<Option<String>> {
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(key)
            .arg(timeout_secs)
            .query_async(conn)
            .await
            .context("Redis BRPOP failed")?;
        Ok(popped.map(|(_, value)| value))
    }

    /// Dedicated connection for blocking consumer loops.
    pub async fn get_connection(&self) -> Result<Connection> {
        self.client
            .get_async_connection()
            .await
            .context("Failed to open dedicated Redis connection")
    }
}
