//! Redis-backed store over a multiplexed async connection.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};

use crate::config::KvConfig;
use crate::kv::{KvError, KvOp, KvReply, KvStore, Pipeline};

/// Redis client. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct RedisKv {
    conn: MultiplexedConnection,
    command_timeout: Duration,
}

impl RedisKv {
    /// Open a connection to `config.url`.
    pub async fn connect(config: &KvConfig) -> Result<Self, KvError> {
        let command_timeout = Duration::from_millis(config.command_timeout_ms);
        let client = redis::Client::open(config.url.as_str())?;
        let conn = tokio::time::timeout(command_timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| KvError::Timeout(command_timeout))??;

        tracing::info!(url = %config.url, "Connected to redis");
        Ok(Self {
            conn,
            command_timeout,
        })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, KvError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        tokio::time::timeout(self.command_timeout, fut)
            .await
            .map_err(|_| KvError::Timeout(self.command_timeout))?
            .map_err(KvError::from)
    }
}

/// Redis expiry is whole seconds; round sub-second TTLs up.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                self.bounded(conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)))
                    .await
            }
            None => self.bounded(conn.set::<_, _, ()>(key, value)).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    /// Send the whole pipeline in one round trip.
    ///
    /// The server runs every queued command; the first error reply fails the
    /// whole call.
    async fn execute(&self, pipeline: &Pipeline) -> Result<Vec<KvReply>, KvError> {
        if pipeline.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for op in pipeline.ops() {
            match op {
                KvOp::Set {
                    key,
                    value,
                    ttl: Some(ttl),
                } => {
                    pipe.set_ex(key, value, ttl_secs(*ttl));
                }
                KvOp::Set {
                    key,
                    value,
                    ttl: None,
                } => {
                    pipe.set(key, value);
                }
                KvOp::Get { key } => {
                    pipe.get(key);
                }
            }
        }

        let mut conn = self.conn.clone();
        let values: Vec<redis::Value> = self.bounded(pipe.query_async(&mut conn)).await?;

        pipeline
            .ops()
            .iter()
            .zip(values.iter())
            .map(|(op, value)| -> Result<KvReply, KvError> {
                match op {
                    KvOp::Set { .. } => Ok(KvReply::Ok),
                    KvOp::Get { .. } => Ok(KvReply::Value(redis::from_redis_value(value)?)),
                }
            })
            .collect()
    }
}
