pub mod lock;

pub use lock::{LockGuard, PacketMutex, RedisMutex};

use crate::config::RedisConfig;
use crate::error::AppResult;
use async_trait::async_trait;
use rand::Rng;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncCommands, Script};
use std::time::Duration;

pub const BLOOM_KEY: &str = "bloom_filter:red_packets";

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Stock counter TTL base and jitter window. Every refill picks a TTL in
/// [600, 660) seconds so a burst of refills does not expire at once.
const STOCK_TTL_BASE_SECS: u64 = 600;
const STOCK_TTL_JITTER_SECS: u64 = 60;

// Atomic read-test-decrement over the stock counter. Sentinels: -2 when the
// key is absent (fall back to the ledger), -1 when the stock is exhausted,
// otherwise the post-decrement count.
const DECREMENT_SCRIPT: &str = r#"
    local stock = redis.call("GET", KEYS[1])
    if not stock then
        return -2
    end
    if tonumber(stock) <= 0 then
        return -1
    else
        redis.call("DECR", KEYS[1])
        return tonumber(stock) - 1
    end
"#;

pub fn stock_key(packet_id: i64) -> String {
    format!("red_packet_{packet_id}")
}

pub fn jittered_ttl() -> Duration {
    let jitter = rand::rng().random_range(0..STOCK_TTL_JITTER_SECS);
    Duration::from_secs(STOCK_TTL_BASE_SECS + jitter)
}

/// Outcome of the atomic stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    /// No counter in the cache, caller must consult the ledger.
    Missing,
    /// Counter present but exhausted.
    Empty,
    /// Decremented; holds the post-decrement count.
    Remaining(i64),
}

impl StockLevel {
    pub fn from_script(value: i64) -> Self {
        match value {
            -2 => StockLevel::Missing,
            -1 => StockLevel::Empty,
            n => StockLevel::Remaining(n),
        }
    }
}

/// 库存缓存。实现方必须保证 decrement_stock 的读-判-减不可分割。
#[async_trait]
pub trait StockCache: Send + Sync {
    /// Conservative admission check: may report true for ids that do not
    /// exist, must never report false for ids that do.
    async fn bloom_contains(&self, packet_id: i64) -> bool;

    async fn decrement_stock(&self, packet_id: i64) -> AppResult<StockLevel>;

    async fn set_stock(&self, packet_id: i64, value: i64, ttl: Duration) -> AppResult<()>;

    /// Rollback primitive, best-effort.
    async fn increment_stock(&self, packet_id: i64) -> AppResult<()>;
}

/// Connect to the Redis cluster, retrying a few times before giving up.
pub async fn connect(config: &RedisConfig) -> AppResult<ClusterConnection> {
    let nodes: Vec<String> = config
        .cluster_nodes
        .iter()
        .map(|n| {
            if n.starts_with("redis://") {
                n.clone()
            } else {
                format!("redis://{n}")
            }
        })
        .collect();

    let mut builder = ClusterClientBuilder::new(nodes);
    if !config.password.is_empty() {
        builder = builder.password(config.password.clone());
    }
    let client = builder.build()?;

    let mut attempt = 1;
    loop {
        let err = match client.get_async_connection().await {
            Ok(mut conn) => match redis::cmd("PING").query_async::<String>(&mut conn).await {
                Ok(_) => {
                    log::info!("Redis cluster connected");
                    return Ok(conn);
                }
                Err(e) => e,
            },
            Err(e) => e,
        };
        log::warn!("Redis connection attempt {attempt} failed: {err}");
        if attempt == CONNECT_ATTEMPTS {
            return Err(err.into());
        }
        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
        attempt += 1;
    }
}

/// Redis-cluster backed stock cache.
#[derive(Clone)]
pub struct RedisCache {
    conn: ClusterConnection,
    decrement: Script,
}

impl RedisCache {
    pub fn new(conn: ClusterConnection) -> Self {
        Self {
            conn,
            decrement: Script::new(DECREMENT_SCRIPT),
        }
    }
}

#[async_trait]
impl StockCache for RedisCache {
    async fn bloom_contains(&self, packet_id: i64) -> bool {
        let mut conn = self.conn.clone();
        match conn.sismember::<_, _, bool>(BLOOM_KEY, packet_id).await {
            Ok(found) => found,
            Err(e) => {
                // Fail open: a transient cache fault costs one ledger lookup,
                // a false reject starves a legitimate request.
                log::warn!("Error checking bloom filter: {e}");
                true
            }
        }
    }

    async fn decrement_stock(&self, packet_id: i64) -> AppResult<StockLevel> {
        let mut conn = self.conn.clone();
        let value: i64 = self
            .decrement
            .key(stock_key(packet_id))
            .invoke_async(&mut conn)
            .await?;
        Ok(StockLevel::from_script(value))
    }

    async fn set_stock(&self, packet_id: i64, value: i64, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(stock_key(packet_id), value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn increment_stock(&self, packet_id: i64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.incr(stock_key(packet_id), 1i64).await?;
        Ok(())
    }
}
