use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use rand::Rng;
use redis::cluster_async::ClusterConnection;
use redis::Script;
use std::time::Duration;

/// Lease long enough for cache decrement + ledger transaction + event
/// enqueue, short enough that a crashed holder unblocks within seconds.
const LOCK_LEASE: Duration = Duration::from_secs(30);

// Only the holder's token may delete the key; a lease that expired and was
// re-acquired by someone else must not be released by the old holder.
const RELEASE_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    else
        return 0
    end
"#;

pub fn lock_key(packet_id: i64) -> String {
    format!("lock:red_packet_{packet_id}")
}

/// Held lock. Dropping the guard releases it.
pub trait LockGuard: Send {}

/// 分布式互斥: 同一红包同一时刻最多一个持有者, 获取失败立即返回 Busy 不排队。
#[async_trait]
pub trait PacketMutex: Send + Sync {
    async fn acquire(&self, packet_id: i64) -> AppResult<Box<dyn LockGuard>>;
}

/// Lease lock over the Redis cluster: SET NX PX plus compare-and-delete.
#[derive(Clone)]
pub struct RedisMutex {
    conn: ClusterConnection,
}

impl RedisMutex {
    pub fn new(conn: ClusterConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl PacketMutex for RedisMutex {
    async fn acquire(&self, packet_id: i64) -> AppResult<Box<dyn LockGuard>> {
        let key = lock_key(packet_id);
        let token = format!("{:016x}", rand::rng().random::<u64>());
        let mut conn = self.conn.clone();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(LOCK_LEASE.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        match acquired {
            Some(_) => Ok(Box::new(RedisLockGuard {
                conn: self.conn.clone(),
                key,
                token,
            })),
            None => Err(AppError::SystemBusy),
        }
    }
}

struct RedisLockGuard {
    conn: ClusterConnection,
    key: String,
    token: String,
}

impl LockGuard for RedisLockGuard {}

impl Drop for RedisLockGuard {
    fn drop(&mut self) {
        let mut conn = self.conn.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        // Deferred release path; also runs when the pipeline deadline fires.
        // If no runtime is left (process teardown) the lease expires on its own.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let released: Result<i64, _> = Script::new(RELEASE_SCRIPT)
                    .key(&key)
                    .arg(&token)
                    .invoke_async(&mut conn)
                    .await;
                if let Err(e) = released {
                    log::warn!("Failed to release lock {key}: {e}");
                }
            });
        }
    }
}
