use crate::cache::{PacketMutex, StockCache, StockLevel, jittered_ttl};
use crate::database::DbPool;
use crate::entities::{
    STATUS_CLOSED, red_packet_entity as packets, red_packet_log_entity as logs,
};
use crate::error::{AppError, AppResult};
use crate::events::{ClaimEvent, EventPublisher};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set, TransactionTrait};
use std::sync::Arc;
use std::time::Duration;

/// Single budget for the whole pipeline; every downstream call runs under it.
const GRAB_TIMEOUT: Duration = Duration::from_secs(5);

/// 抢红包主流程: 布隆准入 → 分布式锁 → 缓存原子扣减 → 账本事务 → 事件投递。
#[derive(Clone)]
pub struct RedPacketService {
    pool: DbPool,
    cache: Arc<dyn StockCache>,
    mutex: Arc<dyn PacketMutex>,
    publisher: Arc<dyn EventPublisher>,
}

impl RedPacketService {
    pub fn new(
        pool: DbPool,
        cache: Arc<dyn StockCache>,
        mutex: Arc<dyn PacketMutex>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            pool,
            cache,
            mutex,
            publisher,
        }
    }

    /// 抢一份红包, 返回领到的金额。
    pub async fn grab(&self, user_id: i64, packet_id: i64) -> AppResult<f64> {
        match tokio::time::timeout(GRAB_TIMEOUT, self.grab_inner(user_id, packet_id)).await {
            Ok(result) => result,
            // 超时后锁随 guard drop 延迟释放
            Err(_) => Err(AppError::SystemError("grab deadline exceeded".to_string())),
        }
    }

    async fn grab_inner(&self, user_id: i64, packet_id: i64) -> AppResult<f64> {
        // 准入: 不存在的 id 在这里挡掉, 防止缓存穿透打到账本
        if !self.cache.bloom_contains(packet_id).await {
            log::info!("Red packet {packet_id} not in bloom filter, rejecting request");
            return Err(AppError::PacketNotFound);
        }

        // 竞争失败立即返回 busy, 不排队
        let _guard = self.mutex.acquire(packet_id).await?;

        match self.cache.decrement_stock(packet_id).await? {
            StockLevel::Empty => return Err(AppError::PacketEmpty),
            StockLevel::Remaining(_) => {}
            StockLevel::Missing => self.refill_stock(packet_id).await?,
        }

        let amount = self.allocate(user_id, packet_id).await?;

        // 账本已落库即可返回; 事件异步投递, 失败只记日志,
        // 流水表是最终事实, 丢事件可离线补账
        let publisher = self.publisher.clone();
        let event = ClaimEvent {
            user_id,
            packet_id,
            amount,
        };
        tokio::spawn(async move {
            if let Err(e) = publisher.publish(&event).await {
                log::warn!(
                    "Failed to publish claim event for user {} packet {}: {e}",
                    event.user_id,
                    event.packet_id
                );
            }
        });

        log::info!("User {user_id} grabbed {amount:.2} from red packet {packet_id}");
        Ok(amount)
    }

    /// 缓存未命中: 回源账本重建库存计数。回填 remaining_count - 1,
    /// 当前这笔在途领取也计入, 避免缓存短暂多出一份库存。
    async fn refill_stock(&self, packet_id: i64) -> AppResult<()> {
        let packet = packets::Entity::find_by_id(packet_id)
            .one(self.pool.reader())
            .await?;
        match packet {
            None => {
                // 空值回填, 同 id 的后续请求直接在缓存层拦下
                if let Err(e) = self.cache.set_stock(packet_id, 0, jittered_ttl()).await {
                    log::warn!("Failed to poison stock for packet {packet_id}: {e}");
                }
                log::info!("Red packet {packet_id} not found in ledger, poisoning cache");
                Err(AppError::PacketNotFound)
            }
            Some(p) if p.remaining_count <= 0 => {
                if let Err(e) = self.cache.set_stock(packet_id, 0, jittered_ttl()).await {
                    log::warn!("Failed to reset stock for packet {packet_id}: {e}");
                }
                Err(AppError::PacketEmpty)
            }
            Some(p) => {
                self.cache
                    .set_stock(packet_id, (p.remaining_count - 1) as i64, jittered_ttl())
                    .await?;
                Ok(())
            }
        }
    }

    /// 主库事务: 复读红包行、按剩余均分、更新余量并追加流水。
    /// 事务内的复读保证看到自己之前的写入。
    async fn allocate(&self, user_id: i64, packet_id: i64) -> AppResult<f64> {
        let txn = self.pool.master().begin().await?;

        let packet = match packets::Entity::find_by_id(packet_id).one(&txn).await? {
            Some(p) => p,
            None => {
                self.rollback_stock(packet_id).await;
                return Err(AppError::PacketNotFound);
            }
        };
        if packet.remaining_count <= 0 {
            self.rollback_stock(packet_id).await;
            return Err(AppError::PacketEmpty);
        }

        // 均分剩余: 最后一个领取者拿走全部残差, 金额守恒不靠浮点凑
        let amount = packet.remaining_amount / packet.remaining_count as f64;
        let closing = packet.remaining_count == 1;
        let remaining_amount = if closing {
            0.0
        } else {
            packet.remaining_amount - amount
        };
        let remaining_count = packet.remaining_count - 1;

        let mut am = packet.into_active_model();
        am.remaining_amount = Set(remaining_amount);
        am.remaining_count = Set(remaining_count);
        if closing {
            am.status = Set(STATUS_CLOSED);
        }
        am.updated_at = Set(Some(Utc::now()));
        if let Err(e) = am.update(&txn).await {
            log::error!("Red packet update failed: {e}");
            self.rollback_stock(packet_id).await;
            return Err(AppError::PersistError);
        }

        let now = Utc::now();
        let log_row = logs::ActiveModel {
            user_id: Set(user_id),
            red_packet_id: Set(packet_id),
            amount: Set(amount),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        };
        if let Err(e) = log_row.insert(&txn).await {
            log::error!("Failed to log red packet grab: {e}");
            self.rollback_stock(packet_id).await;
            return Err(AppError::PersistError);
        }

        if let Err(e) = txn.commit().await {
            log::error!("Grab transaction failed: {e}");
            self.rollback_stock(packet_id).await;
            return Err(AppError::PersistError);
        }

        Ok(amount)
    }

    /// 缓存回滚尽力而为; 失败只记日志, TTL 过期回源后自然修正。
    async fn rollback_stock(&self, packet_id: i64) {
        if let Err(e) = self.cache.increment_stock(packet_id).await {
            log::warn!("Failed to roll back stock for packet {packet_id}: {e}");
        }
    }
}
