pub mod consumer;
pub mod producer;

pub use consumer::run_reconcile_consumer;
pub use producer::KafkaPublisher;

use crate::error::AppResult;
use async_trait::async_trait;

pub const CLAIM_TOPIC: &str = "red_packet_transactions";

/// Topic partition count. Events for one user always land in the same
/// partition so balance updates stay ordered per user.
pub const PARTITION_COUNT: i64 = 5;

/// One successful grab, as carried on the wire:
/// `"<user_id>,<red_packet_id>,<amount with two decimals>"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimEvent {
    pub user_id: i64,
    pub packet_id: i64,
    pub amount: f64,
}

impl ClaimEvent {
    pub fn partition(&self) -> i32 {
        self.user_id.rem_euclid(PARTITION_COUNT) as i32
    }

    pub fn encode(&self) -> String {
        format!("{},{},{:.2}", self.user_id, self.packet_id, self.amount)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split(',').collect();
        if parts.len() != 3 {
            return None;
        }
        Some(Self {
            user_id: parts[0].trim().parse().ok()?,
            packet_id: parts[1].trim().parse().ok()?,
            amount: parts[2].trim().parse().ok()?,
        })
    }
}

/// 事件发布端。抢红包主流程只管投递, 不等确认 (fire-and-forget)。
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ClaimEvent) -> AppResult<()>;
}
