use super::{CLAIM_TOPIC, ClaimEvent};
use crate::config::KafkaConfig;
use crate::error::{AppError, AppResult};
use crate::services::{BalanceService, CreditOutcome};
use crate::utils::{RetryError, deadline_token};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message, Offset, TopicPartitionList};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-event processing budget, shared by every retry attempt.
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

fn consumer_config(config: &KafkaConfig) -> ClientConfig {
    let mut cfg = ClientConfig::new();
    cfg.set("bootstrap.servers", config.brokers.join(","))
        .set("group.id", "red_packet_reconciler")
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "latest");
    cfg
}

/// 对账消费者: 每个分区一个任务, 分区内串行保序, 分区间并行。
/// 每次启动从最新 offset 开始消费, 停机期间的事件由离线补账兜底。
pub async fn run_reconcile_consumer(
    config: &KafkaConfig,
    balance: BalanceService,
    shutdown: CancellationToken,
) -> AppResult<()> {
    let probe: StreamConsumer = consumer_config(config).create()?;
    let metadata = probe.fetch_metadata(Some(CLAIM_TOPIC), METADATA_TIMEOUT)?;
    let partitions: Vec<i32> = metadata
        .topics()
        .iter()
        .find(|t| t.name() == CLAIM_TOPIC)
        .map(|t| t.partitions().iter().map(|p| p.id()).collect())
        .unwrap_or_default();
    if partitions.is_empty() {
        return Err(AppError::SystemError(format!(
            "topic {CLAIM_TOPIC} has no partitions"
        )));
    }
    log::info!(
        "Consuming {} partitions of {CLAIM_TOPIC} from newest offset",
        partitions.len()
    );

    let mut handles = Vec::new();
    for partition in partitions {
        let consumer: StreamConsumer = consumer_config(config).create()?;
        let mut assignment = TopicPartitionList::new();
        assignment.add_partition_offset(CLAIM_TOPIC, partition, Offset::End)?;
        consumer.assign(&assignment)?;

        let balance = balance.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            consume_partition(consumer, partition, balance, shutdown).await;
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

async fn consume_partition(
    consumer: StreamConsumer,
    partition: i32,
    balance: BalanceService,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("Partition {partition} consumer shutting down");
                return;
            }
            received = consumer.recv() => match received {
                Err(e) => log::error!("Partition {partition} receive error: {e}"),
                Ok(message) => {
                    let raw = message
                        .payload()
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .unwrap_or_default();
                    apply_message(&balance, &shutdown, &raw).await;
                }
            }
        }
    }
}

/// 单条事件: 格式坏的直接丢弃, 余额更新带超时与退避重试;
/// 重试耗尽也丢弃 (at-least-once 语义, 账本流水兜底)。
pub async fn apply_message(balance: &BalanceService, shutdown: &CancellationToken, raw: &str) {
    let Some(event) = ClaimEvent::parse(raw) else {
        log::warn!("Dropping malformed claim event: {raw:?}");
        return;
    };

    let deadline = deadline_token(shutdown, EVENT_TIMEOUT);
    match balance.credit_with_retry(&deadline, &event).await {
        Ok(CreditOutcome::Applied(_)) => {}
        Ok(CreditOutcome::UserMissing) => {}
        Err(RetryError::Cancelled) => log::error!(
            "Balance update for user {} cancelled (deadline or shutdown)",
            event.user_id
        ),
        Err(RetryError::Exhausted(e)) => log::error!(
            "Balance update for user {} failed after retries: {e}",
            event.user_id
        ),
    }
}
