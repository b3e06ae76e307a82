use super::{CLAIM_TOPIC, ClaimEvent, EventPublisher};
use crate::config::KafkaConfig;
use crate::error::{AppError, AppResult};
use crate::utils::{RetryError, deadline_token, retry_with_backoff};
use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_PUBLISH_ATTEMPTS: u32 = 3;

/// Kafka claim-event producer. Waits for broker acknowledgement before a
/// publish counts as delivered.
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaConfig) -> AppResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()?;
        log::info!("Kafka producer initialized");
        Ok(Self { producer })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, event: &ClaimEvent) -> AppResult<()> {
        let payload = event.encode();
        let partition = event.partition();
        let deadline = deadline_token(&CancellationToken::new(), PUBLISH_TIMEOUT);

        let delivery = retry_with_backoff(&deadline, MAX_PUBLISH_ATTEMPTS, || async {
            let record = FutureRecord::<(), _>::to(CLAIM_TOPIC)
                .partition(partition)
                .payload(&payload);
            self.producer
                .send(record, Timeout::After(PUBLISH_TIMEOUT))
                .await
                .map_err(|(err, _)| err)
        })
        .await;

        match delivery {
            Ok((partition, offset)) => {
                log::info!(
                    "Claim event sent: user={} packet={} amount={:.2} (partition {partition}, offset {offset})",
                    event.user_id,
                    event.packet_id,
                    event.amount
                );
                Ok(())
            }
            Err(RetryError::Cancelled) => Err(AppError::SystemError(
                "claim event publish deadline exceeded".to_string(),
            )),
            Err(RetryError::Exhausted(err)) => Err(err.into()),
        }
    }
}
