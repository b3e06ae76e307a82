use crate::database::DbPool;
use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::events::ClaimEvent;
use crate::utils::{RetryError, retry_with_backoff};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use tokio_util::sync::CancellationToken;

pub const MAX_CREDIT_ATTEMPTS: u32 = 3;

/// Result of one credit attempt chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CreditOutcome {
    /// Balance updated; holds the balance after the credit.
    Applied(f64),
    /// User row absent. Terminal, never retried.
    UserMissing,
}

/// 余额对账服务。用户余额只在这里修改, 抢红包主流程不碰它。
#[derive(Clone)]
pub struct BalanceService {
    pool: DbPool,
}

impl BalanceService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn credit(&self, user_id: i64, packet_id: i64, amount: f64) -> AppResult<f64> {
        let user = users::Entity::find_by_id(user_id)
            .one(self.pool.master())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))?;

        let new_balance = user.balance + amount;
        let mut am = user.into_active_model();
        am.balance = Set(new_balance);
        am.updated_at = Set(Some(Utc::now()));
        am.update(self.pool.master()).await?;

        log::info!(
            "User {user_id} credited {amount:.2} from red packet {packet_id}, balance now {new_balance:.2}"
        );
        Ok(new_balance)
    }

    /// Credit with bounded backoff under the caller's deadline. A missing
    /// user short-circuits as `UserMissing` instead of burning retries.
    pub async fn credit_with_retry(
        &self,
        cancel: &CancellationToken,
        event: &ClaimEvent,
    ) -> Result<CreditOutcome, RetryError<AppError>> {
        retry_with_backoff(cancel, MAX_CREDIT_ATTEMPTS, || async {
            match self
                .credit(event.user_id, event.packet_id, event.amount)
                .await
            {
                Ok(balance) => Ok(CreditOutcome::Applied(balance)),
                Err(AppError::NotFound(msg)) => {
                    log::error!("Dropping claim event: {msg}");
                    Ok(CreditOutcome::UserMissing)
                }
                Err(e) => Err(e),
            }
        })
        .await
    }
}
