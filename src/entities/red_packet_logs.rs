use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// 抢红包流水, 仅追加。对任意红包满足守恒:
/// Σ amount + remaining_amount = total_amount。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "red_packet_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub red_packet_id: i64,
    pub amount: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
