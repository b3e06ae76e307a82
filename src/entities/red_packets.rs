use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

pub const STATUS_ACTIVE: i32 = 1;
pub const STATUS_CLOSED: i32 = 0;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "red_packets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub total_amount: f64,
    pub remaining_amount: f64,
    pub total_count: i32,
    pub remaining_count: i32,
    pub status: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
