use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct GrabQuery {
    /// 抢红包的用户 id
    pub user_id: i64,
    /// 红包 id
    pub red_packet_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GrabResponse {
    /// 本次领到的金额
    pub amount: f64,
}
