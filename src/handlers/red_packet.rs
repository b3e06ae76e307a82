use crate::models::{GrabQuery, GrabResponse};
use crate::services::RedPacketService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/grab",
    tag = "red_packet",
    params(GrabQuery),
    responses(
        (status = 200, description = "抢到红包", body = GrabResponse),
        (status = 404, description = "红包不存在"),
        (status = 410, description = "红包已抢完"),
        (status = 503, description = "系统繁忙, 稍后重试")
    )
)]
pub async fn grab(
    red_packet_service: web::Data<RedPacketService>,
    query: web::Query<GrabQuery>,
) -> Result<HttpResponse> {
    match red_packet_service
        .grab(query.user_id, query.red_packet_id)
        .await
    {
        Ok(amount) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": GrabResponse { amount }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Red packet service is running" }))
}

pub fn red_packet_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health))
        .route("/grab", web::get().to(grab));
}
