use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("red packet does not exist")]
    PacketNotFound,

    #[error("red packet is empty")]
    PacketEmpty,

    #[error("system is busy, please try again later")]
    SystemBusy,

    #[error("red packet persist failed")]
    PersistError,

    #[error("system error: {0}")]
    SystemError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Cache error: {0}")]
    CacheError(#[from] redis::RedisError),

    #[error("Event bus error: {0}")]
    EventBusError(#[from] rdkafka::error::KafkaError),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code, message) = match self {
            AppError::PacketNotFound => (
                actix_web::http::StatusCode::NOT_FOUND,
                "PACKET_NOT_FOUND",
                self.to_string(),
            ),
            AppError::PacketEmpty => (
                actix_web::http::StatusCode::GONE,
                "PACKET_EMPTY",
                self.to_string(),
            ),
            AppError::SystemBusy => {
                log::warn!("Lock contention, rejecting request");
                (
                    actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                    "SYSTEM_BUSY",
                    self.to_string(),
                )
            }
            AppError::PersistError => {
                log::error!("Ledger transaction rolled back");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSIST_ERROR",
                    self.to_string(),
                )
            }
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
            ),
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "SYSTEM_ERROR",
                    "system error".to_string(),
                )
            }
            AppError::CacheError(err) => {
                log::error!("Redis error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "SYSTEM_ERROR",
                    "system error".to_string(),
                )
            }
            AppError::EventBusError(err) => {
                log::error!("Kafka error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "SYSTEM_ERROR",
                    "system error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "SYSTEM_ERROR",
                    "system error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_grab_error_status_codes() {
        assert_eq!(
            AppError::PacketNotFound.error_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::PacketEmpty.error_response().status(),
            StatusCode::GONE
        );
        assert_eq!(
            AppError::SystemBusy.error_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::PersistError.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::SystemError("deadline exceeded".into())
                .error_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_internal_details_do_not_leak() {
        let err = AppError::DatabaseError(sea_orm::DbErr::Custom(
            "SELECT * FROM red_packets blew up".into(),
        ));
        let resp = err.error_response();
        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("SELECT"));
        assert!(text.contains("SYSTEM_ERROR"));
    }
}
