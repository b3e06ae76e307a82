pub mod balance_service;
pub mod red_packet_service;

pub use balance_service::*;
pub use red_packet_service::*;
