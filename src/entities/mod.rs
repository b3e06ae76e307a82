pub mod red_packet_logs;
pub mod red_packets;
pub mod users;

pub use red_packet_logs as red_packet_log_entity;
pub use red_packets as red_packet_entity;
pub use users as user_entity;

pub use red_packets::{STATUS_ACTIVE, STATUS_CLOSED};
