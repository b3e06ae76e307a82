pub mod red_packet;

pub use red_packet::red_packet_config;
