pub mod common;
pub mod red_packet;

pub use common::*;
pub use red_packet::*;
