pub mod checksum;
pub mod commands;
pub mod frame;

pub use frame::Frame;
