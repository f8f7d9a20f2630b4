pub mod ambient;
pub mod selector;
pub mod session;
