pub mod config;
pub mod receiver;
pub mod sender;
