//! Built-in health checks for configuration and stack consistency

pub mod build_info;
pub mod config;
pub mod key_cache;
pub mod listener_table;
pub mod stack;

pub use build_info::BuildInfoCheck;
pub use config::ConfigCheck;
pub use key_cache::KeyCacheCheck;
pub use listener_table::ListenerTableCheck;
pub use stack::StackCheck;
