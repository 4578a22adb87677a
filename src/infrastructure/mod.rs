pub mod broadcast_publisher;
pub mod clock;
pub mod console_notifier;
pub mod jsonl_inbox;
pub mod memory_store;
pub mod multi_notifier;
pub mod signal_bus;
pub mod sqlite_store;
pub mod static_source;
pub mod telegram_notifier;
