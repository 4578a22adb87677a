pub mod cooldown_manager;
pub mod ports;
pub mod usecases;

pub use cooldown_manager::SignalCooldownManager;
pub use ports::*;
