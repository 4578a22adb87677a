pub mod types;
pub mod policy;
pub mod cooldown;
pub mod signal;

pub use types::*;
pub use policy::*;
pub use cooldown::*;
pub use signal::*;
