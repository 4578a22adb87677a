pub mod dispatch_signal;
pub mod run_once;

pub use dispatch_signal::DispatchSignalUseCase;
pub use run_once::{RunOnceUseCase, RunSummary};
