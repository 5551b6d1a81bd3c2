pub mod common;
pub(crate) mod cutils;
pub mod log;
pub mod manager;
mod sigwatch;
pub mod system;
#[cfg(test)]
mod testing;

pub use crate::common::{Config, Error, QueueKind, DEFAULT_CAPACITY};
pub use crate::log::DispatchLogger;
pub use crate::manager::{
    queue::{LockFreeQueue, LockedQueue, SignalQueue},
    ProcessingState, SignalManager, StopHandle,
};
pub use crate::system::{
    interface::{ProcessId, UserId},
    kill, raise_process,
    signal::{consts, is_manageable, signal_name, SignalInfo, SignalNumber, SignalSet},
};

pub use crate::sigwatch::main as sigwatch_main;
