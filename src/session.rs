// src/session.rs

pub mod clock;
pub mod context;
pub mod monitor;
pub mod presentation;
pub mod supervisor;
pub mod watchdog;

pub use clock::{Acknowledgement, Clock, LocalClock, ManualClock, SessionClock, SessionState};
pub use context::{SessionContext, SessionSettings};
pub use supervisor::SessionSupervisor;
