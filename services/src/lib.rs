//! Session lifecycle and attendance verification.
//!
//! Every operation takes the current instant (or a [`clock::Clock`]) from the
//! caller; nothing in this crate owns a timer. Persistence goes through any
//! sea-orm `ConnectionTrait`, so the same calls work on a connection or inside
//! a transaction.

pub mod attendance;
pub mod attendance_report;
pub mod attendance_window;
pub mod beacon_resolution;
pub mod bootstrap;
pub mod check_in_token;
pub mod class_session;
pub mod clock;
pub mod error;
pub mod session_status;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::{AppError, AppResult, RejectReason};
