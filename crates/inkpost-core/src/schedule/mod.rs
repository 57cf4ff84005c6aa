//! Scheduled sends.
//!
//! Rows move `pending -> processing -> sent | failed`, or `pending -> cancelled`.
//! Claiming is a conditional update, so two workers never process the same row.

mod model;
mod repository;

pub use model::{ScheduleStatus, ScheduledEmail};
pub use repository::ScheduleRepository;
