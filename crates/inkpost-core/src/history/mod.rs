//! Delivery history.
//!
//! One row per send attempt that passed validation, for display and audit.

mod model;
mod repository;

pub use model::{DeliveryRecord, DeliveryStatus, HistoryEntry};
pub use repository::HistoryRepository;
