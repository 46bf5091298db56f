//! Video domain core models and types
//!
//! Shared data structures for the video platform services and the
//! moderation pipeline

pub mod constants;
pub mod models;

pub use models::*;
