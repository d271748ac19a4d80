//! Gridload - load generation for the map objects of a distributed data grid
//!
//! Registered map runners each drive a test loop that spreads work over
//! parallel partitions, one remote map per partition, and publish progress
//! through a single-writer status gatherer.

pub mod config;
pub mod error;
pub mod id;
pub mod naming;
pub mod runner;
pub mod status;
pub mod store;

pub use error::{GridloadError, Result};
