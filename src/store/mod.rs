//! Remote map access for gridload.
//!
//! - `MapStore` / `MapHandle`: the capabilities the test loop consumes
//! - `InMemoryMapStore`: in-process backend for dry runs and tests

mod memory;
mod traits;

pub use memory::{CallCounts, Faults, InMemoryMapStore};
pub use traits::{MapHandle, MapStore};
