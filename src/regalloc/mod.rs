//! Register allocation.
//!
//! This module contains data structures and algorithms used for register allocation.

pub mod liveness;
pub mod liverange;
pub mod register_pool;

mod active_set;
mod context;
mod heap;
mod linear_scan;
mod spilling;
mod value_sets;

pub use self::context::Context;
pub use self::heap::Worklist;
pub use self::linear_scan::Stats;
pub use self::register_pool::RegisterPool;
pub use self::value_sets::ValueSets;
