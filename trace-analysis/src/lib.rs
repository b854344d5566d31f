pub mod bandwidth;
pub mod distribution;
pub mod loader;
pub mod stats;
pub mod trace;

pub use crate::loader::{LoadError, LoadOptions, LoadReport, LoadedTrace, load_trace, read_trace};
pub use crate::trace::{Trace, TraceRecord};
