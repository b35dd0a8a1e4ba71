//! Format adapter layer
//!
//! Adapters convert between a named format's native records and the
//! normalized form; the registry holds them under case-insensitive names.

mod registry;
mod traits;

pub use registry::AdapterRegistry;
pub use traits::{AdapterCapabilities, FormatAdapter};
