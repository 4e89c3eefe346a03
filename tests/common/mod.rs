//! Common test utilities for videomax-client integration tests

#[allow(dead_code)]
pub mod backend;
#[allow(dead_code)]
pub mod events;

#[allow(unused_imports)]
pub use backend::*;
#[allow(unused_imports)]
pub use events::*;
