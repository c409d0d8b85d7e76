pub mod adapters;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod web;
