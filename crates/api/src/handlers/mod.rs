//! Request handlers.
//!
//! Each submodule provides the async handler functions for one area of the
//! HTTP surface. Read handlers evaluate a fresh tracker snapshot per request.

pub mod arrivals;
pub mod dashboard;
pub mod metrics;
pub mod status;
