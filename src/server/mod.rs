//! HTTP API over the sync and grading engines.

pub mod api;
pub mod app;
pub mod tracing;
