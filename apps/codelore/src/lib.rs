//! # codelore application library
//!
//! Everything the `codelore` binary does, exposed as a library so the
//! integration tests can drive the router and CLI plumbing directly.

pub mod api;
pub mod cli;
