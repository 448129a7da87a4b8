//! docmodel - typed, versioned document models over a partitioned document store
//!
//! Layers, leaves first:
//! - `model`: document shapes and the explicit decode step
//! - `iter`: pull-based async iteration and paging
//! - `store`: the container boundary (HTTP and in-memory)
//! - `client`: generic, versioned and TTL-aware clients
//! - `pagination`: cursor pages over id-bearing documents

pub mod cli;
pub mod client;
pub mod config;
pub mod iter;
pub mod model;
pub mod observability;
pub mod pagination;
pub mod store;
