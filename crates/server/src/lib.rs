//! Fleet collector
//!
//! Receives snapshots from agents over gRPC, keeps a bounded history of them
//! and serves that history over HTTP. Also serves on-demand log tails.

pub mod config;
pub mod grpc;
pub mod http;
pub mod runtime;

pub use runtime::run;
