//! cadkit — core domain for a multi-agent CAD environment.
//!
//! The primary interface is the `cadkit-cli` binary, which exposes this
//! library's [`dispatch::Dispatcher`] over a JSON-RPC 2.0 transport.
//! CLI-specific plumbing (stdio framing, `clap` subcommands) lives there;
//! everything a consumer needs to embed the core directly — the entity
//! store, constraint graph, workspace branch/merge engine, and multi-agent
//! controller — lives here.

pub mod agent;
pub mod config;
pub mod constraint;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod ids;
pub mod store;
pub mod time;
pub mod workspace;

pub use error::{CoreError, ErrorCode};
