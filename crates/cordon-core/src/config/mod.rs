//! Environment-backed configuration, split into key names, load helpers,
//! and per-domain schema structs.

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use schema::{
    ExecConfig, ObservabilityConfig, PolicyConfig, ServerConfig, WorkspaceConfig,
};
