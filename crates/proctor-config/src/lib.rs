//! Configuration loading for proctor
//!
//! Merges an optional `config.*` file with `PROCTOR_*` environment
//! variables into an immutable [`Settings`] snapshot, and hands snapshots
//! out through a reloadable [`ConfigHandle`].

mod handle;
mod settings;

pub use handle::ConfigHandle;
pub use settings::Settings;

// Re-export types that are used in our public API
pub use proctor_types::CredentialMode;
