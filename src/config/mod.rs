//! Configuration files
//!
//! - **monitors**: the compositor's `monitor=` DSL (parse + generate)
//! - **workspaces**: the `workspace=` DSL
//! - **settings**: application settings (JSON)
//! - **backup**: timestamped bundles of all of the above

pub mod backup;
pub mod monitors;
pub mod settings;
pub mod workspaces;

pub use settings::Settings;
