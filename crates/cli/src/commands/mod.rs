//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use contracts::ServiceConfig;
use tracing::info;

use crate::error::{CliError, Result};

/// Load configuration from `path`, or fall back to built-in defaults
pub(crate) fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let Some(path) = path else {
        info!("No configuration file given, using built-in defaults");
        return Ok(ServiceConfig::default());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }

    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config(path.display().to_string(), e))
}
