use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{AnalyticsSettings, Config, LoggingSettings};

/// Prefix for environment overrides, e.g. `JOURNAL__ANALYTICS__STARTING_BALANCE=5000`.
pub const ENV_PREFIX: &str = "JOURNAL";

/// Loads the application configuration from `config.toml` in the working
/// directory, if present, layered under `JOURNAL__*` environment variables.
pub fn load_config() -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config.toml").required(false));
    finish(builder, environment())
}

/// Loads the application configuration from an explicit file, which must
/// exist, layered under `JOURNAL__*` environment variables.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder().add_source(config::File::from(path));
    finish(builder, environment())
}

/// `JOURNAL__SECTION__KEY` variables, read from the process environment.
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator("__")
}

fn finish(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    environment: config::Environment,
) -> Result<Config, ConfigError> {
    let settings = builder.add_source(environment).build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = settings.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
