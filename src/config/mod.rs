//! The `config` module loads relay settings from an optional file and the
//! environment, falling back to defaults for anything left unset.

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    BrokerSettings, ForwardSettings, LoggingSettings, Settings, StompSettings,
};

/// Prefix for environment overrides, e.g. `RELAY__BROKER__URL`.
pub const ENV_PREFIX: &str = "RELAY";

/// Loads the configuration from `config/default` and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Loads the configuration from the given file stem and environment variables.
/// The file is optional; any format the `config` crate recognises by extension works.
/// Returns a `Settings` struct merged over the defaults.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
