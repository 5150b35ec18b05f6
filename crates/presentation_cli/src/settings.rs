//! Configuration loading
//!
//! Layers, lowest priority first: built-in defaults, `trias.toml` (or the
//! file given with `--config`), then `TRIAS_*` environment variables such
//! as `TRIAS_BASE_URL`, `TRIAS_API_KEY` or `TRIAS_STOPS=de:1,de:2`.

use std::path::Path;

use integration_trias::TriasConfig;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TRIAS";

/// Config file looked up in the working directory when none is given
const DEFAULT_FILE: &str = "trias";

/// Load configuration from file and environment
pub fn load(path: Option<&Path>) -> Result<TriasConfig, config::ConfigError> {
    load_with(path, environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("stops")
}

fn load_with(
    path: Option<&Path>,
    environment: config::Environment,
) -> Result<TriasConfig, config::ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_FILE).required(false),
    };

    let builder = config::Config::builder()
        .set_default("timezone", "Europe/Berlin")?
        .add_source(file)
        .add_source(environment);

    let config = builder.build()?;
    config.try_deserialize()
}
