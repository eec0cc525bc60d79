use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::{Environment, UnknownEnvironment};

/// Default configuration directory, relative to the working directory.
const DEFAULT_CONFIG_DIR: &str = "configuration";

/// Overrides the configuration directory.
pub const CONFIG_DIR_VAR: &str = "FIELDSYNC_CONFIG_DIR";

/// Prefix of variables that override individual keys, e.g. `FIELDSYNC_SYNC__PAGE_SIZE`.
const OVERRIDE_PREFIX: &str = "FIELDSYNC";

const LAYER_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Implemented by configuration roots that can be loaded with [`load_config`].
pub trait Config {
    /// Dotted keys whose override variables hold comma-separated lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("configuration directory `{}` not found", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("no `{layer}` layer in `{}` (looked for .yaml, .yml and .json)", dir.display())]
    LayerNotFound { layer: String, dir: PathBuf },

    #[error("invalid `{}`: {source}", path.display())]
    InvalidLayer {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("configuration does not match the expected shape: {0}")]
    Shape(#[source] config::ConfigError),

    #[error(transparent)]
    Environment(#[from] UnknownEnvironment),

    #[error("could not resolve the working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}

/// Loads `base` and the environment overlay, then applies `FIELDSYNC_` variables.
///
/// The directory is [`CONFIG_DIR_VAR`] when set, otherwise `./configuration`.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let dir = match std::env::var_os(CONFIG_DIR_VAR) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()
            .map_err(LoadConfigError::WorkingDirectory)?
            .join(DEFAULT_CONFIG_DIR),
    };

    load_config_from(&dir, Environment::from_env()?)
}

/// Loads configuration layers from `dir` for `environment`.
pub fn load_config_from<T>(dir: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !dir.is_dir() {
        return Err(LoadConfigError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut builder = config::Config::builder();
    for layer in ["base", environment.as_str()] {
        let path = locate_layer(dir, layer)?;
        // Parse each file on its own so a syntax error names the file.
        config::Config::builder()
            .add_source(config::File::from(path.as_path()))
            .build()
            .map_err(|source| LoadConfigError::InvalidLayer {
                path: path.clone(),
                source,
            })?;
        builder = builder.add_source(config::File::from(path));
    }

    builder
        .add_source(overrides::<T>())
        .build()
        .and_then(|settings| settings.try_deserialize())
        .map_err(LoadConfigError::Shape)
}

fn locate_layer(dir: &Path, layer: &str) -> Result<PathBuf, LoadConfigError> {
    LAYER_EXTENSIONS
        .iter()
        .map(|extension| dir.join(format!("{layer}.{extension}")))
        .find(|path| path.is_file())
        .ok_or_else(|| LoadConfigError::LayerNotFound {
            layer: layer.to_string(),
            dir: dir.to_path_buf(),
        })
}

fn overrides<T: Config>() -> config::Environment {
    let source = config::Environment::with_prefix(OVERRIDE_PREFIX)
        .prefix_separator("_")
        .separator("__");

    if T::LIST_PARSE_KEYS.is_empty() {
        return source;
    }

    T::LIST_PARSE_KEYS.iter().fold(
        source.try_parsing(true).list_separator(","),
        |source, key| source.with_list_parse_key(key),
    )
}
