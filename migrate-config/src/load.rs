use std::io;
use std::path::{Path, PathBuf};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use rust_cli_config::{Environment as EnvironmentSource, File};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory, relative to the working directory, holding the migrator configuration.
const CONFIGURATION_DIR: &str = "configuration";

/// Tried in this order for every layer.
const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

const BASE_STEM: &str = "base";

/// Overrides look like `APP_PIPELINE__WORKER_COUNT=8`.
const ENV_PREFIX: &str = "APP";
const ENV_NESTING_SEPARATOR: &str = "__";

/// Implemented by top level configuration structures.
pub trait Config {
    /// Keys whose environment overrides are comma separated lists, e.g. `schema.id_aliases`.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingDirectory(PathBuf),

    #[error("no `{stem}` configuration file in `{directory}` (tried {tried})")]
    MissingBaseFile {
        stem: &'static str,
        directory: PathBuf,
        tried: String,
    },

    #[error("invalid configuration file `{path}`: {source}")]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: rust_cli_config::ConfigError,
    },

    #[error("invalid APP_ENVIRONMENT: {0}")]
    Environment(#[source] io::Error),

    #[error("failed to merge configuration layers: {0}")]
    Merge(#[source] rust_cli_config::ConfigError),

    #[error("configuration does not match the expected shape: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),
}

/// Loads `T` from `./configuration`.
///
/// Layers, later ones winning: `base.*` (required), `{APP_ENVIRONMENT}.*` (optional) and finally
/// `APP_`-prefixed environment variables.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let cwd = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    load_config_from(&cwd.join(CONFIGURATION_DIR))
}

/// Same as [`load_config`] with an explicit configuration directory.
pub fn load_config_from<T>(directory: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingDirectory(directory.to_path_buf()));
    }

    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    let base = locate(directory, BASE_STEM).ok_or_else(|| LoadConfigError::MissingBaseFile {
        stem: BASE_STEM,
        directory: directory.to_path_buf(),
        tried: EXTENSIONS
            .iter()
            .map(|extension| format!("{BASE_STEM}.{extension}"))
            .collect::<Vec<_>>()
            .join(", "),
    })?;
    let mut builder = add_file(rust_cli_config::Config::builder(), &base)?;

    if let Some(overlay) = locate(directory, environment.as_str()) {
        builder = add_file(builder, &overlay)?;
    }

    builder
        .add_source(env_overrides::<T>())
        .build()
        .map_err(LoadConfigError::Merge)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn locate(directory: &Path, stem: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
}

/// Adds `path` and builds once, so a parse error names the file that caused it.
fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, LoadConfigError> {
    let builder = builder.add_source(File::from(path.to_path_buf()));
    builder
        .build_cloned()
        .map_err(|source| LoadConfigError::InvalidFile {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(builder)
}

fn env_overrides<T: Config>() -> EnvironmentSource {
    let mut source = EnvironmentSource::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_NESTING_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        source = source.try_parsing(true).list_separator(",");
        for key in T::LIST_PARSE_KEYS {
            source = source.with_list_parse_key(key);
        }
    }

    source
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Pages {
        page_size: usize,
        #[serde(default)]
        aliases: Vec<String>,
    }

    impl Config for Pages {
        const LIST_PARSE_KEYS: &'static [&'static str] = &["aliases"];
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = load_config_from::<Pages>(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, LoadConfigError::MissingDirectory(_)));
    }

    #[test]
    fn missing_base_file_names_the_tried_files() {
        let dir = tempfile::tempdir().unwrap();

        let err = load_config_from::<Pages>(dir.path()).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("base.yaml"));
        assert!(rendered.contains("base.json"));
    }

    #[test]
    fn base_yaml_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "page_size: 250\naliases: [companyId]\n",
        )
        .unwrap();

        let pages = load_config_from::<Pages>(dir.path()).unwrap();
        assert_eq!(pages.page_size, 250);
        assert_eq!(pages.aliases, vec!["companyId".to_string()]);
    }

    #[test]
    fn broken_file_is_named_in_the_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.json"), "{ not json").unwrap();

        let err = load_config_from::<Pages>(dir.path()).unwrap_err();
        match err {
            LoadConfigError::InvalidFile { path, .. } => assert!(path.ends_with("base.json")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
