//! Configuration structures for minerva-watch.
//!
//! Configuration is loaded in two phases:
//!
//! 1. [`FileConfig`] mirrors the JSON file one-to-one. Every field is optional
//!    so that missing required fields can be reported by name instead of as a
//!    generic parse failure.
//! 2. [`Config::resolve`] applies defaults, resolves relative paths against
//!    the directory containing the configuration file, and validates the
//!    result into a [`Config`] made of:
//!
//! - [`WatchConfig`] - what to watch and how long to wait for quiescence
//! - [`ComposeConfig`] - the base invocation and working directory for stages
//! - [`StageCommands`] - the per-stage argument lists
//!
//! # Examples
//!
//! ```
//! use mw_core::FileConfig;
//!
//! let file = FileConfig::from_json(r#"{
//!     "workspacePath": "docs",
//!     "extractorCommand": ["extract"],
//!     "indexCommand": ["index"]
//! }"#).unwrap();
//! assert_eq!(file.extractor_command.as_deref(), Some(&["extract".to_owned()][..]));
//! ```

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default quiescence window before a pipeline run is requested.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Default logical service the stages run against.
pub const DEFAULT_SERVICE_NAME: &str = "minerva";

/// Default base invocation prefixed to every stage.
pub const DEFAULT_COMPOSE_COMMAND: &[&str] = &["docker", "compose"];

/// Default extension allow-list.
pub const DEFAULT_INCLUDE_EXTENSIONS: &[&str] = &[".md", ".mdx"];

/// Default ignore patterns (gitignore syntax, relative to the workspace root).
pub const DEFAULT_IGNORE_GLOBS: &[&str] = &[
    ".git/",
    ".hg/",
    ".svn/",
    "node_modules/",
    ".venv/",
    "__pycache__/",
    ".cache/",
];

/// Raw configuration file contents.
///
/// Field names follow the camelCase keys of the JSON file. Unknown keys are
/// rejected so that typos do not silently fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    /// Root directory to watch (absolute or config-relative).
    pub workspace_path: Option<Utf8PathBuf>,

    /// Working directory for stage execution.
    pub compose_directory: Option<Utf8PathBuf>,

    /// Base invocation prefixed to every stage.
    pub compose_command: Option<Vec<String>>,

    /// Logical service name passed to the base invocation.
    pub service_name: Option<String>,

    /// Stage 1 arguments.
    pub extractor_command: Option<Vec<String>>,

    /// Stage 2 arguments; absent means the stage is skipped.
    pub validate_command: Option<Vec<String>>,

    /// Stage 3 arguments.
    pub index_command: Option<Vec<String>>,

    /// Quiescence window in milliseconds.
    pub debounce_ms: Option<u64>,

    /// Extension allow-list; empty means match all.
    pub include_extensions: Option<Vec<String>>,

    /// Ignore patterns: gitignore globs or `regex:`-prefixed expressions.
    pub ignore_globs: Option<Vec<String>>,

    /// Log every accepted change at info level.
    pub log_changed_files: Option<bool>,
}

impl FileConfig {
    /// Parses configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    pub fn read(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&contents)
    }
}

/// Configuration for change detection and debouncing.
///
/// # Examples
///
/// ```
/// use mw_core::WatchConfig;
///
/// let config = WatchConfig::new("/srv/docs");
/// assert_eq!(config.debounce_ms, 2000);
/// assert_eq!(config.include_extensions, vec![".md", ".mdx"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Absolute root directory being watched.
    pub root: Utf8PathBuf,

    /// Quiescence window in milliseconds.
    pub debounce_ms: u64,

    /// Normalized extensions (lowercase, leading dot). Empty accepts all.
    pub include_extensions: Vec<String>,

    /// Path-level exclusions applied by the watcher.
    pub ignore_globs: Vec<String>,

    /// Whether accepted changes are logged individually at info level.
    pub log_changed_files: bool,
}

impl WatchConfig {
    /// Creates a watch configuration for `root` with default settings.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            include_extensions: to_owned_vec(DEFAULT_INCLUDE_EXTENSIONS),
            ignore_globs: to_owned_vec(DEFAULT_IGNORE_GLOBS),
            log_changed_files: false,
        }
    }

    /// Returns the debounce window as a [`Duration`].
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// The base invocation every stage is run through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Working directory for stage execution.
    pub directory: Utf8PathBuf,

    /// Base invocation, e.g. `["docker", "compose"]`.
    pub command: Vec<String>,

    /// Service the stage arguments are run against.
    pub service_name: String,
}

impl ComposeConfig {
    /// Builds the full argv for a stage.
    ///
    /// The stage arguments follow `<command> run --rm <service>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mw_core::ComposeConfig;
    ///
    /// let compose = ComposeConfig {
    ///     directory: "/srv".into(),
    ///     command: vec!["docker".into(), "compose".into()],
    ///     service_name: "minerva".into(),
    /// };
    /// let argv = compose.invocation(&["index".to_owned()]);
    /// assert_eq!(argv, ["docker", "compose", "run", "--rm", "minerva", "index"]);
    /// ```
    #[must_use]
    pub fn invocation(&self, stage_args: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.command.len() + 3 + stage_args.len());
        argv.extend(self.command.iter().cloned());
        argv.push("run".to_owned());
        argv.push("--rm".to_owned());
        argv.push(self.service_name.clone());
        argv.extend(stage_args.iter().cloned());
        argv
    }
}

/// Per-stage argument lists, before the compose invocation is prefixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommands {
    /// Stage 1.
    pub extractor: Vec<String>,
    /// Stage 2, skipped when absent.
    pub validator: Option<Vec<String>>,
    /// Stage 3.
    pub indexer: Vec<String>,
}

/// Fully resolved and validated configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Change detection settings.
    pub watch: WatchConfig,

    /// Stage invocation settings.
    pub compose: ComposeConfig,

    /// Stage arguments.
    pub stages: StageCommands,
}

impl Config {
    /// Loads, resolves, and validates the configuration file at `path`.
    ///
    /// Relative paths inside the file are resolved against the directory
    /// containing it; an absent `composeDirectory` defaults to the current
    /// working directory.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let cwd = current_dir()?;
        let path = if path.is_absolute() {
            path.to_owned()
        } else {
            cwd.join(path)
        };
        let base_dir = path.parent().unwrap_or(cwd.as_path()).to_owned();

        let file = FileConfig::read(&path)?;
        Self::resolve(file, &base_dir, &cwd)
    }

    /// Applies defaults and validates a parsed [`FileConfig`].
    pub fn resolve(
        file: FileConfig,
        base_dir: &Utf8Path,
        cwd: &Utf8Path,
    ) -> Result<Self, ConfigError> {
        let workspace = file
            .workspace_path
            .ok_or(ConfigError::MissingField("workspacePath"))?;
        let root = resolve_dir(&workspace, base_dir)?;

        let directory = match file.compose_directory {
            Some(dir) => resolve_dir(&dir, base_dir)?,
            None => resolve_dir(cwd, cwd)?,
        };

        let command = match file.compose_command {
            Some(command) => validate_command("composeCommand", command)?,
            None => to_owned_vec(DEFAULT_COMPOSE_COMMAND),
        };

        let service_name = file
            .service_name
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_owned());
        if service_name.trim().is_empty() {
            return Err(ConfigError::invalid_option(
                "serviceName",
                "must not be empty",
            ));
        }

        let extractor = validate_command(
            "extractorCommand",
            file.extractor_command
                .ok_or(ConfigError::MissingField("extractorCommand"))?,
        )?;
        let validator = file
            .validate_command
            .map(|command| validate_command("validateCommand", command))
            .transpose()?;
        let indexer = validate_command(
            "indexCommand",
            file.index_command
                .ok_or(ConfigError::MissingField("indexCommand"))?,
        )?;

        let include_extensions = match file.include_extensions {
            Some(extensions) => normalize_extensions(extensions)?,
            None => to_owned_vec(DEFAULT_INCLUDE_EXTENSIONS),
        };

        let ignore_globs = file
            .ignore_globs
            .unwrap_or_else(|| to_owned_vec(DEFAULT_IGNORE_GLOBS));
        if ignore_globs.iter().any(|pattern| pattern.trim().is_empty()) {
            return Err(ConfigError::invalid_option(
                "ignoreGlobs",
                "patterns must not be empty",
            ));
        }

        Ok(Self {
            watch: WatchConfig {
                root,
                debounce_ms: file.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
                include_extensions,
                ignore_globs,
                log_changed_files: file.log_changed_files.unwrap_or(false),
            },
            compose: ComposeConfig {
                directory,
                command,
                service_name,
            },
            stages: StageCommands {
                extractor,
                validator,
                indexer,
            },
        })
    }
}

fn current_dir() -> Result<Utf8PathBuf, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| {
        ConfigError::invalid_path(".", format!("cannot determine working directory: {e}"))
    })?;
    Utf8PathBuf::try_from(cwd).map_err(|e| {
        let lossy = e.as_path().to_string_lossy().into_owned();
        ConfigError::invalid_path(lossy, "working directory is not valid UTF-8")
    })
}

/// Resolves `path` against `base_dir` and canonicalizes it.
fn resolve_dir(path: &Utf8Path, base_dir: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    let joined = if path.is_absolute() {
        path.to_owned()
    } else {
        base_dir.join(path)
    };

    if !joined.exists() {
        return Err(ConfigError::MissingDirectory(joined));
    }
    if !joined.is_dir() {
        return Err(ConfigError::invalid_path(joined, "not a directory"));
    }

    joined
        .canonicalize_utf8()
        .map_err(|e| ConfigError::invalid_path(joined.clone(), e.to_string()))
}

fn validate_command(field: &'static str, command: Vec<String>) -> Result<Vec<String>, ConfigError> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(command),
        _ => Err(ConfigError::EmptyCommand { field }),
    }
}

/// Lowercases extensions and ensures a leading dot.
fn normalize_extensions(extensions: Vec<String>) -> Result<Vec<String>, ConfigError> {
    let mut normalized: Vec<String> = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        if ext.is_empty() {
            return Err(ConfigError::invalid_option(
                "includeExtensions",
                "extensions must not be empty",
            ));
        }
        let ext = format!(".{ext}");
        if !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }
    Ok(normalized)
}

fn to_owned_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("Invalid path");
        let path = path.canonicalize_utf8().expect("Failed to canonicalize");
        (dir, path)
    }

    fn minimal(workspace: &str) -> FileConfig {
        FileConfig {
            workspace_path: Some(Utf8PathBuf::from(workspace)),
            extractor_command: Some(vec!["extract".to_owned()]),
            index_command: Some(vec!["index".to_owned()]),
            ..FileConfig::default()
        }
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let (_dir, root) = temp_root();
        std::fs::create_dir(root.join("docs")).expect("mkdir");

        let config = Config::resolve(minimal("docs"), &root, &root).expect("valid config");

        assert_eq!(config.watch.root, root.join("docs"));
        assert_eq!(config.watch.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert_eq!(config.watch.include_extensions, vec![".md", ".mdx"]);
        assert_eq!(config.watch.ignore_globs.len(), DEFAULT_IGNORE_GLOBS.len());
        assert!(!config.watch.log_changed_files);
        assert_eq!(config.compose.directory, root);
        assert_eq!(config.compose.command, vec!["docker", "compose"]);
        assert_eq!(config.compose.service_name, "minerva");
        assert!(config.stages.validator.is_none());
    }

    #[test]
    fn test_resolve_relative_compose_directory() {
        let (_dir, root) = temp_root();
        std::fs::create_dir(root.join("docs")).expect("mkdir");
        std::fs::create_dir(root.join("deploy")).expect("mkdir");

        let file = FileConfig {
            compose_directory: Some("deploy".into()),
            ..minimal("docs")
        };
        let cwd = Utf8PathBuf::from("/");
        let config = Config::resolve(file, &root, &cwd).expect("valid config");
        assert_eq!(config.compose.directory, root.join("deploy"));
    }

    #[test]
    fn test_resolve_missing_required_fields() {
        let (_dir, root) = temp_root();

        let err = Config::resolve(FileConfig::default(), &root, &root).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("workspacePath")));

        let file = FileConfig {
            extractor_command: None,
            ..minimal(".")
        };
        let err = Config::resolve(file, &root, &root).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("extractorCommand")));

        let file = FileConfig {
            index_command: None,
            ..minimal(".")
        };
        let err = Config::resolve(file, &root, &root).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("indexCommand")));
    }

    #[test]
    fn test_resolve_rejects_empty_commands() {
        let (_dir, root) = temp_root();

        let file = FileConfig {
            extractor_command: Some(Vec::new()),
            ..minimal(".")
        };
        let err = Config::resolve(file, &root, &root).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EmptyCommand {
                field: "extractorCommand"
            }
        ));

        let file = FileConfig {
            validate_command: Some(vec!["  ".to_owned()]),
            ..minimal(".")
        };
        let err = Config::resolve(file, &root, &root).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EmptyCommand {
                field: "validateCommand"
            }
        ));
    }

    #[test]
    fn test_resolve_missing_workspace() {
        let (_dir, root) = temp_root();
        let err = Config::resolve(minimal("nope"), &root, &root).unwrap_err();
        match err {
            ConfigError::MissingDirectory(path) => assert_eq!(path, root.join("nope")),
            other => panic!("Expected MissingDirectory, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_workspace_is_file() {
        let (_dir, root) = temp_root();
        std::fs::write(root.join("notes.md"), "# hi").expect("write");
        let err = Config::resolve(minimal("notes.md"), &root, &root).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { .. }));
    }

    #[test]
    fn test_normalize_extensions() {
        let normalized = normalize_extensions(vec![
            "MD".to_owned(),
            ".Mdx".to_owned(),
            "md".to_owned(),
        ])
        .expect("valid extensions");
        assert_eq!(normalized, vec![".md", ".mdx"]);

        assert!(normalize_extensions(vec![".".to_owned()]).is_err());
        assert!(normalize_extensions(Vec::new()).expect("empty ok").is_empty());
    }

    #[test]
    fn test_empty_service_name_rejected() {
        let (_dir, root) = temp_root();
        let file = FileConfig {
            service_name: Some(String::new()),
            ..minimal(".")
        };
        let err = Config::resolve(file, &root, &root).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOption {
                option: "serviceName",
                ..
            }
        ));
    }

    #[test]
    fn test_file_config_rejects_unknown_fields() {
        let err = FileConfig::from_json(r#"{"workspacePath": ".", "debounce": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_file_config_null_validator_is_absent() {
        let file = FileConfig::from_json(r#"{"validateCommand": null}"#).expect("valid json");
        assert!(file.validate_command.is_none());
    }

    #[test]
    fn test_load_resolves_relative_to_config_file() {
        let (_dir, root) = temp_root();
        std::fs::create_dir_all(root.join("conf/docs")).expect("mkdir");
        let config_path = root.join("conf/minerva.json");
        std::fs::write(
            &config_path,
            r#"{
                "workspacePath": "docs",
                "composeDirectory": ".",
                "serviceName": "kb",
                "extractorCommand": ["extract", "--all"],
                "validateCommand": ["validate"],
                "indexCommand": ["index"],
                "debounceMs": 250,
                "includeExtensions": [],
                "logChangedFiles": true
            }"#,
        )
        .expect("write config");

        let config = Config::load(&config_path).expect("valid config");
        assert_eq!(config.watch.root, root.join("conf/docs"));
        assert_eq!(config.compose.directory, root.join("conf"));
        assert_eq!(config.watch.debounce(), Duration::from_millis(250));
        assert!(config.watch.include_extensions.is_empty());
        assert!(config.watch.log_changed_files);
        assert_eq!(
            config.stages.validator.as_deref(),
            Some(&["validate".to_owned()][..])
        );
        insta::assert_snapshot!(
            config.compose.invocation(&config.stages.extractor).join(" "),
            @"docker compose run --rm kb extract --all"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let (_dir, root) = temp_root();
        let err = Config::load(&root.join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
