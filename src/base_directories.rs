//! Resolve the XDG base directories, as defined by version 0.8 of the
//! [Base Directory Specification](https://specifications.freedesktop.org/basedir-spec/basedir-spec-0.8.html).
//!
//! # Examples
//!
//! ```rust,no_run
//! use linux_desktop_utils::base_directories::BaseDirectories;
//!
//! fn run() -> Result<(), linux_desktop_utils::base_directories::BaseDirectoryError> {
//!     let dirs = BaseDirectories::from_env();
//!     println!("{}", dirs.config_home()?.display());
//!     for dir in dirs.data_dirs() {
//!         println!("{}", dir.display());
//!     }
//!     Ok(())
//! }
//! ```

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

const XDG_DATA_HOME: &str = "XDG_DATA_HOME";
const XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";
const XDG_STATE_HOME: &str = "XDG_STATE_HOME";
const XDG_CACHE_HOME: &str = "XDG_CACHE_HOME";
const XDG_DATA_DIRS: &str = "XDG_DATA_DIRS";
const XDG_CONFIG_DIRS: &str = "XDG_CONFIG_DIRS";
const XDG_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";

const DEFAULT_DATA_DIRS: &[&str] = &["/usr/local/share", "/usr/share"];
const DEFAULT_CONFIG_DIRS: &[&str] = &["/etc/xdg"];

/// Looks environment variables up.
pub trait EnvironmentProvider: Send + Sync {
    /// The value of the variable `name`, if it is set.
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl EnvironmentProvider for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvironmentProvider for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// An error resolving a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BaseDirectoryError {
    /// The directory is unset and `$HOME` to derive its default from is
    /// unset too.
    MissingHome(&'static str),
}

impl std::error::Error for BaseDirectoryError {}

impl fmt::Display for BaseDirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHome(variable) => {
                write!(f, "Neither ${variable} nor $HOME is set")
            }
        }
    }
}

/// The XDG base directories, read from an [`EnvironmentProvider`].
///
/// Values are read on every call. Empty, whitespace-only or relative values
/// count as unset.
#[derive(Debug, Clone, Default)]
pub struct BaseDirectories<E: EnvironmentProvider = ProcessEnvironment> {
    environment: E,
}

impl BaseDirectories {
    /// Resolve against the environment of the running process.
    pub fn from_env() -> Self {
        Self::new(ProcessEnvironment)
    }
}

impl<E: EnvironmentProvider> BaseDirectories<E> {
    /// Resolve against `environment`.
    pub fn new(environment: E) -> Self {
        Self { environment }
    }

    /// Base directory for user-specific data files, `$HOME/.local/share` by
    /// default.
    pub fn data_home(&self) -> Result<PathBuf, BaseDirectoryError> {
        self.home(XDG_DATA_HOME, ".local/share")
    }

    /// Base directory for user-specific configuration files, `$HOME/.config`
    /// by default.
    pub fn config_home(&self) -> Result<PathBuf, BaseDirectoryError> {
        self.home(XDG_CONFIG_HOME, ".config")
    }

    /// Base directory for user-specific state files, `$HOME/.local/state` by
    /// default.
    pub fn state_home(&self) -> Result<PathBuf, BaseDirectoryError> {
        self.home(XDG_STATE_HOME, ".local/state")
    }

    /// Base directory for user-specific non-essential data files,
    /// `$HOME/.cache` by default.
    pub fn cache_home(&self) -> Result<PathBuf, BaseDirectoryError> {
        self.home(XDG_CACHE_HOME, ".cache")
    }

    /// Preference-ordered directories to search for data files in addition
    /// to [`Self::data_home`].
    pub fn data_dirs(&self) -> Vec<PathBuf> {
        self.dirs(XDG_DATA_DIRS, DEFAULT_DATA_DIRS)
    }

    /// Preference-ordered directories to search for configuration files in
    /// addition to [`Self::config_home`].
    pub fn config_dirs(&self) -> Vec<PathBuf> {
        self.dirs(XDG_CONFIG_DIRS, DEFAULT_CONFIG_DIRS)
    }

    /// Directory for user-specific runtime files such as sockets.
    ///
    /// There is no default, callers have to pick a replacement themselves.
    pub fn runtime_dir(&self) -> Option<PathBuf> {
        let dir = self.path(XDG_RUNTIME_DIR);
        #[cfg(feature = "tracing")]
        if dir.is_none() {
            tracing::warn!("${} is not set", XDG_RUNTIME_DIR);
        }
        dir
    }

    /// The first existing `relative` file in the data directories, user
    /// directory first.
    pub fn find_data_file(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        find(self.data_home().ok(), self.data_dirs(), relative.as_ref())
    }

    /// The first existing `relative` file in the configuration directories,
    /// user directory first.
    pub fn find_config_file(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        find(self.config_home().ok(), self.config_dirs(), relative.as_ref())
    }

    fn path(&self, variable: &str) -> Option<PathBuf> {
        self.environment
            .var(variable)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.is_absolute())
    }

    fn home(
        &self,
        variable: &'static str,
        default: &str,
    ) -> Result<PathBuf, BaseDirectoryError> {
        if let Some(path) = self.path(variable) {
            return Ok(path);
        }
        self.path("HOME")
            .map(|home| home.join(default))
            .ok_or(BaseDirectoryError::MissingHome(variable))
    }

    fn dirs(&self, variable: &str, defaults: &[&str]) -> Vec<PathBuf> {
        let dirs = self
            .environment
            .var(variable)
            .map(|value| {
                value
                    .split(':')
                    .map(str::trim)
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from)
                    .filter(|dir| dir.is_absolute())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if dirs.is_empty() {
            defaults.iter().map(PathBuf::from).collect()
        } else {
            dirs
        }
    }
}

fn find(home: Option<PathBuf>, dirs: Vec<PathBuf>, relative: &Path) -> Option<PathBuf> {
    home.into_iter()
        .chain(dirs)
        .map(|dir| dir.join(relative))
        .find(|path| path.exists())
}
