use std::path::PathBuf;

/// Environment variable naming the HDF5 shared library to load.
pub const LIBRARY_PATH_VAR: &str = "H5LITE_HDF5_LIBRARY";

/// Environment variable that, when `1` or `true`, keeps the engine's own error printing.
pub const ENGINE_ERRORS_VAR: &str = "H5LITE_HDF5_ERRORS";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Explicit shared library to load. When `None` the platform's usual names are searched.
    pub library_path: Option<PathBuf>,
    /// Turn off the engine's default error printing before each container is opened.
    pub silence_errors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_path: None,
            silence_errors: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            library_path: std::env::var_os(LIBRARY_PATH_VAR)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            silence_errors: !std::env::var(ENGINE_ERRORS_VAR)
                .map(|s| parse_flag(&s))
                .unwrap_or(false),
        }
    }

    #[must_use]
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_silence_errors(mut self, silence: bool) -> Self {
        self.silence_errors = silence;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
