use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvfigError {
    #[error("Input is not valid UTF-8 (first invalid byte at offset {offset})")]
    InvalidUtf8 { offset: usize },

    #[error("Failed to generate env text: {0}")]
    Generation(String),

    #[error("Failed to parse settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("Unknown setting '{key}' (line {line})")]
    UnknownSetting { key: String, line: usize },

    #[error("Unknown settings in configuration")]
    UnknownSettings(Vec<EnvfigError>),

    #[error("Settings error: {0}")]
    Settings(#[from] confique::Error),

    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },
}

impl From<std::fmt::Error> for EnvfigError {
    fn from(e: std::fmt::Error) -> Self {
        EnvfigError::Generation(e.to_string())
    }
}

impl From<std::str::Utf8Error> for EnvfigError {
    fn from(e: std::str::Utf8Error) -> Self {
        EnvfigError::InvalidUtf8 {
            offset: e.valid_up_to(),
        }
    }
}
