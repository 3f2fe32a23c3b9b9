use tracing::Level;

/// Shape of the emitted log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Human readable lines, colored when stdout is a terminal.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// How a process logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `EnvFilter` directives, for example `warn,wrapper_auction=debug`.
    pub filter: String,
    /// Events at or above this level are written to stderr, everything else
    /// to stdout. Only errors go to stderr if unset.
    pub stderr_threshold: Option<Level>,
    pub format: Format,
}

impl Config {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            stderr_threshold: None,
            format: Format::Text,
        }
    }

    pub fn with_stderr_threshold(mut self, threshold: Option<Level>) -> Self {
        self.stderr_threshold = threshold;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub(crate) fn stderr_threshold(&self) -> Level {
        self.stderr_threshold.unwrap_or(Level::ERROR)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_errors_reach_stderr_by_default() {
        let config = Config::default();
        assert_eq!(config.filter, "info");
        assert_eq!(config.stderr_threshold(), Level::ERROR);

        let config = Config::new("debug")
            .with_stderr_threshold(Some(Level::WARN))
            .with_format(Format::Json);
        assert_eq!(config.stderr_threshold(), Level::WARN);
        assert_eq!(config.format, Format::Json);
    }
}
