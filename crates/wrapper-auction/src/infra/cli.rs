use std::{
    fmt::{self, Display, Formatter},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

#[derive(Debug, clap::Parser)]
pub struct Args {
    /// The log filter.
    #[clap(long, env, default_value = "warn,wrapper_auction=debug")]
    pub log_filter: String,

    /// At which log level logs should be printed to stderr instead of stdout.
    #[clap(long, env)]
    pub log_stderr_threshold: Option<tracing::Level>,

    /// Whether to use JSON format for the logs.
    #[clap(long, env, default_value = "false")]
    pub use_json_logs: bool,

    /// Path to the configuration file in TOML format. It lists the adapters
    /// and the page level defaults of the slots.
    #[clap(long, env)]
    pub config: PathBuf,

    /// The slots to run the auction for.
    #[clap(long = "slot", env = "SLOTS", use_value_delimiter = true, required = true)]
    pub slots: Vec<String>,

    /// Overrides the auction timeout of the configuration file.
    #[clap(long, env, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Restricts the auction to these adapters. All adapters take part if
    /// none are given.
    #[clap(long = "include-adapter", env = "INCLUDE_ADAPTERS", use_value_delimiter = true)]
    pub include_adapters: Vec<String>,

    /// Viewport class of the page, for example `desktop` or `mobile`.
    #[clap(long, env, default_value = "")]
    pub viewport: String,

    #[clap(long = "page", env = "PAGE_ID")]
    pub page_id: Option<String>,

    #[clap(long = "site", env = "SITE_ID")]
    pub site_id: Option<String>,

    #[clap(long = "zone", env = "ZONE_ID")]
    pub zone_id: Option<String>,

    /// 1 for the initial auction of the page, 2 and above for refreshes.
    #[clap(long, env, default_value = "1")]
    pub refresh: u32,

    /// Targeting dimensions of the page in the format `<KEY>=<VALUE>`. An
    /// empty value marks a dimension without value.
    #[clap(long = "dimension", env = "DIMENSIONS", use_value_delimiter = true)]
    pub dimensions: Vec<Dimension>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub key: String,
    pub value: Option<String>,
}

impl FromStr for Dimension {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected <KEY>=<VALUE> but got {s:?}"))?;
        anyhow::ensure!(!key.is_empty(), "dimension key must not be empty");
        Ok(Self {
            key: key.to_owned(),
            value: (!value.is_empty()).then(|| value.to_owned()),
        })
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value.as_deref().unwrap_or_default())
    }
}

impl Display for Args {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Self {
            log_filter,
            log_stderr_threshold,
            use_json_logs,
            config,
            slots,
            timeout,
            include_adapters,
            viewport,
            page_id,
            site_id,
            zone_id,
            refresh,
            dimensions,
        } = self;

        writeln!(f, "log_filter: {log_filter}")?;
        display_option(f, "log_stderr_threshold", log_stderr_threshold)?;
        writeln!(f, "use_json_logs: {use_json_logs}")?;
        writeln!(f, "config: {}", config.display())?;
        display_list(f, "slots", slots)?;
        display_option(f, "timeout", &timeout.map(humantime::format_duration))?;
        display_list(f, "include_adapters", include_adapters)?;
        writeln!(f, "viewport: {viewport}")?;
        display_option(f, "page_id", page_id)?;
        display_option(f, "site_id", site_id)?;
        display_option(f, "zone_id", zone_id)?;
        writeln!(f, "refresh: {refresh}")?;
        display_list(f, "dimensions", dimensions)?;
        Ok(())
    }
}

fn display_option(f: &mut Formatter<'_>, name: &str, option: &Option<impl Display>) -> fmt::Result {
    write!(f, "{name}: ")?;
    match option {
        Some(display) => writeln!(f, "{display}"),
        None => writeln!(f, "None"),
    }
}

fn display_list<T: Display>(
    f: &mut Formatter<'_>,
    name: &str,
    iter: impl IntoIterator<Item = T>,
) -> fmt::Result {
    write!(f, "{name}: [")?;
    for (i, t) in iter.into_iter().enumerate() {
        if i != 0 {
            f.write_str(", ")?;
        }
        write!(f, "{t}")?;
    }
    writeln!(f, "]")
}
