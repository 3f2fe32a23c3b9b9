use {
    crate::config::{Config, Format},
    std::{io::IsTerminal, panic::PanicHookInfo, sync::Once},
    time::macros::format_description,
    tracing_subscriber::{
        EnvFilter,
        Layer,
        fmt::{time::UtcTime, writer::MakeWriterExt as _},
        prelude::*,
        util::SubscriberInitExt,
    },
};

/// Installs the global subscriber and a panic hook that logs panics. The
/// filter syntax is documented at
/// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
pub fn initialize(config: &Config) {
    set_tracing_subscriber(config);
    std::panic::set_hook(Box::new(tracing_panic_hook));
}

/// Like [`initialize`] but only the first call of the process has an effect.
/// Meant for tests.
pub fn initialize_reentrant(filter: &str) {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| initialize(&Config::new(filter)));
}

fn set_tracing_subscriber(config: &Config) {
    let writer = std::io::stderr
        .with_max_level(config.stderr_threshold())
        .or_else(std::io::stdout);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_timer(UtcTime::new(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        )));
    let fmt_layer = match config.format {
        Format::Json => fmt_layer.json().boxed(),
        Format::Text => fmt_layer
            .with_ansi(std::io::stdout().is_terminal())
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(EnvFilter::new(&config.filter)))
        .init();
    tracing::info!(filter = %config.filter, "initialized tracing");
}

/// Logs panics like the default hook would print them, in the log format.
fn tracing_panic_hook(panic: &PanicHookInfo) {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("<unnamed>");
    let backtrace = std::backtrace::Backtrace::capture();
    tracing::error!("thread '{name}' {panic}\nstack backtrace:\n{backtrace}");
}
