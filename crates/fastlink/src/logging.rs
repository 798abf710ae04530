use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Log target prefix of the codec library (per-frame events).
pub const CODEC_TARGET: &str = "fastlink_codec";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Per-target filter: `level` for the CLI, `codec_level` (if set) for the
/// codec library, whose trace output is one event per frame.
pub fn log_targets(level: LogLevel, codec_level: Option<LogLevel>) -> Targets {
    let targets = Targets::new().with_default(LevelFilter::from(level));
    match codec_level {
        Some(codec) => targets.with_target(CODEC_TARGET, LevelFilter::from(codec)),
        None => targets,
    }
}

/// Install the stderr subscriber. Connection threads are named, so thread
/// names are included.
pub fn init_logging(format: LogFormat, level: LogLevel, codec_level: Option<LogLevel>) {
    let targets = log_targets(level, codec_level);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_thread_names(true);

    let _ = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(layer)
            .with(targets)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json())
            .with(targets)
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn codec_level_overrides_default_for_codec_only() {
        let targets = log_targets(LogLevel::Info, Some(LogLevel::Trace));
        assert!(targets.would_enable("fastlink_codec::decoder", &Level::TRACE));
        assert!(!targets.would_enable("fastlink::cmd::echo", &Level::DEBUG));
        assert!(targets.would_enable("fastlink::cmd::echo", &Level::INFO));
    }

    #[test]
    fn codec_follows_default_without_override() {
        let targets = log_targets(LogLevel::Warn, None);
        assert!(!targets.would_enable("fastlink_codec::decoder", &Level::INFO));
        assert!(targets.would_enable("fastlink_codec::decoder", &Level::WARN));
    }
}
