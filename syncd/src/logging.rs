//! Log backend set-up for the daemon binary.
//!
//! The library logs through the `log` facade only; this module installs
//! `env_logger` with a level derived from `-v`/`-q`. `RUST_LOG`, when set,
//! takes precedence.

use log::LevelFilter;

/// Maps the verbosity flags to a level filter.
///
/// # Examples
///
/// ```
/// use log::LevelFilter;
/// use syncd::logging::level_for;
///
/// assert_eq!(level_for(0, false), LevelFilter::Info);
/// assert_eq!(level_for(1, false), LevelFilter::Debug);
/// assert_eq!(level_for(0, true), LevelFilter::Warn);
/// ```
#[must_use]
pub const fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global logger.
///
/// # Errors
///
/// Returns an error if a logger has already been installed.
pub fn init(verbosity: u8, quiet: bool) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level_for(verbosity, quiet))
        .parse_default_env()
        .format_timestamp_secs()
        .try_init()
}
