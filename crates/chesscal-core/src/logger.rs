//! Stderr logging for applications embedding the calibration engine.
//!
//! Records from the `chesscal*` crates pass at the requested level. Other
//! crates (image decoders, the ChESS detector) are held to `Warn` so a
//! `Debug` session shows the calibration stages and not decoder chatter.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const OWN_PREFIX: &str = "chesscal";

struct StageLogger {
    level: LevelFilter,
    started: Instant,
}

impl StageLogger {
    fn passes(&self, target: &str, level: Level) -> bool {
        if target.starts_with(OWN_PREFIX) {
            level <= self.level
        } else {
            level <= self.level.min(LevelFilter::Warn)
        }
    }
}

/// `chesscal_detect::detector` -> `detect::detector`
fn short_target(target: &str) -> &str {
    target
        .strip_prefix(OWN_PREFIX)
        .map(|rest| rest.trim_start_matches(['_', '-']))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(target)
}

impl Log for StageLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.passes(metadata.target(), metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            std::io::stderr().lock(),
            "{:8.3}s {:<5} [{}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StageLogger> = OnceLock::new();

/// Install the stderr logger. Only the first call has an effect; later
/// calls keep the original level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StageLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber printing span timings of the detection,
/// selection and calibration stages. `RUST_LOG` overrides the default
/// `info` filter.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_targets_follow_the_level_and_others_stay_quiet() {
        let logger = StageLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        assert!(logger.passes("chesscal_detect::grid", Level::Debug));
        assert!(!logger.passes("chesscal_detect::grid", Level::Trace));
        assert!(!logger.passes("chess_corners", Level::Info));
        assert!(logger.passes("chess_corners", Level::Warn));
    }

    #[test]
    fn targets_are_shortened_for_own_crates_only() {
        assert_eq!(short_target("chesscal_calib::lm"), "calib::lm");
        assert_eq!(short_target("chesscal"), "chesscal");
        assert_eq!(short_target("image::codecs"), "image::codecs");
    }

    #[test]
    fn repeated_initialization_is_a_no_op() {
        assert!(init_with_level(LevelFilter::Warn).is_ok());
        assert!(init_with_level(LevelFilter::Debug).is_ok());
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
