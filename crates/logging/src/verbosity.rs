//! Mapping from `-v` counts to tracing levels.

use tracing::level_filters::LevelFilter;

/// Prefix shared by every event target the workspace emits.
pub const TARGET_PREFIX: &str = "diffgen";

/// How much the workspace logs.
///
/// Events from other crates stay at `warn` regardless of the level chosen
/// here; only `diffgen::*` targets follow it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// Stage progress and statistics.
    #[default]
    Normal,
    /// Per-item decisions.
    Debug,
    /// Everything, including per-chunk parsing.
    Trace,
}

impl Verbosity {
    /// Maps a repeat count of `-v` to a verbosity: 0 is quiet, 3 or more is trace.
    #[must_use]
    pub const fn from_verbose_level(level: u8) -> Self {
        match level {
            0 => Self::Quiet,
            1 => Self::Normal,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Level applied to `diffgen::*` targets.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::WARN,
            Self::Normal => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    const fn directive_level(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// `EnvFilter` directives for this verbosity.
    #[must_use]
    pub fn directives(self) -> String {
        format!("warn,{TARGET_PREFIX}={}", self.directive_level())
    }
}
