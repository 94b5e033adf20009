use clap::{Parser, Subcommand, ValueEnum};

use crate::segments::DEFAULT_USER_KEY;
use crate::segments::SegmentOptions;

/// Resolve qualified ODP audience segments for user identities.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve qualified segments for one or more users through a shared cache
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ResolveArgs {
    /// User identifier values (e.g. VUIDs) to resolve concurrently
    #[arg(required = true, value_name = "USER_VALUE")]
    pub user_values: Vec<String>,

    /// Identifier kind sent to ODP
    #[arg(long, default_value = DEFAULT_USER_KEY)]
    pub user_key: String,

    /// Only check these segments (repeatable); checks all when omitted
    #[arg(long = "segment", value_name = "NAME")]
    pub segments: Vec<String>,

    /// Send an explicit empty segment subset
    #[arg(long, conflicts_with = "segments")]
    pub no_segments: bool,

    /// Bypass the cache for reads and writes
    #[arg(long)]
    pub ignore_cache: bool,

    /// Clear the cache before resolving
    #[arg(long)]
    pub reset_cache: bool,

    /// Resolve every user this many times, to observe cache hits
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,
}

impl ResolveArgs {
    pub fn segments_to_check(&self) -> Option<Vec<String>> {
        if self.no_segments {
            Some(Vec::new())
        } else if self.segments.is_empty() {
            None
        } else {
            Some(self.segments.clone())
        }
    }

    pub fn options(&self) -> SegmentOptions {
        let mut options = SegmentOptions::empty();
        options.set(SegmentOptions::IGNORE_CACHE, self.ignore_cache);
        options.set(SegmentOptions::RESET_CACHE, self.reset_cache);
        options
    }
}

/// Formatter for tracing output.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Compact human-readable output
    Pretty,
    /// One JSON object per event
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}
