use crate::cli::{Command, ResolveArgs};
use crate::config::Config;
use crate::odp::FetchRequest;
use crate::segments::SegmentResolver;
use crate::utils::fmt_duration;
use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of resolving one user in one round.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Resolution {
    pub round: u32,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Main application struct tying configuration to a shared resolver.
pub struct App {
    config: Config,
    resolver: SegmentResolver,
}

impl App {
    pub fn new(config: Config) -> Self {
        let resolver = SegmentResolver::from_config(&config);
        info!(
            cache_size = config.segments_cache_size,
            cache_timeout = fmt_duration(config.segments_cache_timeout),
            request_timeout = fmt_duration(config.odp_request_timeout),
            api_host = %config.odp_api_host,
            "segment resolver ready"
        );
        Self::with_resolver(config, resolver)
    }

    pub fn with_resolver(config: Config, resolver: SegmentResolver) -> Self {
        Self { config, resolver }
    }

    pub fn resolver(&self) -> &SegmentResolver {
        &self.resolver
    }

    /// Execute a CLI command, printing one JSON line per resolution.
    pub async fn run(&self, command: Command) -> ExitCode {
        match command {
            Command::Resolve(args) => match self.resolve(&args).await {
                Ok(resolutions) => {
                    let mut failed = false;
                    for resolution in &resolutions {
                        failed |= resolution.error.is_some();
                        match serde_json::to_string(resolution) {
                            Ok(line) => println!("{line}"),
                            Err(e) => warn!(error = %e, "failed to serialize resolution"),
                        }
                    }
                    if failed {
                        ExitCode::FAILURE
                    } else {
                        ExitCode::SUCCESS
                    }
                }
                Err(e) => {
                    error!(error = ?e, "resolve failed");
                    ExitCode::FAILURE
                }
            },
        }
    }

    /// Resolve every requested user concurrently, `args.repeat` times.
    ///
    /// Rounds run one after another so later rounds can hit the cache filled
    /// by earlier ones.
    pub async fn resolve(&self, args: &ResolveArgs) -> Result<Vec<Resolution>> {
        let api_key = self.config.api_key()?;
        let options = args.options();
        let segments_to_check = args.segments_to_check();
        let mut resolutions = Vec::new();

        for round in 1..=args.repeat {
            let started = Instant::now();
            let calls = args.user_values.iter().map(|user| {
                let request = FetchRequest::new(api_key, &self.config.odp_api_host, user.as_str())
                    .with_user_key(args.user_key.as_str())
                    .with_segments(segments_to_check.clone());
                async move {
                    let result = self.resolver.fetch_qualified_segments(&request, options).await;
                    if let Err(e) = &result {
                        warn!(user = %request.user_value, error = ?e, "segment resolution failed");
                    }
                    let (segments, error) = match result {
                        Ok(segments) => (Some(segments), None),
                        Err(e) => (None, Some(format!("{:#}", anyhow::Error::from(e)))),
                    };
                    Resolution {
                        round,
                        user: request.user_value,
                        segments,
                        error,
                    }
                }
            });

            resolutions.extend(join_all(calls).await);
            info!(
                round,
                users = args.user_values.len(),
                duration = fmt_duration(started.elapsed()),
                "resolution round complete"
            );
        }

        let stats = self.resolver.cache().stats();
        info!(
            entries = self.resolver.cache().len(),
            hits = stats.hits(),
            misses = stats.misses(),
            evictions = stats.evictions(),
            expirations = stats.expirations(),
            "segments cache statistics"
        );

        Ok(resolutions)
    }
}
