//! Qualified-segment resolution with a shared expiring cache in front of ODP.
//!
//! Concurrent misses for the same identity are not coalesced: each caller
//! fetches independently and the last write-back wins.

pub mod cache;

use bitflags::bitflags;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::odp::{FetchError, FetchRequest, OdpClient, SUPPORTED_USER_KEY, SegmentFetcher};
use cache::SegmentsCache;

/// Default maximum number of cached identities.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Default lifetime of a cached segment list.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Identifier kind used when the caller names none.
pub const DEFAULT_USER_KEY: &str = SUPPORTED_USER_KEY;

/// Separator between user key and value in cache keys.
const CACHE_KEY_SEPARATOR: &str = "-$-";

bitflags! {
    /// Per-call overrides for cache behaviour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SegmentOptions: u8 {
        /// Skip the cache read and do not store the fetched result.
        const IGNORE_CACHE = 1 << 0;
        /// Clear the whole cache, for every identity, before this call.
        const RESET_CACHE = 1 << 1;
    }
}

/// Build the cache key for an identity.
pub fn make_cache_key(user_key: &str, user_value: &str) -> String {
    format!("{user_key}{CACHE_KEY_SEPARATOR}{user_value}")
}

/// Resolves qualified segments for a user, consulting the cache first.
///
/// Cheap to clone; clones share the cache and the fetcher.
#[derive(Clone)]
pub struct SegmentResolver {
    fetcher: Arc<dyn SegmentFetcher>,
    cache: Arc<SegmentsCache>,
}

impl SegmentResolver {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, cache_size: usize, cache_timeout: Duration) -> Self {
        Self {
            fetcher,
            cache: Arc::new(SegmentsCache::new(cache_size, cache_timeout)),
        }
    }

    /// Resolver backed by the ODP GraphQL client, sized from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(OdpClient::with_timeout(config.odp_request_timeout)),
            config.segments_cache_size,
            config.segments_cache_timeout,
        )
    }

    pub fn cache(&self) -> &SegmentsCache {
        &self.cache
    }

    /// Return the qualified segments for `request`'s identity.
    ///
    /// A cache hit returns without touching the network. On a miss (or with
    /// `IGNORE_CACHE`) exactly one fetch is made; its result is cached unless
    /// `IGNORE_CACHE` is set. Failures never modify the cache, but a
    /// `RESET_CACHE` that already happened stays in effect.
    pub async fn fetch_qualified_segments(
        &self,
        request: &FetchRequest,
        options: SegmentOptions,
    ) -> Result<Vec<String>, FetchError> {
        let cache_key = make_cache_key(&request.user_key, &request.user_value);
        let ignore_cache = options.contains(SegmentOptions::IGNORE_CACHE);

        if options.contains(SegmentOptions::RESET_CACHE) {
            self.cache.reset();
            debug!("segments cache reset");
        }

        if !ignore_cache {
            if let Some(segments) = self.cache.lookup(&cache_key) {
                debug!(key = %cache_key, "segments cache hit");
                return Ok(segments);
            }
            debug!(key = %cache_key, "segments cache miss");
        }

        let segments = self.fetcher.fetch(request).await?;

        if !ignore_cache {
            self.cache.save(cache_key, segments.clone());
        }

        Ok(segments)
    }
}

impl std::fmt::Debug for SegmentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
