use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::utils::url_escape;

const HIT_TTL: Duration = Duration::from_secs(60 * 60 * 24);
const MISS_TTL: Duration = Duration::from_secs(60 * 60);

/// Cached value for albums the catalog had no artwork for. Misses are cached
/// too, just with a shorter deadline.
const MISS_SENTINEL: &str = "";

/// An album-art catalog lookup. The production source talks to the iTunes
/// Search API; tests substitute counting fakes.
pub trait ArtSource: Send + Sync {
    fn find_artwork<'a>(
        &'a self,
        artist: &'a str,
        album: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, String>>;
}

pub trait ArtCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String, ttl: Duration);
}

#[derive(Clone)]
pub struct ArtworkResolver {
    source: Arc<dyn ArtSource>,
    cache: Arc<dyn ArtCache>,
}

impl ArtworkResolver {
    pub fn new(source: Arc<dyn ArtSource>, cache: Arc<dyn ArtCache>) -> Self {
        Self { source, cache }
    }

    /// Cache-through lookup. Any source error counts as a miss; scans never
    /// fail because the catalog is unreachable.
    pub async fn resolve(&self, artist: &str, album: &str) -> Option<String> {
        let key = cache_key(artist, album);
        if let Some(cached) = self.cache.get(&key) {
            if cached == MISS_SENTINEL {
                return None;
            }
            return Some(cached);
        }

        match self.source.find_artwork(artist, album).await {
            Ok(Some(url)) => {
                self.cache.put(&key, url.clone(), HIT_TTL);
                Some(url)
            }
            Ok(None) => {
                self.cache.put(&key, MISS_SENTINEL.to_string(), MISS_TTL);
                None
            }
            Err(err) => {
                debug!("Artwork lookup failed for {} / {}: {}", artist, album, err);
                self.cache.put(&key, MISS_SENTINEL.to_string(), MISS_TTL);
                None
            }
        }
    }
}

fn cache_key(artist: &str, album: &str) -> String {
    format!("{}\x1f{}", artist.to_lowercase(), album.to_lowercase())
}

pub struct ItunesSource {
    client: Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ItunesSearchResponse {
    #[serde(rename = "resultCount")]
    result_count: u32,
    #[serde(default)]
    results: Vec<ItunesAlbum>,
}

#[derive(Deserialize)]
struct ItunesAlbum {
    #[serde(rename = "artworkUrl100")]
    artwork_url: Option<String>,
}

impl ItunesSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl ArtSource for ItunesSource {
    fn find_artwork<'a>(
        &'a self,
        artist: &'a str,
        album: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, String>> {
        Box::pin(async move {
            let url = format!(
                "https://itunes.apple.com/search?term={}+{}&entity=album&limit=1",
                url_escape(artist),
                url_escape(album)
            );
            let response = self
                .client
                .get(&url)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|err| err.to_string())?;
            if !response.status().is_success() {
                return Err(format!("http {}", response.status()));
            }
            let payload = response
                .json::<ItunesSearchResponse>()
                .await
                .map_err(|err| err.to_string())?;
            if payload.result_count == 0 {
                return Ok(None);
            }
            let artwork = payload
                .results
                .into_iter()
                .next()
                .and_then(|result| result.artwork_url);
            // The search API returns thumbnail urls; ask for the large
            // rendition instead.
            Ok(artwork.map(|url| url.replace("100x100", "600x600")))
        })
    }
}

#[derive(Default)]
pub struct MemoryArtCache {
    inner: RwLock<HashMap<String, CacheSlot>>,
}

struct CacheSlot {
    value: String,
    expires_at: Instant,
}

impl ArtCache for MemoryArtCache {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.inner.read();
        let slot = guard.get(key)?;
        if slot.expires_at <= Instant::now() {
            return None;
        }
        Some(slot.value.clone())
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut guard = self.inner.write();
        guard.retain(|_, slot| slot.expires_at > now);
        guard.insert(
            key.to_string(),
            CacheSlot {
                value,
                expires_at: now + ttl,
            },
        );
    }
}
