use std::path::PathBuf;

use common::Song;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use store::{MusicStore, StoreError};
use tracing::info;

use crate::artwork::ArtworkResolver;

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub enum ScanError {
    Store(StoreError),
    Join(String),
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::Store(err) => write!(f, "store error: {}", err),
            ScanError::Join(message) => write!(f, "scan task failed: {}", message),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<StoreError> for ScanError {
    fn from(err: StoreError) -> Self {
        ScanError::Store(err)
    }
}

/// Imports the user's new files from the music root: stage on a blocking
/// thread, resolve artwork with bounded concurrency, insert in one batch.
/// Runs to completion before returning.
pub async fn run_scan(
    store: MusicStore,
    artwork: Option<ArtworkResolver>,
    concurrency: usize,
    root: PathBuf,
    user_id: String,
) -> Result<ScanReport, ScanError> {
    let staging_store = store.clone();
    let staging_user = user_id.clone();
    let staged = tokio::task::spawn_blocking(move || {
        staging_store.stage_new_songs(&root, &staging_user)
    })
    .await
    .map_err(|err| ScanError::Join(err.to_string()))??;

    let skipped = staged.skipped;
    let songs: Vec<Song> = stream::iter(staged.drafts.into_iter().map(|draft| {
        let artwork = artwork.clone();
        let user_id = user_id.clone();
        async move {
            let art_url = match &artwork {
                Some(resolver) => resolver.resolve(&draft.artist, &draft.album).await,
                None => None,
            };
            draft.into_song(&user_id, art_url)
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let imported = songs.len();
    let insert_store = store.clone();
    tokio::task::spawn_blocking(move || insert_store.insert_songs(&songs))
        .await
        .map_err(|err| ScanError::Join(err.to_string()))??;

    info!(
        "Scan for user {} imported {} songs, skipped {} already present",
        user_id, imported, skipped
    );
    Ok(ScanReport { imported, skipped })
}
