use std::env;
use std::path::PathBuf;

use common::Song;
use store::MusicStore;
use tracing_subscriber::EnvFilter;

/// Offline import for one user, without artwork resolution. Useful for
/// seeding a large library before first login.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let music_root = args
        .next()
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .ok_or("MUSIC_ROOT not set and no path argument")?;
    let user_id = args
        .next()
        .or_else(|| env::var("MELODEON_USER").ok())
        .ok_or("MELODEON_USER not set and no user argument")?;
    let store_path = args
        .next()
        .or_else(|| env::var("STORE_PATH").ok())
        .unwrap_or_else(|| "data/melodeon.redb".to_string());

    let store = MusicStore::open(&PathBuf::from(&store_path))?;
    let staged = store.stage_new_songs(&PathBuf::from(&music_root), &user_id)?;
    let skipped = staged.skipped;
    let songs: Vec<Song> = staged
        .drafts
        .into_iter()
        .map(|draft| draft.into_song(&user_id, None))
        .collect();
    store.insert_songs(&songs)?;

    println!(
        "Imported {} songs for {} ({} already present)",
        songs.len(),
        user_id,
        skipped
    );

    Ok(())
}
