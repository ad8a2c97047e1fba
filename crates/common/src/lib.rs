use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A song row as imported by one user's scan. Two users importing the same
/// file on disk get two independent rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub file_path: String,
    pub owner_id: String,
    #[serde(default)]
    pub album_art_url: Option<String>,
    pub created_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: u64,
}

/// Playlist membership. `position` is the only ordering state; it is assigned
/// on insert and rewritten on reorder, ids never change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub playlist_id: String,
    pub song_id: String,
    pub position: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayRecord {
    pub id: String,
    pub user_id: String,
    pub song_id: String,
    pub played_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: String,
    pub song_id: String,
    pub created_at: u64,
}

pub fn stable_id(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

pub fn song_id(owner_id: &str, file_path: &str) -> String {
    stable_id(&format!("{}\x1f{}", owner_id, file_path))
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::{song_id, stable_id};

    #[test]
    fn stable_id_is_deterministic() {
        let first = stable_id("user-1\x1f/music/song.mp3");
        let second = stable_id("user-1\x1f/music/song.mp3");
        assert_eq!(first, second);
        assert_ne!(first, stable_id("user-1\x1f/music/other.mp3"));
    }

    #[test]
    fn song_id_scoped_per_owner() {
        let path = "/music/shared.mp3";
        assert_ne!(song_id("user-1", path), song_id("user-2", path));
    }
}
