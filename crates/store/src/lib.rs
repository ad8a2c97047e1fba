use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use common::{now_secs, song_id, Favorite, PlayRecord, Playlist, PlaylistEntry, Song};
use metadata::{album_or_unknown, artist_or_unknown, read_song_tags, title_or_file_stem, SongTags};
use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
    TransactionError,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;
use walkdir::WalkDir;

const KEY_SEP: char = '\x1f';

/// Songs per page for the library listing.
pub const PAGE_SIZE: usize = 12;

/// How many play records are scanned when building the recently-played list,
/// and how many distinct songs it may contain.
const RECENT_SCAN_LIMIT: usize = 50;
const RECENT_SONG_LIMIT: usize = 20;

const SONGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("songs");
const SONG_PATHS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("song_paths");
const PLAYLISTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("playlists");
const PLAYLIST_ENTRIES_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("playlist_entries");
const PLAYS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("plays");
const FAVORITES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("favorites");

#[derive(Clone)]
pub struct MusicStore {
    db: Arc<Database>,
}

/// A new file found by a scan, before artwork resolution. Tag fallbacks are
/// already applied.
#[derive(Clone, Debug)]
pub struct SongDraft {
    pub file_path: String,
    pub title: String,
    pub artist: String,
    pub album: String,
}

#[derive(Debug, Default)]
pub struct StagedScan {
    pub drafts: Vec<SongDraft>,
    pub skipped: usize,
}

impl SongDraft {
    pub fn into_song(self, owner_id: &str, album_art_url: Option<String>) -> Song {
        Song {
            id: song_id(owner_id, &self.file_path),
            title: self.title,
            artist: self.artist,
            album: self.album,
            file_path: self.file_path,
            owner_id: owner_id.to_string(),
            album_art_url,
            created_at: now_secs(),
        }
    }
}

impl MusicStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Self::open_db(path)?;
        let store = Self::new(db);
        store.init_tables()?;
        Ok(store)
    }

    pub fn open_db(path: &Path) -> Result<Arc<Database>, StoreError> {
        Ok(Arc::new(open_or_create_db(path)?))
    }

    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn init_tables(&self) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(SONGS_TABLE)?;
            let _ = write_txn.open_table(SONG_PATHS_TABLE)?;
            let _ = write_txn.open_table(PLAYLISTS_TABLE)?;
            let _ = write_txn.open_table(PLAYLIST_ENTRIES_TABLE)?;
            let _ = write_txn.open_table(PLAYS_TABLE)?;
            let _ = write_txn.open_table(FAVORITES_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ---- songs ----

    /// Walks the music root and returns drafts for every audio file this user
    /// has not imported yet. Files whose tags cannot be read are skipped.
    pub fn stage_new_songs(&self, root: &Path, owner_id: &str) -> Result<StagedScan, StoreError> {
        let read_txn = self.db.begin_read()?;
        let paths = read_txn.open_table(SONG_PATHS_TABLE)?;

        let mut staged = StagedScan::default();
        for file in collect_audio_files(root) {
            let file_path = file.to_string_lossy().to_string();
            let key = path_key(owner_id, &file_path);
            if paths.get(key.as_str())?.is_some() {
                staged.skipped += 1;
                continue;
            }
            let tags = match read_song_tags(&file) {
                Ok(tags) => tags,
                Err(err) => {
                    warn!("Skipping unreadable file {:?}: {}", file, err);
                    continue;
                }
            };
            staged.drafts.push(draft_from_tags(&file, tags));
        }
        Ok(staged)
    }

    /// Batch insert; also records each song's path so later scans skip it.
    pub fn insert_songs(&self, songs: &[Song]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut song_table = write_txn.open_table(SONGS_TABLE)?;
            let mut path_table = write_txn.open_table(SONG_PATHS_TABLE)?;
            for song in songs {
                let bytes = encode_value(song)?;
                song_table.insert(song.id.as_str(), bytes.as_slice())?;
                let key = path_key(&song.owner_id, &song.file_path);
                path_table.insert(key.as_str(), song.id.as_bytes())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn has_song_at_path(&self, owner_id: &str, file_path: &str) -> Result<bool, StoreError> {
        let read_txn = self.db.begin_read()?;
        let paths = read_txn.open_table(SONG_PATHS_TABLE)?;
        let key = path_key(owner_id, file_path);
        let found = paths.get(key.as_str())?.is_some();
        Ok(found)
    }

    pub fn get_song(&self, song_id: &str) -> Result<Option<Song>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SONGS_TABLE)?;
        let song = match table.get(song_id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(song)
    }

    /// Ownership guard used by every per-song operation. A song that does not
    /// exist and a song owned by another user are indistinguishable to the
    /// caller.
    pub fn song_for_user(&self, song_id: &str, user_id: &str) -> Result<Option<Song>, StoreError> {
        let song = self.get_song(song_id)?;
        Ok(song.filter(|song| song.owner_id == user_id))
    }

    /// Case-insensitive substring search over title/artist/album, sorted by
    /// title. `page` is 1-based.
    pub fn list_songs(
        &self,
        user_id: &str,
        search: Option<&str>,
        page: usize,
    ) -> Result<(Vec<Song>, usize), StoreError> {
        let mut songs = self.songs_for_user(user_id)?;

        if let Some(needle) = search.map(str::trim).filter(|value| !value.is_empty()) {
            let needle = needle.to_lowercase();
            songs.retain(|song| {
                song.title.to_lowercase().contains(&needle)
                    || song.artist.to_lowercase().contains(&needle)
                    || song.album.to_lowercase().contains(&needle)
            });
        }

        songs.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        let total = songs.len();
        let page = page.max(1);
        let items = songs
            .into_iter()
            .skip((page - 1) * PAGE_SIZE)
            .take(PAGE_SIZE)
            .collect();
        Ok((items, total))
    }

    fn songs_for_user(&self, user_id: &str) -> Result<Vec<Song>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SONGS_TABLE)?;
        let mut songs = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let song: Song = decode_value(entry.1.value())?;
            if song.owner_id == user_id {
                songs.push(song);
            }
        }
        Ok(songs)
    }

    // ---- play history ----

    pub fn record_play(&self, user_id: &str, song_id: &str) -> Result<PlayRecord, StoreError> {
        let record = PlayRecord {
            id: format!("{:030}-{}", now_nanos(), Uuid::new_v4()),
            user_id: user_id.to_string(),
            song_id: song_id.to_string(),
            played_at: now_secs(),
        };
        let key = play_key(user_id, &record.id);
        let bytes = encode_value(&record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PLAYS_TABLE)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(record)
    }

    /// Distinct songs from the newest play records, newest first. Records
    /// whose song has disappeared are ignored.
    pub fn recently_played(&self, user_id: &str) -> Result<Vec<Song>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let plays = read_txn.open_table(PLAYS_TABLE)?;
        let songs = read_txn.open_table(SONGS_TABLE)?;

        let prefix = prefix_key(user_id);
        let mut end = prefix.clone();
        end.push('\u{10ffff}');

        // Keys are time-ordered within the user prefix.
        let mut records: Vec<PlayRecord> = Vec::new();
        for entry in plays.range(prefix.as_str()..end.as_str())? {
            let entry = entry?;
            records.push(decode_value(entry.1.value())?);
        }

        let mut seen = HashSet::new();
        let mut recent = Vec::new();
        for record in records.iter().rev().take(RECENT_SCAN_LIMIT) {
            if !seen.insert(record.song_id.as_str()) {
                continue;
            }
            if let Some(value) = songs.get(record.song_id.as_str())? {
                recent.push(decode_value(value.value())?);
            }
            if recent.len() >= RECENT_SONG_LIMIT {
                break;
            }
        }
        Ok(recent)
    }

    // ---- favorites ----

    /// Returns true when the song is now favorited.
    pub fn toggle_favorite(&self, user_id: &str, song_id: &str) -> Result<bool, StoreError> {
        let key = favorite_key(user_id, song_id);
        let write_txn = self.db.begin_write()?;
        let now_favorite;
        {
            let mut table = write_txn.open_table(FAVORITES_TABLE)?;
            if table.remove(key.as_str())?.is_some() {
                now_favorite = false;
            } else {
                let favorite = Favorite {
                    user_id: user_id.to_string(),
                    song_id: song_id.to_string(),
                    created_at: now_secs(),
                };
                let bytes = encode_value(&favorite)?;
                table.insert(key.as_str(), bytes.as_slice())?;
                now_favorite = true;
            }
        }
        write_txn.commit()?;
        Ok(now_favorite)
    }

    pub fn is_favorite(&self, user_id: &str, song_id: &str) -> Result<bool, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FAVORITES_TABLE)?;
        let key = favorite_key(user_id, song_id);
        let found = table.get(key.as_str())?.is_some();
        Ok(found)
    }

    /// The user's favorited songs, most recently favorited first.
    pub fn list_favorites(&self, user_id: &str) -> Result<Vec<Song>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let favorites = read_txn.open_table(FAVORITES_TABLE)?;
        let songs = read_txn.open_table(SONGS_TABLE)?;

        let prefix = prefix_key(user_id);
        let mut end = prefix.clone();
        end.push('\u{10ffff}');

        let mut found: Vec<(u64, Song)> = Vec::new();
        for entry in favorites.range(prefix.as_str()..end.as_str())? {
            let entry = entry?;
            let favorite: Favorite = decode_value(entry.1.value())?;
            if let Some(value) = songs.get(favorite.song_id.as_str())? {
                found.push((favorite.created_at, decode_value(value.value())?));
            }
        }
        found.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(found.into_iter().map(|(_, song)| song).collect())
    }

    // ---- playlists ----

    pub fn create_playlist(&self, owner_id: &str, name: &str) -> Result<Playlist, StoreError> {
        let playlist = Playlist {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            created_at: now_secs(),
        };
        let bytes = encode_value(&playlist)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PLAYLISTS_TABLE)?;
            table.insert(playlist.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(playlist)
    }

    pub fn list_playlists(&self, owner_id: &str) -> Result<Vec<Playlist>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLAYLISTS_TABLE)?;
        let mut playlists = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let playlist: Playlist = decode_value(entry.1.value())?;
            if playlist.owner_id == owner_id {
                playlists.push(playlist);
            }
        }
        playlists.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(playlists)
    }

    /// Same guard semantics as [`MusicStore::song_for_user`].
    pub fn playlist_for_user(
        &self,
        playlist_id: &str,
        user_id: &str,
    ) -> Result<Option<Playlist>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLAYLISTS_TABLE)?;
        let playlist: Option<Playlist> = match table.get(playlist_id)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        Ok(playlist.filter(|playlist| playlist.owner_id == user_id))
    }

    /// Removes the playlist and every membership entry under it.
    pub fn delete_playlist(&self, playlist_id: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut playlists = write_txn.open_table(PLAYLISTS_TABLE)?;
            playlists.remove(playlist_id)?;

            let mut entries = write_txn.open_table(PLAYLIST_ENTRIES_TABLE)?;
            let prefix = prefix_key(playlist_id);
            let mut end = prefix.clone();
            end.push('\u{10ffff}');
            let mut keys = Vec::new();
            for entry in entries.range(prefix.as_str()..end.as_str())? {
                let entry = entry?;
                keys.push(entry.0.value().to_string());
            }
            for key in keys {
                entries.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Appends a song to the playlist. Adding a song that is already a member
    /// is a conflict and leaves the playlist unchanged.
    pub fn add_playlist_entry(
        &self,
        playlist_id: &str,
        song_id: &str,
    ) -> Result<PlaylistEntry, StoreError> {
        let key = entry_key(playlist_id, song_id);
        let write_txn = self.db.begin_write()?;
        let entry;
        {
            let mut table = write_txn.open_table(PLAYLIST_ENTRIES_TABLE)?;
            if table.get(key.as_str())?.is_some() {
                return Err(StoreError::DuplicateEntry);
            }

            let prefix = prefix_key(playlist_id);
            let mut end = prefix.clone();
            end.push('\u{10ffff}');
            let mut next_position: u32 = 0;
            for existing in table.range(prefix.as_str()..end.as_str())? {
                let existing = existing?;
                let current: PlaylistEntry = decode_value(existing.1.value())?;
                next_position = next_position.max(current.position + 1);
            }

            entry = PlaylistEntry {
                id: Uuid::new_v4().to_string(),
                playlist_id: playlist_id.to_string(),
                song_id: song_id.to_string(),
                position: next_position,
            };
            let bytes = encode_value(&entry)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(entry)
    }

    /// Returns false when the song was not a member.
    pub fn remove_playlist_entry(
        &self,
        playlist_id: &str,
        song_id: &str,
    ) -> Result<bool, StoreError> {
        let key = entry_key(playlist_id, song_id);
        let write_txn = self.db.begin_write()?;
        let removed;
        {
            let mut table = write_txn.open_table(PLAYLIST_ENTRIES_TABLE)?;
            removed = table.remove(key.as_str())?.is_some();
        }
        write_txn.commit()?;
        Ok(removed)
    }

    pub fn playlist_entries(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PLAYLIST_ENTRIES_TABLE)?;
        let prefix = prefix_key(playlist_id);
        let mut end = prefix.clone();
        end.push('\u{10ffff}');
        let mut entries = Vec::new();
        for entry in table.range(prefix.as_str()..end.as_str())? {
            let entry = entry?;
            entries.push(decode_value::<PlaylistEntry>(entry.1.value())?);
        }
        entries.sort_by_key(|entry| entry.position);
        Ok(entries)
    }

    /// The playlist's songs in position order.
    pub fn playlist_songs(&self, playlist_id: &str) -> Result<Vec<Song>, StoreError> {
        let entries = self.playlist_entries(playlist_id)?;
        let read_txn = self.db.begin_read()?;
        let songs = read_txn.open_table(SONGS_TABLE)?;
        let mut out = Vec::new();
        for entry in entries {
            if let Some(value) = songs.get(entry.song_id.as_str())? {
                out.push(decode_value(value.value())?);
            }
        }
        Ok(out)
    }

    /// Rewrites positions from the submitted order. Submitted ids that are
    /// not members are ignored; members missing from the submission keep
    /// their relative order after the submitted ones.
    pub fn reorder_playlist(
        &self,
        playlist_id: &str,
        song_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut remaining = self.playlist_entries(playlist_id)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PLAYLIST_ENTRIES_TABLE)?;
            let mut next_position: u32 = 0;
            for song_id in song_ids {
                let Some(idx) = remaining.iter().position(|entry| &entry.song_id == song_id)
                else {
                    continue;
                };
                let mut entry = remaining.remove(idx);
                entry.position = next_position;
                next_position += 1;
                let key = entry_key(playlist_id, &entry.song_id);
                let bytes = encode_value(&entry)?;
                table.insert(key.as_str(), bytes.as_slice())?;
            }
            for mut entry in remaining {
                entry.position = next_position;
                next_position += 1;
                let key = entry_key(playlist_id, &entry.song_id);
                let bytes = encode_value(&entry)?;
                table.insert(key.as_str(), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

pub fn draft_from_tags(path: &Path, tags: SongTags) -> SongDraft {
    SongDraft {
        file_path: path.to_string_lossy().to_string(),
        title: title_or_file_stem(tags.title, path),
        artist: artist_or_unknown(tags.artist),
        album: album_or_unknown(tags.album),
    }
}

fn collect_audio_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Scan walk error: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_audio_file(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

fn is_audio_file(path: &Path) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    matches!(
        ext.to_string_lossy().to_ascii_lowercase().as_str(),
        "mp3" | "flac"
    )
}

fn open_or_create_db(path: &Path) -> Result<Database, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(value)?)
}

fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}

fn prefix_key(prefix: &str) -> String {
    let mut out = String::new();
    out.push_str(prefix);
    out.push(KEY_SEP);
    out
}

fn path_key(owner_id: &str, file_path: &str) -> String {
    let mut out = prefix_key(owner_id);
    out.push_str(file_path);
    out
}

fn favorite_key(user_id: &str, song_id: &str) -> String {
    let mut out = prefix_key(user_id);
    out.push_str(song_id);
    out
}

fn entry_key(playlist_id: &str, song_id: &str) -> String {
    let mut out = prefix_key(playlist_id);
    out.push_str(song_id);
    out
}

fn play_key(user_id: &str, record_id: &str) -> String {
    let mut out = prefix_key(user_id);
    out.push_str(record_id);
    out
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_nanos())
        .unwrap_or(0)
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    DuplicateEntry,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "io error: {}", err),
            StoreError::Redb(err) => write!(f, "db error: {}", err),
            StoreError::Bincode(err) => write!(f, "bincode error: {}", err),
            StoreError::DuplicateEntry => write!(f, "song already in playlist"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<Box<bincode::ErrorKind>> for StoreError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        StoreError::Bincode(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Redb(err)
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<TableError> for StoreError {
    fn from(err: TableError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<CommitError> for StoreError {
    fn from(err: CommitError) -> Self {
        StoreError::Redb(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::{draft_from_tags, MusicStore, StoreError, PAGE_SIZE};
    use common::{now_secs, song_id, Song};
    use metadata::SongTags;
    use std::path::Path;
    use tempfile::TempDir;

    fn test_store() -> (MusicStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MusicStore::open(&dir.path().join("music.redb")).unwrap();
        (store, dir)
    }

    fn song(owner: &str, path: &str, title: &str) -> Song {
        Song {
            id: song_id(owner, path),
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            file_path: path.to_string(),
            owner_id: owner.to_string(),
            album_art_url: None,
            created_at: now_secs(),
        }
    }

    #[test]
    fn ownership_guard_hides_missing_and_foreign_songs() {
        let (store, _dir) = test_store();
        let owned = song("u1", "/music/a.mp3", "Alpha");
        store.insert_songs(&[owned.clone()]).unwrap();

        assert!(store.song_for_user(&owned.id, "u1").unwrap().is_some());
        assert!(store.song_for_user(&owned.id, "u2").unwrap().is_none());
        assert!(store.song_for_user("missing", "u1").unwrap().is_none());
    }

    #[test]
    fn path_uniqueness_is_scoped_per_owner() {
        let (store, _dir) = test_store();
        store
            .insert_songs(&[song("u1", "/music/shared.mp3", "Shared")])
            .unwrap();

        assert!(store.has_song_at_path("u1", "/music/shared.mp3").unwrap());
        assert!(!store.has_song_at_path("u2", "/music/shared.mp3").unwrap());
    }

    #[test]
    fn list_songs_paginates_and_searches() {
        let (store, _dir) = test_store();
        let songs: Vec<Song> = (0..15)
            .map(|i| {
                song(
                    "u1",
                    &format!("/music/{:02}.mp3", i),
                    &format!("Track {:02}", i),
                )
            })
            .collect();
        store.insert_songs(&songs).unwrap();

        let (page_one, total) = store.list_songs("u1", None, 1).unwrap();
        assert_eq!(total, 15);
        assert_eq!(page_one.len(), PAGE_SIZE);
        assert_eq!(page_one[0].title, "Track 00");

        let (page_two, _) = store.list_songs("u1", None, 2).unwrap();
        assert_eq!(page_two.len(), 3);

        let (matched, matched_total) = store.list_songs("u1", Some("track 03"), 1).unwrap();
        assert_eq!(matched_total, 1);
        assert_eq!(matched[0].title, "Track 03");

        let (other_user, _) = store.list_songs("u2", None, 1).unwrap();
        assert!(other_user.is_empty());
    }

    #[test]
    fn favorite_toggle_alternates_per_user() {
        let (store, _dir) = test_store();
        let track = song("u1", "/music/a.mp3", "Alpha");
        store.insert_songs(&[track.clone()]).unwrap();

        assert!(store.toggle_favorite("u1", &track.id).unwrap());
        assert!(store.is_favorite("u1", &track.id).unwrap());
        assert!(!store.is_favorite("u2", &track.id).unwrap());
        assert!(!store.toggle_favorite("u1", &track.id).unwrap());
        assert!(!store.is_favorite("u1", &track.id).unwrap());
    }

    #[test]
    fn recently_played_is_distinct_and_newest_first() {
        let (store, _dir) = test_store();
        let a = song("u1", "/music/a.mp3", "Alpha");
        let b = song("u1", "/music/b.mp3", "Beta");
        store.insert_songs(&[a.clone(), b.clone()]).unwrap();

        store.record_play("u1", &a.id).unwrap();
        store.record_play("u1", &a.id).unwrap();
        store.record_play("u1", &b.id).unwrap();

        let recent = store.recently_played("u1").unwrap();
        let ids: Vec<&str> = recent.iter().map(|song| song.id.as_str()).collect();
        assert_eq!(ids, vec![b.id.as_str(), a.id.as_str()]);

        assert!(store.recently_played("u2").unwrap().is_empty());
    }

    #[test]
    fn recently_played_caps_distinct_songs() {
        let (store, _dir) = test_store();
        let songs: Vec<Song> = (0..25)
            .map(|i| song("u1", &format!("/music/{:02}.mp3", i), &format!("T{}", i)))
            .collect();
        store.insert_songs(&songs).unwrap();
        for track in &songs {
            store.record_play("u1", &track.id).unwrap();
        }

        assert_eq!(store.recently_played("u1").unwrap().len(), 20);
    }

    #[test]
    fn duplicate_playlist_entry_is_a_conflict() {
        let (store, _dir) = test_store();
        let track = song("u1", "/music/a.mp3", "Alpha");
        store.insert_songs(&[track.clone()]).unwrap();
        let playlist = store.create_playlist("u1", "Mix").unwrap();

        let first = store.add_playlist_entry(&playlist.id, &track.id).unwrap();
        assert_eq!(first.position, 0);

        let err = store
            .add_playlist_entry(&playlist.id, &track.id)
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEntry));
        assert_eq!(store.playlist_entries(&playlist.id).unwrap().len(), 1);
    }

    #[test]
    fn entries_get_increasing_positions() {
        let (store, _dir) = test_store();
        let a = song("u1", "/music/a.mp3", "Alpha");
        let b = song("u1", "/music/b.mp3", "Beta");
        store.insert_songs(&[a.clone(), b.clone()]).unwrap();
        let playlist = store.create_playlist("u1", "Mix").unwrap();

        store.add_playlist_entry(&playlist.id, &a.id).unwrap();
        let second = store.add_playlist_entry(&playlist.id, &b.id).unwrap();
        assert_eq!(second.position, 1);

        let ordered = store.playlist_songs(&playlist.id).unwrap();
        assert_eq!(ordered[0].id, a.id);
        assert_eq!(ordered[1].id, b.id);
    }

    #[test]
    fn reorder_rewrites_positions_not_ids() {
        let (store, _dir) = test_store();
        let a = song("u1", "/music/a.mp3", "Alpha");
        let b = song("u1", "/music/b.mp3", "Beta");
        let c = song("u1", "/music/c.mp3", "Gamma");
        store
            .insert_songs(&[a.clone(), b.clone(), c.clone()])
            .unwrap();
        let playlist = store.create_playlist("u1", "Mix").unwrap();
        for track in [&a, &b, &c] {
            store.add_playlist_entry(&playlist.id, &track.id).unwrap();
        }
        let ids_before: Vec<String> = store
            .playlist_entries(&playlist.id)
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect();

        store
            .reorder_playlist(&playlist.id, &[c.id.clone(), a.id.clone()])
            .unwrap();

        let entries = store.playlist_entries(&playlist.id).unwrap();
        let order: Vec<&str> = entries.iter().map(|entry| entry.song_id.as_str()).collect();
        assert_eq!(order, vec![c.id.as_str(), a.id.as_str(), b.id.as_str()]);
        assert_eq!(
            entries.iter().map(|entry| entry.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        let mut ids_after: Vec<String> =
            entries.into_iter().map(|entry| entry.id).collect();
        let mut ids_before = ids_before;
        ids_before.sort();
        ids_after.sort();
        assert_eq!(ids_before, ids_after);
    }

    #[test]
    fn delete_playlist_cascades_entries() {
        let (store, _dir) = test_store();
        let track = song("u1", "/music/a.mp3", "Alpha");
        store.insert_songs(&[track.clone()]).unwrap();
        let playlist = store.create_playlist("u1", "Mix").unwrap();
        store.add_playlist_entry(&playlist.id, &track.id).unwrap();

        store.delete_playlist(&playlist.id).unwrap();

        assert!(store.playlist_for_user(&playlist.id, "u1").unwrap().is_none());
        assert!(store.playlist_entries(&playlist.id).unwrap().is_empty());
    }

    #[test]
    fn draft_applies_tag_fallbacks() {
        let tagged = draft_from_tags(
            Path::new("/music/01 - Daydream.mp3"),
            SongTags {
                title: Some("Daydream".to_string()),
                artist: Some("Nina".to_string()),
                album: Some("Blue".to_string()),
            },
        );
        assert_eq!(tagged.title, "Daydream");
        assert_eq!(tagged.artist, "Nina");

        let untagged = draft_from_tags(Path::new("/music/01 - Daydream.mp3"), SongTags::default());
        assert_eq!(untagged.title, "01 - Daydream");
        assert_eq!(untagged.artist, "Unknown Artist");
        assert_eq!(untagged.album, "Unknown Album");
    }

    #[test]
    fn staged_scan_skips_nothing_in_empty_dir() {
        let (store, dir) = test_store();
        let staged = store.stage_new_songs(dir.path(), "u1").unwrap();
        assert!(staged.drafts.is_empty());
        assert_eq!(staged.skipped, 0);
    }

    #[test]
    fn rescan_skips_already_imported_paths() {
        let (store, dir) = test_store();
        let file = dir.path().join("a.mp3");
        std::fs::write(&file, b"not really audio").unwrap();
        let path = file.to_string_lossy().to_string();
        store.insert_songs(&[song("u1", &path, "Alpha")]).unwrap();

        // The path check runs before tag parsing, so the garbage bytes
        // never matter for the importing user.
        let staged = store.stage_new_songs(dir.path(), "u1").unwrap();
        assert!(staged.drafts.is_empty());
        assert_eq!(staged.skipped, 1);

        // Another user has not imported this path; nothing is skipped, and
        // the unreadable file is dropped at the tag-reading step instead.
        let other = store.stage_new_songs(dir.path(), "u2").unwrap();
        assert_eq!(other.skipped, 0);
        assert!(other.drafts.is_empty());
    }
}
