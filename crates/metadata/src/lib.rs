use std::path::Path;

use lofty::error::LoftyError;
use lofty::prelude::{ItemKey, TaggedFileExt};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Debug, Default, Clone)]
pub struct SongTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

pub fn read_song_tags(path: &Path) -> Result<SongTags, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;

    let mut tags = SongTags::default();

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        tags.title = tag.get_string(&ItemKey::TrackTitle).and_then(clean);
        let album_artist = tag.get_string(&ItemKey::AlbumArtist).and_then(clean);
        let track_artist = tag.get_string(&ItemKey::TrackArtist).and_then(clean);
        tags.artist = track_artist.or(album_artist);
        tags.album = tag.get_string(&ItemKey::AlbumTitle).and_then(clean);
    }

    Ok(tags)
}

/// Title fallback when the tag is absent or blank: the file name without its
/// extension.
pub fn title_or_file_stem(title: Option<String>, path: &Path) -> String {
    match title {
        Some(value) => value,
        None => file_stem(path),
    }
}

pub fn artist_or_unknown(artist: Option<String>) -> String {
    artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
}

pub fn album_or_unknown(album: Option<String>) -> String {
    album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
}

fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown Track".to_string())
}

#[cfg(test)]
mod tests {
    use super::{album_or_unknown, artist_or_unknown, title_or_file_stem};
    use std::path::Path;

    #[test]
    fn title_falls_back_to_file_stem() {
        let path = Path::new("/music/03 - Daydream.mp3");
        assert_eq!(title_or_file_stem(None, path), "03 - Daydream");
        assert_eq!(
            title_or_file_stem(Some("Daydream".to_string()), path),
            "Daydream"
        );
    }

    #[test]
    fn artist_and_album_fall_back_to_unknown() {
        assert_eq!(artist_or_unknown(None), "Unknown Artist");
        assert_eq!(album_or_unknown(None), "Unknown Album");
        assert_eq!(artist_or_unknown(Some("Nina".to_string())), "Nina");
    }
}
