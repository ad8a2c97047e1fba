use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use common::Song;
use serde::{Deserialize, Serialize};
use store::MusicStore;

use crate::artwork::ArtworkResolver;
use crate::auth::{AuthStore, AuthUser};
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: MusicStore,
    pub auth: AuthStore,
    pub config: Arc<ServerConfig>,
    /// None when artwork resolution is disabled in the config.
    pub artwork: Option<ArtworkResolver>,
    pub music_root: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub status: &'static str,
}

#[derive(Clone)]
pub struct AuthContext {
    pub user: AuthUser,
}

#[derive(Serialize)]
pub struct SongView {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_art_url: Option<String>,
    pub created_at: u64,
    pub favorite: bool,
}

impl SongView {
    pub fn from_song(song: Song, favorite: bool) -> Self {
        Self {
            id: song.id,
            title: song.title,
            artist: song.artist,
            album: song.album,
            album_art_url: song.album_art_url,
            created_at: song.created_at,
            favorite,
        }
    }
}

#[derive(Serialize)]
pub struct SongPage {
    pub items: Vec<SongView>,
    pub total: usize,
    pub page: usize,
    pub page_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SongListQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
}

#[derive(Serialize)]
pub struct PlaylistView {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    pub song_count: usize,
}

#[derive(Serialize)]
pub struct PlaylistDetail {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    pub songs: Vec<SongView>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddPlaylistSongRequest {
    pub song_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderPlaylistRequest {
    pub song_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct FavoriteToggleResponse {
    pub favorite: bool,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: u64,
    pub token_type: &'static str,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
