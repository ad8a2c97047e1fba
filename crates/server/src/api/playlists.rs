use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use common::Playlist;
use store::StoreError;

use crate::api::songs::store_error;
use crate::state::{
    AddPlaylistSongRequest, AppState, AuthContext, CreatePlaylistRequest, ErrorResponse,
    JsonResult, PlaylistDetail, PlaylistView, ReorderPlaylistRequest, SongView,
};
use crate::utils::{json_error, json_error_response, json_ok_response};

pub async fn list_playlists(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> JsonResult<Vec<PlaylistView>> {
    let playlists = match state.store.list_playlists(&auth.user.id) {
        Ok(playlists) => playlists,
        Err(err) => return Err(store_error(err)),
    };

    let mut views = Vec::with_capacity(playlists.len());
    for playlist in playlists {
        let song_count = match state.store.playlist_entries(&playlist.id) {
            Ok(entries) => entries.len(),
            Err(err) => return Err(store_error(err)),
        };
        views.push(playlist_view(playlist, song_count));
    }
    Ok(Json(views))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreatePlaylistRequest>,
) -> JsonResult<PlaylistView> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "playlist name must not be empty",
        ));
    }

    match state.store.create_playlist(&auth.user.id, name) {
        Ok(playlist) => Ok(Json(playlist_view(playlist, 0))),
        Err(err) => Err(store_error(err)),
    }
}

pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(playlist_id): Path<String>,
) -> JsonResult<PlaylistDetail> {
    let playlist = owned_playlist(&state, &playlist_id, &auth.user.id)?;
    let songs = match state.store.playlist_songs(&playlist.id) {
        Ok(songs) => songs,
        Err(err) => return Err(store_error(err)),
    };

    let mut views = Vec::with_capacity(songs.len());
    for song in songs {
        let favorite = match state.store.is_favorite(&auth.user.id, &song.id) {
            Ok(favorite) => favorite,
            Err(err) => return Err(store_error(err)),
        };
        views.push(SongView::from_song(song, favorite));
    }

    Ok(Json(PlaylistDetail {
        id: playlist.id,
        name: playlist.name,
        created_at: playlist.created_at,
        songs: views,
    }))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(playlist_id): Path<String>,
) -> Response {
    let playlist = match state.store.playlist_for_user(&playlist_id, &auth.user.id) {
        Ok(Some(playlist)) => playlist,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "playlist not found"),
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("store error: {}", err),
            )
        }
    };

    if let Err(err) = state.store.delete_playlist(&playlist.id) {
        return json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("store error: {}", err),
        );
    }
    json_ok_response()
}

/// Both the playlist and the song must pass the caller's ownership guard.
pub async fn add_song(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(playlist_id): Path<String>,
    Json(payload): Json<AddPlaylistSongRequest>,
) -> Response {
    let playlist = match state.store.playlist_for_user(&playlist_id, &auth.user.id) {
        Ok(Some(playlist)) => playlist,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "playlist not found"),
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("store error: {}", err),
            )
        }
    };
    let song = match state.store.song_for_user(&payload.song_id, &auth.user.id) {
        Ok(Some(song)) => song,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "song not found"),
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("store error: {}", err),
            )
        }
    };

    match state.store.add_playlist_entry(&playlist.id, &song.id) {
        Ok(_) => json_ok_response(),
        Err(StoreError::DuplicateEntry) => {
            json_error_response(StatusCode::CONFLICT, "song already in playlist")
        }
        Err(err) => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("store error: {}", err),
        ),
    }
}

pub async fn remove_song(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((playlist_id, song_id)): Path<(String, String)>,
) -> Response {
    let playlist = match state.store.playlist_for_user(&playlist_id, &auth.user.id) {
        Ok(Some(playlist)) => playlist,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "playlist not found"),
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("store error: {}", err),
            )
        }
    };

    match state.store.remove_playlist_entry(&playlist.id, &song_id) {
        Ok(true) => json_ok_response(),
        Ok(false) => json_error_response(StatusCode::NOT_FOUND, "song not in playlist"),
        Err(err) => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("store error: {}", err),
        ),
    }
}

pub async fn reorder(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(playlist_id): Path<String>,
    Json(payload): Json<ReorderPlaylistRequest>,
) -> Response {
    let playlist = match state.store.playlist_for_user(&playlist_id, &auth.user.id) {
        Ok(Some(playlist)) => playlist,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "playlist not found"),
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("store error: {}", err),
            )
        }
    };

    if let Err(err) = state.store.reorder_playlist(&playlist.id, &payload.song_ids) {
        return json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("store error: {}", err),
        );
    }
    json_ok_response()
}

fn owned_playlist(
    state: &AppState,
    playlist_id: &str,
    user_id: &str,
) -> Result<Playlist, (StatusCode, Json<ErrorResponse>)> {
    match state.store.playlist_for_user(playlist_id, user_id) {
        Ok(Some(playlist)) => Ok(playlist),
        Ok(None) => Err(json_error(StatusCode::NOT_FOUND, "playlist not found")),
        Err(err) => Err(store_error(err)),
    }
}

fn playlist_view(playlist: Playlist, song_count: usize) -> PlaylistView {
    PlaylistView {
        id: playlist.id,
        name: playlist.name,
        created_at: playlist.created_at,
        song_count,
    }
}
