use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Extension, Json,
};
use common::Song;
use store::StoreError;

use crate::scan::{run_scan, ScanReport};
use crate::state::{
    AppState, AuthContext, FavoriteToggleResponse, JsonResult, SongListQuery, SongPage, SongView,
};
use crate::streaming::stream_file;
use crate::utils::{json_error, json_error_response, json_ok_response};

pub async fn list_songs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SongListQuery>,
) -> JsonResult<SongPage> {
    let page = query.page.unwrap_or(1).max(1);
    let (songs, total) = match state
        .store
        .list_songs(&auth.user.id, query.search.as_deref(), page)
    {
        Ok(result) => result,
        Err(err) => return Err(store_error(err)),
    };

    let items = song_views(&state, &auth.user.id, songs)?;
    let page_count = total.div_ceil(store::PAGE_SIZE);
    Ok(Json(SongPage {
        items,
        total,
        page,
        page_count,
    }))
}

pub async fn get_song(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(song_id): Path<String>,
) -> JsonResult<SongView> {
    let song = owned_song(&state, &song_id, &auth.user.id)?;
    let favorite = match state.store.is_favorite(&auth.user.id, &song.id) {
        Ok(favorite) => favorite,
        Err(err) => return Err(store_error(err)),
    };
    Ok(Json(SongView::from_song(song, favorite)))
}

pub async fn scan_library(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> JsonResult<ScanReport> {
    let Some(root) = state.music_root.clone() else {
        return Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "music directory must be set",
        ));
    };
    if !root.exists() {
        return Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("music directory not found: {}", root.display()),
        ));
    }

    match run_scan(
        state.store.clone(),
        state.artwork.clone(),
        state.config.scan_art_concurrency,
        root,
        auth.user.id.clone(),
    )
    .await
    {
        Ok(report) => Ok(Json(report)),
        Err(err) => Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("scan error: {}", err),
        )),
    }
}

/// Missing song, foreign song, and missing file all answer the same 404.
pub async fn stream_song(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(song_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let song = match state.store.song_for_user(&song_id, &auth.user.id) {
        Ok(Some(song)) => song,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "song not found"),
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("store error: {}", err),
            )
        }
    };

    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    match stream_file(std::path::Path::new(&song.file_path), range_header).await {
        Ok(response) => response,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            json_error_response(StatusCode::NOT_FOUND, "song not found")
        }
        Err(err) => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("stream error: {}", err),
        ),
    }
}

pub async fn record_play(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(song_id): Path<String>,
) -> Response {
    let song = match state.store.song_for_user(&song_id, &auth.user.id) {
        Ok(Some(song)) => song,
        Ok(None) => return json_error_response(StatusCode::NOT_FOUND, "song not found"),
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("store error: {}", err),
            )
        }
    };

    if let Err(err) = state.store.record_play(&auth.user.id, &song.id) {
        return json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("store error: {}", err),
        );
    }
    json_ok_response()
}

pub async fn recently_played(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> JsonResult<Vec<SongView>> {
    let songs = match state.store.recently_played(&auth.user.id) {
        Ok(songs) => songs,
        Err(err) => return Err(store_error(err)),
    };
    Ok(Json(song_views(&state, &auth.user.id, songs)?))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(song_id): Path<String>,
) -> JsonResult<FavoriteToggleResponse> {
    let song = owned_song(&state, &song_id, &auth.user.id)?;
    match state.store.toggle_favorite(&auth.user.id, &song.id) {
        Ok(favorite) => Ok(Json(FavoriteToggleResponse { favorite })),
        Err(err) => Err(store_error(err)),
    }
}

pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> JsonResult<Vec<SongView>> {
    let songs = match state.store.list_favorites(&auth.user.id) {
        Ok(songs) => songs,
        Err(err) => return Err(store_error(err)),
    };
    // All of these are favorites by construction.
    Ok(Json(
        songs
            .into_iter()
            .map(|song| SongView::from_song(song, true))
            .collect(),
    ))
}

fn owned_song(
    state: &AppState,
    song_id: &str,
    user_id: &str,
) -> Result<Song, (StatusCode, Json<crate::state::ErrorResponse>)> {
    match state.store.song_for_user(song_id, user_id) {
        Ok(Some(song)) => Ok(song),
        Ok(None) => Err(json_error(StatusCode::NOT_FOUND, "song not found")),
        Err(err) => Err(store_error(err)),
    }
}

fn song_views(
    state: &AppState,
    user_id: &str,
    songs: Vec<Song>,
) -> Result<Vec<SongView>, (StatusCode, Json<crate::state::ErrorResponse>)> {
    let mut views = Vec::with_capacity(songs.len());
    for song in songs {
        let favorite = match state.store.is_favorite(user_id, &song.id) {
            Ok(favorite) => favorite,
            Err(err) => return Err(store_error(err)),
        };
        views.push(SongView::from_song(song, favorite));
    }
    Ok(views)
}

pub(crate) fn store_error(err: StoreError) -> (StatusCode, Json<crate::state::ErrorResponse>) {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("store error: {}", err),
    )
}
