pub mod auth;
pub mod playlists;
pub mod songs;

use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

use crate::auth::extract_token;
use crate::state::{AppState, AuthContext, OkResponse};
use crate::utils::json_error_response;

pub fn api_router(state: AppState) -> Router {
    let open = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout));

    let protected = Router::new()
        .route("/songs", get(songs::list_songs))
        .route("/songs/scan", post(songs::scan_library))
        .route("/songs/recent", get(songs::recently_played))
        .route("/songs/favorites", get(songs::list_favorites))
        .route("/songs/:song_id", get(songs::get_song))
        .route("/songs/:song_id/stream", get(songs::stream_song))
        .route("/songs/:song_id/play", post(songs::record_play))
        .route("/songs/:song_id/favorite", post(songs::toggle_favorite))
        .route("/playlists", get(playlists::list_playlists))
        .route("/playlists", post(playlists::create_playlist))
        .route("/playlists/:playlist_id", get(playlists::get_playlist))
        .route(
            "/playlists/:playlist_id",
            delete(playlists::delete_playlist),
        )
        .route("/playlists/:playlist_id/songs", post(playlists::add_song))
        .route(
            "/playlists/:playlist_id/songs/:song_id",
            delete(playlists::remove_song),
        )
        .route("/playlists/:playlist_id/reorder", post(playlists::reorder))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .merge(open)
        .merge(protected)
        .with_state(state)
}

async fn require_auth(
    State(state): State<AppState>,
    mut req: axum::http::Request<Body>,
    next: Next,
) -> Response {
    let has_users = match state.auth.has_any_user() {
        Ok(value) => value,
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("auth db error: {}", err),
            );
        }
    };
    if !has_users {
        return json_error_response(StatusCode::SERVICE_UNAVAILABLE, "no accounts registered yet");
    }

    let token = match extract_token(req.headers()) {
        Some(token) => token,
        None => return json_error_response(StatusCode::UNAUTHORIZED, "unauthorized"),
    };

    match state.auth.user_from_token(&token) {
        Ok(Some(user)) => {
            req.extensions_mut().insert(AuthContext { user });
            next.run(req).await
        }
        Ok(None) => json_error_response(StatusCode::UNAUTHORIZED, "unauthorized"),
        Err(err) => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("auth error: {}", err),
        ),
    }
}

async fn health() -> impl IntoResponse {
    Json(OkResponse { status: "ok" })
}
