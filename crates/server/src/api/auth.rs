use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};

use crate::auth::{extract_token, AuthError};
use crate::state::{AppState, JsonResult, LoginRequest, LoginResponse, RegisterRequest};
use crate::utils::{json_error, json_error_response, json_ok_response};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> JsonResult<LoginResponse> {
    let user = match state.auth.create_user(&payload.username, &payload.password) {
        Ok(user) => user,
        Err(AuthError::UserExists) => {
            return Err(json_error(StatusCode::CONFLICT, "username already taken"))
        }
        Err(err @ (AuthError::InvalidUsername | AuthError::InvalidPassword)) => {
            return Err(json_error(StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(err) => {
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("auth error: {}", err),
            ))
        }
    };

    session_response(&state, &user.id)
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> JsonResult<LoginResponse> {
    if !state.auth.has_any_user().unwrap_or(false) {
        return Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no accounts registered yet",
        ));
    }

    let user = match state.auth.authenticate(&payload.username, &payload.password) {
        Ok(Some(user)) => user,
        Ok(None) => return Err(json_error(StatusCode::UNAUTHORIZED, "invalid credentials")),
        Err(err) => {
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("auth error: {}", err),
            ))
        }
    };

    session_response(&state, &user.id)
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = match extract_token(&headers) {
        Some(token) => token,
        None => return json_error_response(StatusCode::BAD_REQUEST, "missing token"),
    };

    if let Err(err) = state.auth.revoke_session(&token) {
        return json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("auth error: {}", err),
        );
    }

    json_ok_response()
}

fn session_response(state: &AppState, user_id: &str) -> JsonResult<LoginResponse> {
    let session = match state.auth.create_session(user_id) {
        Ok(session) => session,
        Err(err) => {
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("auth error: {}", err),
            ))
        }
    };

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        token_type: "Bearer",
    }))
}
