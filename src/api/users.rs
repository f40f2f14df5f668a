//! Accounts: registration, login, profile, stats and profile photos.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::auth::{hash_password, verify_password, AuthUser, SessionUser};
use crate::error::AppError;
use crate::files::{UploadError, MAX_PHOTO_BYTES};
use crate::rewards::{self, UserStats};
use crate::storage::{UserProfile, UserRecord};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MIN_PASSWORD_LEN: usize = 6;
/// Multipart overhead on top of the photo itself.
const UPLOAD_BODY_SLACK: usize = 512 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).put(update_me))
        .route(
            "/me/upload-photo",
            post(upload_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + UPLOAD_BODY_SLACK)),
        )
        .route("/{user_id}", get(profile))
        .route("/{user_id}/stats", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct RegisterReq {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile_photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResp {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserProfile,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub profile_photo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhotoResp {
    pub status: &'static str,
    pub message: &'static str,
    pub profile_photo: String,
}

fn check_username(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    let ok = USERNAME_LEN.contains(&name.chars().count())
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !ok {
        return Err(AppError::BadRequest(
            "username must be 3-32 letters, digits, '_', '-' or '.'".into(),
        ));
    }
    Ok(name.to_string())
}

fn check_email(email: &str) -> Result<String, AppError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        });
    if !valid || email.contains(char::is_whitespace) {
        return Err(AppError::BadRequest("invalid email address".into()));
    }
    Ok(email.to_string())
}

/// Blank clears the photo. External URLs pass through; a URL into our own
/// upload directory must name the caller's uploaded file.
fn check_photo_url(
    state: &AppState,
    photo: &str,
    own_upload: Option<&str>,
) -> Result<Option<String>, AppError> {
    let photo = photo.trim();
    if photo.is_empty() {
        return Ok(None);
    }
    if let Some(name) = state.photos.name_for_url(photo) {
        if own_upload != Some(name) {
            return Err(AppError::BadRequest(
                "profile_photo may only point at your own uploaded photo".into(),
            ));
        }
    }
    Ok(Some(photo.to_string()))
}

fn issue_token(state: &AppState, user: &UserRecord) -> Result<AuthResp, AppError> {
    let access_token = state.auth.create_access_token(&SessionUser::from(user))?;
    Ok(AuthResp {
        access_token,
        token_type: "bearer",
        user: UserProfile::from(user),
    })
}

async fn load_user(state: &AppState, user_id: &str) -> Result<UserRecord, AppError> {
    state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterReq>,
) -> Result<Json<AuthResp>, AppError> {
    let username = check_username(&body.username)?;
    let email = check_email(&body.email)?;
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password = body.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let mut user = UserRecord::new(username, email, hash);
    if let Some(photo) = body.profile_photo.as_deref() {
        user.profile_photo = check_photo_url(&state, photo, None)?;
    }
    state.store.create_user(user.clone()).await?;

    info!(user_id = %user.user_id, username = %user.username, "user registered");
    Ok(Json(issue_token(&state, &user)?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginReq>,
) -> Result<Json<AuthResp>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let user = state
        .store
        .find_user_by_email(body.email.trim())
        .await?
        .ok_or_else(invalid)?;

    let phc = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&body.password, &phc))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    if !ok {
        warn!(user_id = %user.user_id, "failed login");
        return Err(invalid());
    }

    info!(user_id = %user.user_id, "user logged in");
    Ok(Json(issue_token(&state, &user)?))
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let user = load_user(&state, &session.user_id).await?;
    Ok(Json(UserProfile::from(&user)))
}

pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Json(body): Json<UserUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    if body.username.is_none() && body.email.is_none() && body.profile_photo.is_none() {
        return Err(AppError::BadRequest("No valid updates provided".into()));
    }

    let mut user = load_user(&state, &session.user_id).await?;
    if let Some(name) = body.username.as_deref() {
        user.username = check_username(name)?;
    }
    if let Some(email) = body.email.as_deref() {
        user.email = check_email(email)?;
    }
    if let Some(photo) = body.profile_photo.as_deref() {
        user.profile_photo = check_photo_url(&state, photo, user.uploaded_photo.as_deref())?;
    }
    state.store.update_user(user.clone()).await?;

    info!(user_id = %user.user_id, "profile updated");
    Ok(Json(UserProfile::from(&user)))
}

pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    let user = load_user(&state, &user_id).await?;
    Ok(Json(UserProfile::from(&user)))
}

pub async fn stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserStats>, AppError> {
    rewards::user_stats(state.store.as_ref(), &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Multipart field `file`. Replaces the caller's previous upload; the old file
/// is removed only after the profile points at the new one.
pub async fn upload_photo(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<PhotoResp>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some((file_name, content_type, bytes));
        break;
    }
    let (file_name, content_type, bytes) = upload.ok_or(UploadError::Missing)?;

    let mut user = load_user(&state, &session.user_id).await?;
    let saved = state
        .photos
        .save(&user.user_id, &file_name, content_type.as_deref(), &bytes)
        .await?;

    let previous = user.uploaded_photo.replace(saved.file_name.clone());
    user.profile_photo = Some(saved.url.clone());
    if let Err(e) = state.store.update_user(user).await {
        state.photos.delete(&saved.path).await;
        return Err(e.into());
    }

    // only the caller's own earlier upload is ever removed
    if let Some(old) = previous
        .as_deref()
        .filter(|name| *name != saved.file_name)
        .and_then(|name| state.photos.path_for_name(name))
    {
        state.photos.delete(&old).await;
    }

    Ok(Json(PhotoResp {
        status: "success",
        message: "Profile photo uploaded successfully",
        profile_photo: saved.url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert_eq!(check_username("  ana_b ").unwrap(), "ana_b");
        assert!(check_username("ab").is_err());
        assert!(check_username(&"x".repeat(33)).is_err());
        assert!(check_username("has space").is_err());
    }

    #[test]
    fn email_rules() {
        assert!(check_email("ana@example.com").is_ok());
        assert!(check_email("ana@localhost").is_err());
        assert!(check_email("@example.com").is_err());
        assert!(check_email("ana example@x.io").is_err());
        assert!(check_email("ana@example.").is_err());
    }
}
