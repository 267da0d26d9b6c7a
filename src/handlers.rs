use crate::{
    AppState,
    auth::{
        AdminUser, AuthUser, authenticate, clear_session_cookie, hash_password,
        normalize_email, session_claims, session_cookie,
    },
    error::{AppError, StoreError},
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        AdminDashboardStats, Application, ApplicationStatus, CreateApplicationRequest,
        LoginRequest, NewUpload, NewUser, RegisterRequest, ReviewApplicationRequest,
        SessionResponse, Upload, UploadKind, UserProfile,
    },
    upload::{sanitize_filename, storage_key, validate_upload},
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

// --- Filter Structs ---

/// UploadFilter
///
/// Query parameters for `GET /api/uploads`.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct UploadFilter {
    /// `MODPACK` or `GALLERY`; omit for both.
    pub kind: Option<UploadKind>,
}

/// ApplicationFilter
///
/// Query parameters for `GET /api/admin/applications`.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
}

// --- Session Handlers ---

/// register_user
///
/// [Public Route] Creates a regular (non-admin) account. The password is stored only as
/// an Argon2 hash.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Invalid input or email taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    payload.email = normalize_email(&payload.email);
    payload.validate()?;

    let new_user = NewUser {
        email: payload.email,
        password_hash: hash_password(&payload.password)?,
    };

    let user = state.repo.create_user(new_user).await.map_err(|e| match e {
        StoreError::Duplicate(_) => {
            AppError::Validation("An account with this email already exists".to_string())
        }
        other => other.into(),
    })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// login
///
/// [Public Route] Verifies credentials and issues the session cookie. The token embeds the
/// user's admin flag as it is right now.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(state.repo.as_ref(), &payload.email, &payload.password).await?;
    let session = state.sessions.issue(&user)?;
    let cookie = session_cookie(&session, state.config.secure_cookies())?;

    tracing::info!(user_id = %user.id, is_admin = user.is_admin, "session issued");

    let body = SessionResponse {
        user: user.into(),
        expires_at: session.expires_at,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// logout
///
/// [Public Route] Clears the session cookie. Tokens are stateless, so nothing is revoked
/// server-side.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Session cookie cleared"))
)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::SET_COOKIE,
            clear_session_cookie(state.config.secure_cookies()),
        )],
        Json(json!({ "success": true })),
    )
}

/// get_session
///
/// [Public Route] The current session, or `null` when the request carries no valid token.
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses((status = 200, description = "Current session or null", body = SessionResponse))
)]
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Option<SessionResponse>>, AppError> {
    let Some(claims) = session_claims(&headers, &state.sessions) else {
        return Ok(Json(None));
    };

    let session = state
        .repo
        .get_user(claims.sub)
        .await?
        .map(|user| SessionResponse {
            user: user.into(),
            expires_at: claims.expires_at(),
        });
    Ok(Json(session))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] Profile of the signed-in user.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_me(AuthUser { user, .. }: AuthUser) -> Json<UserProfile> {
    Json(user.into())
}

/// submit_application
///
/// [Authenticated Route] Files a whitelist application. A user may only have one
/// application pending at a time.
#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = CreateApplicationRequest,
    responses(
        (status = 201, description = "Application submitted", body = Application),
        (status = 400, description = "Invalid input or already pending")
    )
)]
pub async fn submit_application(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    payload.minecraft_username = payload.minecraft_username.trim().to_string();
    payload.discord = payload
        .discord
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    payload.validate()?;

    let application = state
        .repo
        .create_application(id, payload)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => {
                AppError::Validation("You already have a pending application".to_string())
            }
            other => other.into(),
        })?;
    tracing::info!(application_id = application.id, user_id = %id, "application submitted");
    Ok((StatusCode::CREATED, Json(application)))
}

/// get_my_applications
///
/// [Authenticated Route] The signed-in user's applications, newest first.
#[utoipa::path(
    get,
    path = "/api/applications",
    responses((status = 200, description = "My applications", body = [Application]))
)]
pub async fn get_my_applications(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(state.repo.list_user_applications(id).await?))
}

// --- Public Content ---

/// list_uploads
///
/// [Public Route] Modpacks and gallery images, newest first.
#[utoipa::path(
    get,
    path = "/api/uploads",
    params(UploadFilter),
    responses((status = 200, description = "Uploads", body = [Upload]))
)]
pub async fn list_uploads(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<UploadFilter>,
) -> Result<Json<Vec<Upload>>, AppError> {
    Ok(Json(state.repo.list_uploads(filter.kind).await?))
}

// --- Admin Handlers ---
//
// Each of these takes `AdminUser`, which reloads the caller's record and requires the
// live admin flag. API routes are not covered by the page-level route guard.

/// get_admin_stats
///
/// [Admin Route] Dashboard counters.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminDashboardStats),
        (status = 401, description = "Not an admin")
    )
)]
pub async fn get_admin_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, AppError> {
    Ok(Json(state.repo.get_stats().await?))
}

/// list_users
///
/// [Admin Route] All accounts.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "Users", body = [UserProfile]),
        (status = 401, description = "Not an admin")
    )
)]
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// toggle_admin
///
/// [Admin Route] Flips another user's admin flag. Applying it twice restores the original
/// value. Sessions already issued keep their old claim until the user logs in again; admin
/// handlers are unaffected because they read the live flag.
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = UserProfile),
        (status = 400, description = "Attempted to change own flag"),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn toggle_admin(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserProfile>, AppError> {
    if id == admin.id {
        return Err(AppError::Validation(
            "You cannot change your own admin status".to_string(),
        ));
    }

    let user = state
        .repo
        .toggle_admin(id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, is_admin = user.is_admin, "admin flag toggled");
    Ok(Json(user.into()))
}

/// list_applications
///
/// [Admin Route] All whitelist applications, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/api/admin/applications",
    params(ApplicationFilter),
    responses(
        (status = 200, description = "Applications", body = [Application]),
        (status = 401, description = "Not an admin")
    )
)]
pub async fn list_applications(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ApplicationFilter>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(state.repo.list_applications(filter.status).await?))
}

/// review_application
///
/// [Admin Route] Approves or rejects a pending application. Reviewed applications are
/// final: a second review is refused and leaves the record unchanged.
#[utoipa::path(
    patch,
    path = "/api/admin/applications/{id}",
    params(("id" = i64, Path, description = "Application ID")),
    request_body = ReviewApplicationRequest,
    responses(
        (status = 200, description = "Reviewed", body = Application),
        (status = 400, description = "Invalid target status or already reviewed"),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Application not found")
    )
)]
pub async fn review_application(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ReviewApplicationRequest>,
) -> Result<Json<Application>, AppError> {
    if !payload.status.is_terminal() {
        return Err(AppError::Validation(
            "Applications can only be approved or rejected".to_string(),
        ));
    }

    if let Some(application) = state
        .repo
        .review_application(id, payload.status, admin.id)
        .await?
    {
        tracing::info!(application_id = id, admin_id = %admin.id, status = %application.status, "application reviewed");
        return Ok(Json(application));
    }

    // Nothing pending matched: tell "already reviewed" apart from "missing".
    match state.repo.get_application(id).await? {
        Some(existing) => Err(AppError::Validation(format!(
            "Application was already {}",
            existing.status
        ))),
        None => Err(AppError::NotFound("Application")),
    }
}

/// create_upload
///
/// [Admin Route] Accepts a multipart form with `kind`, optional `title` and `file`,
/// validates it, writes the object to storage and records its metadata.
#[utoipa::path(
    post,
    path = "/api/admin/uploads",
    request_body(content = crate::models::UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Stored", body = Upload),
        (status = 400, description = "Invalid file"),
        (status = 401, description = "Not an admin")
    )
)]
pub async fn create_upload(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Upload>), AppError> {
    let mut multipart = multipart?;
    let malformed = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("Malformed upload form: {}", e))
    };

    let mut kind = None;
    let mut title = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "kind" => kind = Some(field.text().await.map_err(malformed)?.parse::<UploadKind>()?),
            "title" => title = Some(field.text().await.map_err(malformed)?.trim().to_string()),
            "file" => {
                let filename = field
                    .file_name()
                    .map(sanitize_filename)
                    .ok_or_else(|| AppError::Validation("File name is missing".to_string()))?;
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                file = Some((filename, content_type, bytes));
            }
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| AppError::Validation("Upload kind is required".to_string()))?;
    let (original_name, content_type, bytes) =
        file.ok_or_else(|| AppError::Validation("A file is required".to_string()))?;

    let extension = validate_upload(kind, &original_name, &content_type, bytes.len())?;
    let key = storage_key(kind, &extension);
    let size_bytes = bytes.len() as i64;

    state
        .storage
        .put_object(&key, &content_type, bytes.to_vec())
        .await?;

    let title = title.filter(|t| !t.is_empty()).unwrap_or_else(|| {
        original_name
            .rsplit_once('.')
            .map_or(original_name.as_str(), |(stem, _)| stem)
            .to_string()
    });

    let new_upload = NewUpload {
        kind,
        title,
        original_name,
        url: format!(
            "{}/{}",
            state.config.public_media_url.trim_end_matches('/'),
            key
        ),
        storage_key: key,
        content_type,
        size_bytes,
        uploaded_by: admin.id,
    };

    let upload = match state.repo.create_upload(new_upload.clone()).await {
        Ok(upload) => upload,
        Err(e) => {
            // Keep storage in step with the table.
            if let Err(cleanup) = state.storage.delete_object(&new_upload.storage_key).await {
                tracing::warn!(key = %new_upload.storage_key, error = %cleanup, "orphaned upload object");
            }
            return Err(e.into());
        }
    };

    tracing::info!(upload_id = upload.id, kind = ?upload.kind, size = upload.size_bytes, "upload stored");
    Ok((StatusCode::CREATED, Json(upload)))
}

/// delete_upload
///
/// [Admin Route] Removes an upload record, then its stored object. Deleting an id that
/// does not exist (including a repeated delete) is a 404.
#[utoipa::path(
    delete,
    path = "/api/admin/uploads/{id}",
    params(("id" = i64, Path, description = "Upload ID")),
    responses(
        (status = 200, description = "Deleted", body = Upload),
        (status = 401, description = "Not an admin"),
        (status = 404, description = "Upload not found")
    )
)]
pub async fn delete_upload(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Upload>, AppError> {
    let upload = state
        .repo
        .delete_upload(id)
        .await?
        .ok_or(AppError::NotFound("Upload"))?;

    // The record is gone either way; a failed object delete only leaves an orphan.
    if let Err(e) = state.storage.delete_object(&upload.storage_key).await {
        tracing::warn!(upload_id = id, key = %upload.storage_key, error = %e, "stored object not removed");
    }

    tracing::info!(upload_id = id, admin_id = %admin.id, "upload deleted");
    Ok(Json(upload))
}

/// Liveness check for load balancers.
pub async fn health() -> &'static str {
    "ok"
}
