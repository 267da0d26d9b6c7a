use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// --- Core Records (Mapped to Database) ---

/// User
///
/// Canonical account record from the `users` table. Carries the password hash, so it is
/// never serialized; responses use `UserProfile`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    // Stored lowercase; unique.
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// Public projection of a `User`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
    #[ts(type = "string | null")]
    pub email_verified_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_admin: user.is_admin,
            email_verified_at: user.email_verified_at,
            created_at: user.created_at,
        }
    }
}

/// ApplicationStatus
///
/// Lifecycle of a whitelist application: `PENDING -> {APPROVED, REJECTED}`.
/// Both reviewed states are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "application_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != ApplicationStatus::Pending
    }

    /// Only a pending application can move, and only to a reviewed state.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        self == ApplicationStatus::Pending && next.is_terminal()
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application
///
/// A whitelist request for the Minecraft server, from the `applications` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Application {
    pub id: i64,
    pub user_id: Uuid,
    pub minecraft_username: String,
    pub discord: Option<String>,
    pub age: Option<i32>,
    pub about: String,
    pub status: ApplicationStatus,
    pub reviewed_by: Option<Uuid>,
    #[ts(type = "string | null")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UploadKind
///
/// What an uploaded file is used for on the site.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "upload_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum UploadKind {
    Modpack,
    Gallery,
}

/// Upload
///
/// Metadata row for a stored object, from the `uploads` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Upload {
    pub id: i64,
    pub kind: UploadKind,
    pub title: String,
    pub original_name: String,
    pub storage_key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Store Inputs ---

/// Fields required to insert a user. The id and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

/// Fields required to insert an upload row once the object has been stored.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub kind: UploadKind,
    pub title: String,
    pub original_name: String,
    pub storage_key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
}

// --- Request Payloads ---

/// RegisterRequest
///
/// Input payload for `POST /api/auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
}

/// LoginRequest
///
/// Input payload for `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// CreateApplicationRequest
///
/// Input payload for `POST /api/applications`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateApplicationRequest {
    #[validate(custom(function = "validate_minecraft_username"))]
    pub minecraft_username: String,
    #[validate(length(max = 64, message = "Discord handle is too long"))]
    pub discord: Option<String>,
    #[validate(range(min = 1, max = 120, message = "Age must be between 1 and 120"))]
    pub age: Option<i32>,
    #[validate(length(min = 10, max = 2000, message = "Tell us a bit more (10-2000 characters)"))]
    pub about: String,
}

/// ReviewApplicationRequest
///
/// Input payload for `PATCH /api/admin/applications/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReviewApplicationRequest {
    pub status: ApplicationStatus,
}

/// UploadForm
///
/// Documents the multipart body of `POST /api/admin/uploads`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    pub kind: UploadKind,
    pub title: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// --- Responses ---

/// SessionResponse
///
/// Returned by login and `GET /api/auth/session`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub user: UserProfile,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

/// AdminDashboardStats
///
/// Output schema for `GET /api/admin/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_admins: i64,
    pub pending_applications: i64,
    pub total_uploads: i64,
}

fn validate_minecraft_username(name: &str) -> Result<(), ValidationError> {
    let valid_len = (3..=16).contains(&name.len());
    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(ValidationError::new("minecraft_username").with_message(
            "Minecraft usernames are 3-16 characters of letters, digits or underscores".into(),
        ))
    }
}
