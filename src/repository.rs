use crate::error::StoreError;
use crate::models::{
    AdminDashboardStats, Application, ApplicationStatus, CreateApplicationRequest, NewUpload,
    NewUser, Upload, UploadKind, User,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository Trait
///
/// Abstract contract for every persistence operation. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres store can be swapped for the in-memory one.
///
/// Every mutation is a single atomic statement; there is no cross-request locking.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    // `email` must already be normalized (trimmed, lowercase).
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    // Fails with `StoreError::Duplicate("email")` when the address is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    // Flips `is_admin`. Returns `None` when the user does not exist.
    async fn toggle_admin(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    // --- Whitelist Applications ---
    /// Fails with `StoreError::Duplicate` when the user already has a pending application.
    async fn create_application(
        &self,
        user_id: Uuid,
        req: CreateApplicationRequest,
    ) -> Result<Application, StoreError>;
    async fn get_application(&self, id: i64) -> Result<Option<Application>, StoreError>;
    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>, StoreError>;
    async fn list_user_applications(&self, user_id: Uuid) -> Result<Vec<Application>, StoreError>;
    /// Moves a `PENDING` application to `status`. Returns `None` when no pending
    /// application with that id exists (missing or already reviewed).
    async fn review_application(
        &self,
        id: i64,
        status: ApplicationStatus,
        reviewer: Uuid,
    ) -> Result<Option<Application>, StoreError>;

    // --- Uploads ---
    async fn create_upload(&self, upload: NewUpload) -> Result<Upload, StoreError>;
    async fn list_uploads(&self, kind: Option<UploadKind>) -> Result<Vec<Upload>, StoreError>;
    // Returns the deleted row, or `None` if it did not exist.
    async fn delete_upload(&self, id: i64) -> Result<Option<Upload>, StoreError>;

    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL through a shared sqlx pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(err: sqlx::Error, field: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(field),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, is_admin, email_verified_at, created_at
               FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, is_admin, email_verified_at, created_at
               FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// New accounts are never admins; promotion goes through `toggle_admin`.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, password_hash, is_admin, created_at)
               VALUES ($1, $2, $3, false, NOW())
               RETURNING id, email, password_hash, is_admin, email_verified_at, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "email"))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, is_admin, email_verified_at, created_at
               FROM users ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn toggle_admin(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users SET is_admin = NOT is_admin WHERE id = $1
               RETURNING id, email, password_hash, is_admin, email_verified_at, created_at"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_application(
        &self,
        user_id: Uuid,
        req: CreateApplicationRequest,
    ) -> Result<Application, StoreError> {
        let application = sqlx::query_as::<_, Application>(
            r#"INSERT INTO applications (user_id, minecraft_username, discord, age, about, status, created_at)
               VALUES ($1, $2, $3, $4, $5, 'PENDING', NOW())
               RETURNING id, user_id, minecraft_username, discord, age, about, status,
                         reviewed_by, reviewed_at, created_at"#,
        )
        .bind(user_id)
        .bind(&req.minecraft_username)
        .bind(&req.discord)
        .bind(req.age)
        .bind(&req.about)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "pending application"))?;
        Ok(application)
    }

    async fn get_application(&self, id: i64) -> Result<Option<Application>, StoreError> {
        let application = sqlx::query_as::<_, Application>(
            r#"SELECT id, user_id, minecraft_username, discord, age, about, status,
                      reviewed_by, reviewed_at, created_at
               FROM applications WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>, StoreError> {
        let applications = sqlx::query_as::<_, Application>(
            r#"SELECT id, user_id, minecraft_username, discord, age, about, status,
                      reviewed_by, reviewed_at, created_at
               FROM applications
               WHERE ($1::application_status IS NULL OR status = $1)
               ORDER BY created_at DESC"#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn list_user_applications(&self, user_id: Uuid) -> Result<Vec<Application>, StoreError> {
        let applications = sqlx::query_as::<_, Application>(
            r#"SELECT id, user_id, minecraft_username, discord, age, about, status,
                      reviewed_by, reviewed_at, created_at
               FROM applications WHERE user_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    /// The `status = 'PENDING'` predicate makes the transition atomic: of two concurrent
    /// reviewers, only the first matches a row.
    async fn review_application(
        &self,
        id: i64,
        status: ApplicationStatus,
        reviewer: Uuid,
    ) -> Result<Option<Application>, StoreError> {
        let application = sqlx::query_as::<_, Application>(
            r#"UPDATE applications
               SET status = $2, reviewed_by = $3, reviewed_at = NOW()
               WHERE id = $1 AND status = 'PENDING'
               RETURNING id, user_id, minecraft_username, discord, age, about, status,
                         reviewed_by, reviewed_at, created_at"#,
        )
        .bind(id)
        .bind(status)
        .bind(reviewer)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn create_upload(&self, upload: NewUpload) -> Result<Upload, StoreError> {
        sqlx::query_as::<_, Upload>(
            r#"INSERT INTO uploads (kind, title, original_name, storage_key, url, content_type,
                                    size_bytes, uploaded_by, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
               RETURNING id, kind, title, original_name, storage_key, url, content_type,
                         size_bytes, uploaded_by, created_at"#,
        )
        .bind(upload.kind)
        .bind(&upload.title)
        .bind(&upload.original_name)
        .bind(&upload.storage_key)
        .bind(&upload.url)
        .bind(&upload.content_type)
        .bind(upload.size_bytes)
        .bind(upload.uploaded_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "storage_key"))
    }

    async fn list_uploads(&self, kind: Option<UploadKind>) -> Result<Vec<Upload>, StoreError> {
        let uploads = sqlx::query_as::<_, Upload>(
            r#"SELECT id, kind, title, original_name, storage_key, url, content_type,
                      size_bytes, uploaded_by, created_at
               FROM uploads
               WHERE ($1::upload_kind IS NULL OR kind = $1)
               ORDER BY created_at DESC"#,
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(uploads)
    }

    async fn delete_upload(&self, id: i64) -> Result<Option<Upload>, StoreError> {
        let upload = sqlx::query_as::<_, Upload>(
            r#"DELETE FROM uploads WHERE id = $1
               RETURNING id, kind, title, original_name, storage_key, url, content_type,
                         size_bytes, uploaded_by, created_at"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(upload)
    }

    /// Compiles all dashboard counters in a single round trip.
    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError> {
        let (total_users, total_admins, pending_applications, total_uploads) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM users WHERE is_admin),
                    (SELECT COUNT(*) FROM applications WHERE status = 'PENDING'),
                    (SELECT COUNT(*) FROM uploads)"#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(AdminDashboardStats {
            total_users,
            total_admins,
            pending_applications,
            total_uploads,
        })
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct MemoryData {
    users: Vec<User>,
    applications: Vec<Application>,
    uploads: Vec<Upload>,
    next_application_id: i64,
    next_upload_id: i64,
}

/// MemoryRepository
///
/// A `Repository` held entirely in process memory. Used by the test suite and for
/// running the router without a database. Each method takes the lock once, which gives
/// it the same single-statement atomicity as the Postgres queries.
#[derive(Default)]
pub struct MemoryRepository {
    data: RwLock<MemoryData>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully formed user, bypassing registration. Test seeding helper.
    pub async fn insert_user(&self, user: User) {
        self.data.write().await.users.push(user);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut data = self.data.write().await;
        if data.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            is_admin: false,
            email_verified_at: None,
            created_at: Utc::now(),
        };
        data.users.push(created.clone());
        Ok(created)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.data.read().await.users.clone())
    }

    async fn toggle_admin(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut data = self.data.write().await;
        Ok(data.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.is_admin = !user.is_admin;
            user.clone()
        }))
    }

    async fn create_application(
        &self,
        user_id: Uuid,
        req: CreateApplicationRequest,
    ) -> Result<Application, StoreError> {
        let mut data = self.data.write().await;
        if data
            .applications
            .iter()
            .any(|a| a.user_id == user_id && a.status == ApplicationStatus::Pending)
        {
            return Err(StoreError::Duplicate("pending application"));
        }
        data.next_application_id += 1;
        let application = Application {
            id: data.next_application_id,
            user_id,
            minecraft_username: req.minecraft_username,
            discord: req.discord,
            age: req.age,
            about: req.about,
            status: ApplicationStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };
        data.applications.push(application.clone());
        Ok(application)
    }

    async fn get_application(&self, id: i64) -> Result<Option<Application>, StoreError> {
        let data = self.data.read().await;
        Ok(data.applications.iter().find(|a| a.id == id).cloned())
    }

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .applications
            .iter()
            .rev()
            .filter(|a| status.is_none_or(|s| a.status == s))
            .cloned()
            .collect())
    }

    async fn list_user_applications(&self, user_id: Uuid) -> Result<Vec<Application>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .applications
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn review_application(
        &self,
        id: i64,
        status: ApplicationStatus,
        reviewer: Uuid,
    ) -> Result<Option<Application>, StoreError> {
        let mut data = self.data.write().await;
        Ok(data
            .applications
            .iter_mut()
            .find(|a| a.id == id && a.status.can_transition_to(status))
            .map(|application| {
                application.status = status;
                application.reviewed_by = Some(reviewer);
                application.reviewed_at = Some(Utc::now());
                application.clone()
            }))
    }

    async fn create_upload(&self, upload: NewUpload) -> Result<Upload, StoreError> {
        let mut data = self.data.write().await;
        if data.uploads.iter().any(|u| u.storage_key == upload.storage_key) {
            return Err(StoreError::Duplicate("storage_key"));
        }
        data.next_upload_id += 1;
        let created = Upload {
            id: data.next_upload_id,
            kind: upload.kind,
            title: upload.title,
            original_name: upload.original_name,
            storage_key: upload.storage_key,
            url: upload.url,
            content_type: upload.content_type,
            size_bytes: upload.size_bytes,
            uploaded_by: upload.uploaded_by,
            created_at: Utc::now(),
        };
        data.uploads.push(created.clone());
        Ok(created)
    }

    async fn list_uploads(&self, kind: Option<UploadKind>) -> Result<Vec<Upload>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .uploads
            .iter()
            .rev()
            .filter(|u| kind.is_none_or(|k| u.kind == k))
            .cloned()
            .collect())
    }

    async fn delete_upload(&self, id: i64) -> Result<Option<Upload>, StoreError> {
        let mut data = self.data.write().await;
        let position = data.uploads.iter().position(|u| u.id == id);
        Ok(position.map(|index| data.uploads.remove(index)))
    }

    async fn get_stats(&self) -> Result<AdminDashboardStats, StoreError> {
        let data = self.data.read().await;
        Ok(AdminDashboardStats {
            total_users: data.users.len() as i64,
            total_admins: data.users.iter().filter(|u| u.is_admin).count() as i64,
            pending_applications: data
                .applications
                .iter()
                .filter(|a| a.status == ApplicationStatus::Pending)
                .count() as i64,
            total_uploads: data.uploads.len() as i64,
        })
    }
}
