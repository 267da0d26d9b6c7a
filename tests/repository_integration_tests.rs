use hub_portal::{
    models::{ApplicationStatus, CreateApplicationRequest, NewUpload, NewUser, UploadKind},
    error::StoreError,
    repository::{MemoryRepository, PostgresRepository, Repository},
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

// --- Test Context and Setup ---

async fn postgres() -> PostgresRepository {
    dotenv::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run integration tests");

    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations.");

    PostgresRepository::new(pool)
}

// --- Test Data Helpers ---

fn unique_email(label: &str) -> String {
    format!("{}-{}@test.com", label, Uuid::new_v4())
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$fake$fake".to_string(),
    }
}

fn application() -> CreateApplicationRequest {
    CreateApplicationRequest {
        minecraft_username: "Alex_01".to_string(),
        discord: None,
        age: Some(21),
        about: "Mostly farms and villager trading halls.".to_string(),
    }
}

fn new_upload(uploaded_by: Uuid, kind: UploadKind) -> NewUpload {
    let key = format!("gallery/{}.png", Uuid::new_v4());
    NewUpload {
        kind,
        title: "Spawn".to_string(),
        original_name: "spawn.png".to_string(),
        url: format!("http://localhost:9000/hub-test/{}", key),
        storage_key: key,
        content_type: "image/png".to_string(),
        size_bytes: 2048,
        uploaded_by,
    }
}

// --- Shared Contract ---
//
// Both stores must behave the same; each check runs against memory always and against
// Postgres when a database is available.

async fn check_users(repo: &dyn Repository) {
    let email = unique_email("player");
    let user = repo.create_user(new_user(&email)).await.unwrap();
    assert!(!user.is_admin);

    let found = repo.find_user_by_email(&email).await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert!(repo.get_user(Uuid::new_v4()).await.unwrap().is_none());

    let duplicate = repo.create_user(new_user(&email)).await;
    assert!(matches!(duplicate, Err(StoreError::Duplicate("email"))));

    // Toggle is its own inverse.
    assert!(repo.toggle_admin(user.id).await.unwrap().unwrap().is_admin);
    assert!(!repo.toggle_admin(user.id).await.unwrap().unwrap().is_admin);
    assert!(repo.toggle_admin(Uuid::new_v4()).await.unwrap().is_none());
}

async fn check_applications(repo: &dyn Repository) {
    let user = repo.create_user(new_user(&unique_email("applicant"))).await.unwrap();
    let reviewer = repo.create_user(new_user(&unique_email("reviewer"))).await.unwrap();

    let created = repo.create_application(user.id, application()).await.unwrap();
    assert_eq!(created.status, ApplicationStatus::Pending);

    // One pending application per user.
    let second = repo.create_application(user.id, application()).await;
    assert!(matches!(
        second,
        Err(StoreError::Duplicate("pending application"))
    ));

    let approved = repo
        .review_application(created.id, ApplicationStatus::Approved, reviewer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approved.status, ApplicationStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(reviewer.id));
    assert!(approved.reviewed_at.is_some());

    // Reviewed applications do not move again.
    let second = repo
        .review_application(created.id, ApplicationStatus::Rejected, reviewer.id)
        .await
        .unwrap();
    assert!(second.is_none());
    let stored = repo.get_application(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ApplicationStatus::Approved);

    // Once reviewed, the user may apply again.
    repo.create_application(user.id, application()).await.unwrap();
    let mine = repo.list_user_applications(user.id).await.unwrap();
    assert_eq!(mine.len(), 2);
    let approved_list = repo
        .list_applications(Some(ApplicationStatus::Approved))
        .await
        .unwrap();
    assert!(approved_list.iter().any(|a| a.id == created.id));
}

async fn check_concurrent_submissions(repo: Arc<dyn Repository>) {
    let user_id = repo
        .create_user(new_user(&unique_email("racer")))
        .await
        .unwrap()
        .id;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let repo = repo.clone();
        tasks.spawn(async move { repo.create_application(user_id, application()).await });
    }

    let mut created = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert!(matches!(e, StoreError::Duplicate(_)), "{}", e),
        }
    }

    assert_eq!(created, 1);
    let pending = repo
        .list_user_applications(user_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.status == ApplicationStatus::Pending)
        .count();
    assert_eq!(pending, 1);
}

async fn check_uploads(repo: &dyn Repository) {
    let admin = repo.create_user(new_user(&unique_email("admin"))).await.unwrap();

    let upload = repo
        .create_upload(new_upload(admin.id, UploadKind::Gallery))
        .await
        .unwrap();
    let galleries = repo.list_uploads(Some(UploadKind::Gallery)).await.unwrap();
    assert!(galleries.iter().any(|u| u.id == upload.id));
    let modpacks = repo.list_uploads(Some(UploadKind::Modpack)).await.unwrap();
    assert!(modpacks.iter().all(|u| u.id != upload.id));

    let deleted = repo.delete_upload(upload.id).await.unwrap().unwrap();
    assert_eq!(deleted.storage_key, upload.storage_key);
    assert!(repo.delete_upload(upload.id).await.unwrap().is_none());
}

// --- Memory Store ---

#[tokio::test]
async fn test_memory_users() {
    check_users(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_applications() {
    check_applications(&MemoryRepository::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_concurrent_submissions() {
    check_concurrent_submissions(Arc::new(MemoryRepository::new())).await;
}

#[tokio::test]
async fn test_memory_uploads() {
    check_uploads(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_stats() {
    let repo = MemoryRepository::new();
    let user = repo.create_user(new_user("a@test.com")).await.unwrap();
    repo.create_user(new_user("b@test.com")).await.unwrap();
    repo.toggle_admin(user.id).await.unwrap();
    repo.create_application(user.id, application()).await.unwrap();
    repo.create_upload(new_upload(user.id, UploadKind::Modpack))
        .await
        .unwrap();

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.total_admins, 1);
    assert_eq!(stats.pending_applications, 1);
    assert_eq!(stats.total_uploads, 1);
}

// --- Postgres Store ---

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_postgres_users() {
    check_users(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_postgres_applications() {
    check_applications(&postgres().await).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_postgres_concurrent_submissions() {
    check_concurrent_submissions(Arc::new(postgres().await)).await;
}

#[tokio::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_postgres_uploads() {
    check_uploads(&postgres().await).await;
}
