use axum::{
    extract::FromRequestParts,
    http::{Method, Request, header, request::Parts},
};
use chrono::Utc;
use hub_portal::{
    AppError, AppState, MemoryRepository, MockStorageService,
    auth::{
        AdminUser, AuthUser, Claims, SessionKeys, authenticate, cookie_value, hash_password,
        session_token, verify_password,
    },
    config::AppConfig,
    models::User,
    repository::Repository,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use uuid::Uuid;

// --- Helpers ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn make_user(email: &str, password: &str, is_admin: bool) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: hash_password(password).unwrap(),
        is_admin,
        email_verified_at: None,
        created_at: Utc::now(),
    }
}

fn keys() -> SessionKeys {
    SessionKeys::new(TEST_JWT_SECRET, 3600)
}

fn create_app_state(repo: Arc<MemoryRepository>) -> AppState {
    let config = AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    AppState::new(repo, Arc::new(MockStorageService::new()), config)
}

fn parts_with_header(name: header::HeaderName, value: &str) -> Parts {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .header(name, value)
        .body(axum::body::Body::empty())
        .unwrap();
    request.into_parts().0
}

fn empty_parts() -> Parts {
    Request::builder()
        .uri("/")
        .body(axum::body::Body::empty())
        .unwrap()
        .into_parts()
        .0
}

// --- Password Hashing ---

#[test]
fn test_password_hash_roundtrip() {
    let hash = hash_password("correct horse battery").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(&hash, "correct horse battery"));
    assert!(!verify_password(&hash, "wrong password"));
}

#[test]
fn test_password_hashes_are_salted() {
    let a = hash_password("same-password").unwrap();
    let b = hash_password("same-password").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_verify_password_rejects_garbage_hash() {
    assert!(!verify_password("not-a-phc-string", "anything"));
}

// --- Session Tokens ---

#[test]
fn test_issue_embeds_subject_and_admin_flag() {
    let user = make_user("admin@example.com", "password123", true);
    let session = keys().issue(&user).unwrap();

    let claims = keys().verify(&session.token).expect("token should verify");
    assert_eq!(claims.sub, user.id);
    assert!(claims.is_admin);
    assert_eq!(claims.exp - claims.iat, 3600);
    assert_eq!(claims.expires_at(), session.expires_at);
}

#[test]
fn test_verify_rejects_wrong_secret() {
    let user = make_user("a@example.com", "password123", false);
    let session = SessionKeys::new("some-other-secret", 3600).issue(&user).unwrap();

    assert!(keys().verify(&session.token).is_none());
}

#[test]
fn test_verify_rejects_expired_token() {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: Uuid::new_v4(),
        is_admin: true,
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap();

    assert!(keys().verify(&token).is_none());
}

#[test]
fn test_verify_rejects_tampered_and_malformed_tokens() {
    let player = make_user("a@example.com", "password123", false);
    let admin = make_user("b@example.com", "password123", true);
    let player_token = keys().issue(&player).unwrap().token;
    let admin_token = keys().issue(&admin).unwrap().token;

    // Admin claims grafted onto the player's signature.
    let (admin_body, _) = admin_token.rsplit_once('.').unwrap();
    let (_, player_sig) = player_token.rsplit_once('.').unwrap();
    let forged = format!("{}.{}", admin_body, player_sig);

    assert!(keys().verify(&forged).is_none());
    assert!(keys().verify("not.a.token").is_none());
    assert!(keys().verify("").is_none());
}

// --- Token Transport ---

#[test]
fn test_cookie_value_parses_among_other_cookies() {
    let parts = parts_with_header(header::COOKIE, "theme=dark; session=abc.def.ghi; lang=en");
    assert_eq!(
        cookie_value(&parts.headers, "session").as_deref(),
        Some("abc.def.ghi")
    );
    assert_eq!(cookie_value(&parts.headers, "missing"), None);
}

#[test]
fn test_session_token_falls_back_to_bearer() {
    let parts = parts_with_header(header::AUTHORIZATION, "Bearer tok123");
    assert_eq!(session_token(&parts.headers).as_deref(), Some("tok123"));

    let parts = parts_with_header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz");
    assert_eq!(session_token(&parts.headers), None);
}

// --- authenticate ---

#[tokio::test]
async fn test_authenticate_success_is_case_insensitive_on_email() {
    let repo = MemoryRepository::new();
    let user = make_user("player@example.com", "password123", false);
    repo.insert_user(user.clone()).await;

    let found = authenticate(&repo, "  Player@Example.com ", "password123")
        .await
        .unwrap();
    assert_eq!(found.id, user.id);
}

#[tokio::test]
async fn test_authenticate_unknown_email_and_wrong_password_look_the_same() {
    let repo = MemoryRepository::new();
    repo.insert_user(make_user("player@example.com", "password123", false))
        .await;

    let unknown = authenticate(&repo, "nobody@example.com", "password123").await;
    let wrong = authenticate(&repo, "player@example.com", "password124").await;

    assert!(matches!(unknown, Err(AppError::InvalidCredentials)));
    assert!(matches!(wrong, Err(AppError::InvalidCredentials)));
}

// --- Extractors ---

#[tokio::test]
async fn test_auth_user_from_cookie() {
    let repo = Arc::new(MemoryRepository::new());
    let user = make_user("player@example.com", "password123", false);
    repo.insert_user(user.clone()).await;
    let state = create_app_state(repo);

    let token = state.sessions.issue(&user).unwrap().token;
    let mut parts = parts_with_header(header::COOKIE, &format!("session={}", token));

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.user.email, "player@example.com");
    assert!(!auth_user.is_admin);
}

#[tokio::test]
async fn test_auth_user_is_loaded_once_per_request() {
    let repo = Arc::new(MemoryRepository::new());
    let user = make_user("player@example.com", "password123", false);
    repo.insert_user(user.clone()).await;
    let state = create_app_state(repo.clone());

    let token = state.sessions.issue(&user).unwrap().token;
    let mut parts = parts_with_header(header::COOKIE, &format!("session={}", token));
    let first = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    // A later extraction in the same request reuses the cached record.
    repo.toggle_admin(user.id).await.unwrap();
    let second = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(second.is_admin, first.is_admin);

    // A new request sees the change.
    let mut fresh = parts_with_header(header::COOKIE, &format!("session={}", token));
    let reloaded = AuthUser::from_request_parts(&mut fresh, &state).await.unwrap();
    assert!(reloaded.is_admin);
}

#[test]
fn test_issue_with_out_of_range_lifetime_fails_cleanly() {
    let user = make_user("player@example.com", "password123", false);
    let keys = SessionKeys::new(TEST_JWT_SECRET, u64::MAX);
    assert!(matches!(keys.issue(&user), Err(AppError::Internal(_))));
}

#[tokio::test]
async fn test_auth_user_missing_token_is_unauthorized() {
    let state = create_app_state(Arc::new(MemoryRepository::new()));
    let mut parts = empty_parts();

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_auth_user_for_deleted_account_is_unauthorized() {
    let state = create_app_state(Arc::new(MemoryRepository::new()));
    // Valid signature, but the subject is not in the store.
    let ghost = make_user("ghost@example.com", "password123", true);
    let token = state.sessions.issue(&ghost).unwrap().token;
    let mut parts = parts_with_header(header::AUTHORIZATION, &format!("Bearer {}", token));

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_admin_user_rejects_non_admin_token() {
    let repo = Arc::new(MemoryRepository::new());
    let user = make_user("player@example.com", "password123", false);
    repo.insert_user(user.clone()).await;
    let state = create_app_state(repo);

    let token = state.sessions.issue(&user).unwrap().token;
    let mut parts = parts_with_header(header::COOKIE, &format!("session={}", token));

    let result = AdminUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_admin_user_rechecks_live_record() {
    let repo = Arc::new(MemoryRepository::new());
    let admin = make_user("admin@example.com", "password123", true);
    repo.insert_user(admin.clone()).await;
    let state = create_app_state(repo.clone());

    let token = state.sessions.issue(&admin).unwrap().token;

    // Accepted while the record is an admin.
    let mut parts = parts_with_header(header::COOKIE, &format!("session={}", token));
    assert!(AdminUser::from_request_parts(&mut parts, &state).await.is_ok());

    // Demoted after issuance: the stale claim no longer grants access.
    use hub_portal::repository::Repository;
    repo.toggle_admin(admin.id).await.unwrap();

    let mut parts = parts_with_header(header::COOKIE, &format!("session={}", token));
    let result = AdminUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}
