use crate::AppState;
use axum::{Router, response::Html, routing::get};

/// Client-rendered shell. Page content is produced in the browser; the server only
/// decides, through the route guard, whether a page may be reached.
const SHELL: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Portfolio &amp; Minecraft Hub</title>
    <script type="module" src="/assets/app.js"></script>
  </head>
  <body>
    <div id="root"></div>
  </body>
</html>
"#;

async fn shell() -> Html<&'static str> {
    Html(SHELL)
}

/// Page routes served as the client shell.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(shell))
        .route("/gallery", get(shell))
        .route("/modpacks", get(shell))
        .route("/apply", get(shell))
        // Auth-only: redirected away once signed in.
        .route("/login", get(shell))
        .route("/register", get(shell))
        // Admin-only: redirected to `/` without an admin token.
        .route("/admin", get(shell))
        .route("/admin/{*rest}", get(shell))
}
