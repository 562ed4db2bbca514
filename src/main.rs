mod db;
mod error;
mod genai;
mod quota;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .expect("invalid PORT");

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");

    let verifier = services::auth::ClerkVerifier::from_env()
        .expect("CLERK_SECRET_KEY required");

    // Generation client (non-fatal: AI routes return 503 if config missing).
    let genai = match genai::GeminiClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "generation client initialized");
            Some(Arc::new(client) as Arc<dyn genai::GenerateText>)
        }
        Err(e) => {
            tracing::warn!(error = %e, "generation client not configured, AI features disabled");
            None
        }
    };

    // Quota store (non-fatal: without it AI requests are refused, not unmetered).
    let quota = match quota::RedisQuota::from_env().await {
        Ok(store) => {
            tracing::info!("quota store connected");
            Some(Arc::new(store) as Arc<dyn quota::QuotaOps>)
        }
        Err(e) => {
            tracing::warn!(error = %e, "quota store not configured, AI requests will be refused");
            None
        }
    };

    let state = state::AppState::new(pool, Arc::new(verifier), genai, quota);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "flashdeck listening");
    axum::serve(listener, app).await.expect("server failed");
}
