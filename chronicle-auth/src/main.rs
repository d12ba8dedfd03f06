use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod models;
mod routes;
mod schema;
mod services;
mod store;

use chronicle_shared::clients::db::create_pool;
use chronicle_shared::clients::email::EmailClient;
use axum::extract::FromRef;
use chronicle_shared::middleware::{
    init_metrics, init_tracing, metrics_middleware, rate_limit_middleware, JwtVerifier,
    RateLimiter,
};
use chronicle_shared::types::auth::verify_permission_table;

use config::AppConfig;
use services::auth::AuthService;
use store::PgStore;

pub struct AppState {
    pub auth: AuthService,
    pub email: EmailClient,
    pub config: AppConfig,
    pub jwt: JwtVerifier,
}

impl FromRef<AppState> for JwtVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("chronicle-auth");

    let config = AppConfig::load()?;
    verify_permission_table()?;
    let port = config.port;

    let metrics_handle = init_metrics();
    let pool = create_pool(&config.database_url, config.db_pool_size);
    let store = Arc::new(PgStore::new(pool));
    let auth = AuthService::new(store, config.clone());
    let email = EmailClient::new(
        &config.resend_api_key,
        &config.from_email,
        "Chronicle",
        &config.app_base_url,
    );

    // Verification shares the configured signing secret, so the production
    // placeholder check in AppConfig::load covers both halves.
    let jwt = JwtVerifier::new(&config.jwt_secret);

    let state = Arc::new(AppState {
        auth,
        email,
        config,
        jwt,
    });

    // Strict budget on the credential-facing endpoints, a looser one over
    // the whole router. Both are process-local.
    let auth_limiter = Arc::new(RateLimiter::new(Duration::from_secs(900), 20));
    let api_limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 120));

    let public = Router::new()
        .route("/register", post(routes::register::register))
        .route("/login", post(routes::login::login))
        .route("/refresh", post(routes::refresh::refresh))
        .route("/forgot-password", post(routes::forgot_password::forgot_password))
        .route("/reset-password", post(routes::reset_password::reset_password))
        .route(
            "/verify-email",
            post(routes::verify_email::verify_email).get(routes::verify_email::verify_email_link),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth_limiter,
            rate_limit_middleware,
        ));

    let protected = Router::new()
        .route(
            "/resend-verification",
            post(routes::resend_verification::resend_verification),
        )
        .route("/logout", post(routes::logout::logout))
        .route(
            "/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .route("/change-password", put(routes::change_password::change_password))
        .route("/check", get(routes::check::check))
        .route("/users", get(routes::users::list_users))
        .route(
            "/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/stats/users", get(routes::stats::user_stats));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/metrics",
            get(move || {
                let handle = metrics_handle.clone();
                async move { handle.render() }
            }),
        )
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            api_limiter,
            rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "chronicle-auth starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
