use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, BcryptHasher, JwtSigner, TokenTtl};
use crate::configuration::Settings;
use crate::error::AppError;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    get_user_info, get_user_sessions, health_check, login, register, remove_session,
    update_tokens,
};
use crate::store::{PgUserStore, RedisSessionStore};

/// Wire the engine to Postgres (users) and Redis (sessions).
///
/// Runs pending migrations before returning.
pub async fn build_auth_service(configuration: &Settings) -> Result<AuthService, AppError> {
    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .acquire_timeout(configuration.database.acquire_timeout())
        .connect(&configuration.database.connection_string())
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to migrate the database: {}", e)))?;
    tracing::info!("Database connection pool created successfully");

    let sessions = RedisSessionStore::from_settings(&configuration.redis)?;
    tracing::info!(url = %configuration.redis.url, "Session store configured");

    Ok(AuthService::new(
        Arc::new(PgUserStore::new(pool)),
        Arc::new(sessions),
        Arc::new(BcryptHasher::new(configuration.password.hash_cost)),
        Arc::new(JwtSigner::new(&configuration.jwt)),
        TokenTtl::from_settings(&configuration.jwt),
    ))
}

pub fn run(listener: TcpListener, service: AuthService) -> Result<Server, std::io::Error> {
    let verifier = service.signer();
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())      // Standard logging
            .wrap(LoggerMiddleware)       // Request id + latency

            // Shared state
            .app_data(service.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/updateTokens", web::post().to(update_tokens))

            // Protected routes (require a valid access token)
            .service(
                web::resource("/auth/user/{email}")
                    .route(web::get().to(get_user_info))
                    .wrap(JwtMiddleware::new(verifier.clone())),
            )
            .service(
                web::resource("/auth/sessions")
                    .route(web::get().to(get_user_sessions))
                    .route(web::delete().to(remove_session))
                    .wrap(JwtMiddleware::new(verifier.clone())),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
