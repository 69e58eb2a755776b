/// Authentication Routes
///
/// Thin HTTP adapters: validate the payload, call the auth engine, shape the
/// response. Authorization decisions for `/auth/sessions` and `/auth/user`
/// rest on the claims injected by `JwtMiddleware`.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{validate_password_strength, AuthService, Claims, RegisterUser};
use crate::error::{AppError, ErrorContext};
use crate::validators::{is_valid_email, is_valid_name, is_valid_optional_name};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub firstname: String,
    pub patronymic: Option<String>,
    pub lastname: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTokensRequest {
    pub refresh_token: String,
}

/// A malformed `jti` is rejected by the JSON extractor with 400
#[derive(Deserialize)]
pub struct RemoveSessionRequest {
    pub jti: Uuid,
}

/// Runs `op` and logs a failure with its request context before returning it
async fn traced<T, F>(context: ErrorContext, op: F) -> Result<T, AppError>
where
    F: std::future::Future<Output = Result<T, AppError>>,
{
    let result = op.await;
    if let Err(e) = &result {
        context.log_error(e);
    }
    result
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email/name, weak password, password != confirmation
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();

    let email = is_valid_email(&form.email)?;
    let first_name = is_valid_name("firstname", &form.firstname)?;
    let last_name = is_valid_name("lastname", &form.lastname)?;
    let patronymic = is_valid_optional_name("patronymic", form.patronymic.as_deref())?;
    validate_password_strength(&form.password)?;

    let context = ErrorContext::new("user_registration").with_email(email.as_str());
    let payload = RegisterUser {
        email,
        password: form.password,
        password_confirmation: form.password_confirmation,
        first_name,
        patronymic,
        last_name,
    };
    traced(context, service.register_user(payload)).await?;

    Ok(HttpResponse::Created().finish())
}

/// POST /auth/login
///
/// Unknown email and wrong password both answer 401 with the same body.
pub async fn login(
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;

    let tokens = service.login_user(&email, &form.password).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// POST /auth/updateTokens
///
/// Rotates the pair of the session the refresh token belongs to. The
/// presented refresh token stops working afterwards.
pub async fn update_tokens(
    form: web::Json<UpdateTokensRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let tokens = traced(
        ErrorContext::new("token_refresh"),
        service.update_tokens(&form.refresh_token),
    )
    .await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// GET /auth/user/{email}
pub async fn get_user_info(
    path: web::Path<String>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user = service.get_user_info(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(user))
}

/// GET /auth/sessions
///
/// Sessions of the token holder, newest first.
pub async fn get_user_sessions(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let sessions = service.get_user_sessions(claims.email()).await?;

    Ok(HttpResponse::Ok().json(sessions))
}

/// DELETE /auth/sessions
///
/// # Errors
/// - 404: the session does not exist or is not the caller's
pub async fn remove_session(
    claims: web::ReqData<Claims>,
    form: web::Json<RemoveSessionRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("session_removal").with_email(claims.email());
    traced(context, service.remove_session(claims.email(), form.jti)).await?;

    Ok(HttpResponse::Ok().finish())
}
