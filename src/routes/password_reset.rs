use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::account;
use crate::config::AppConfig;
use crate::entity::user::{self, DigestKind};
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::response::{ok, ok_empty};
use crate::routes::session::login_response;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::post().to(request_reset)))
        .service(web::resource("/{token}").route(web::post().to(reset)))
        .service(web::resource("/{token}/edit").route(web::get().to(check_link)));
}

#[derive(Deserialize)]
struct LinkQuery {
    email: Option<String>,
}

#[derive(Deserialize)]
struct ResetRequest {
    email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewPasswordRequest {
    email: Option<String>,
    password: Option<String>,
    password_confirmation: Option<String>,
}

async fn request_reset(
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<dyn Mailer>,
    payload: web::Json<ResetRequest>,
) -> Result<HttpResponse, AppError> {
    let email = payload.email.clone().unwrap_or_default();
    let mut user = account::find_by_email(db.get_ref(), &email)
        .await?
        .ok_or_else(|| AppError::fail("Email address not found"))?;
    let token = account::create_reset_digest(db.get_ref(), &mut user).await?;
    mailer.send_password_reset(&user, &token);
    Ok(ok_empty())
}

/// Lets a client confirm the emailed link before asking for a new password.
async fn check_link(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<LinkQuery>,
) -> Result<HttpResponse, AppError> {
    let email = query.email.clone().unwrap_or_default();
    let user = valid_user(db.get_ref(), &email, &path).await?;
    if user.password_reset_expired() {
        return Err(AppError::fail("Password reset has expired."));
    }
    Ok(ok_empty())
}

async fn reset(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
    payload: web::Json<NewPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let email = payload.email.unwrap_or_default();
    let mut user = valid_user(db.get_ref(), &email, &path).await?;
    if user.password_reset_expired() {
        return Err(AppError::fail("Password reset has expired."));
    }

    let password = payload.password.unwrap_or_default();
    account::reset_password(
        db.get_ref(),
        &mut user,
        &password,
        payload.password_confirmation.as_deref(),
    )
    .await?;
    Ok(ok(login_response(&config, &user, None)?))
}

async fn valid_user(db: &DatabaseConnection, email: &str, token: &str) -> Result<user::Model, AppError> {
    match account::find_by_email(db, email).await? {
        Some(u) if u.activated && u.authenticated(DigestKind::Reset, token) => Ok(u),
        _ => Err(AppError::fail("Invalid password reset link")),
    }
}
