use actix_web::{web, HttpResponse};
use log::info;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::account;
use crate::auth::{issue_token, AuthUser};
use crate::config::AppConfig;
use crate::entity::user::{self, DigestKind};
use crate::error::AppError;
use crate::response::{ok, ok_empty};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::post().to(login)))
        .service(web::resource("/restore").route(web::post().to(restore)))
        .service(web::resource("/logout").route(web::post().to(logout)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
    remember_me: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreRequest {
    user_id: i32,
    remember_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    token: String,
    user_id: i32,
    name: String,
    admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    remember_token: Option<String>,
}

async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let email = payload.email.clone().unwrap_or_default();
    let password = payload.password.clone().unwrap_or_default();
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::param_error("email and password cannot be null"));
    }

    let user = account::find_by_email(db.get_ref(), &email).await?;
    let mut user = match user {
        Some(user) if user.authenticate_password(&password) => user,
        _ => return Err(AppError::fail("Invalid email/password combination")),
    };
    if !user.activated {
        return Err(AppError::fail(
            "Account not activated. Check your email for the activation link.",
        ));
    }

    let remember_token = if payload.remember_me.unwrap_or(false) {
        Some(account::remember(db.get_ref(), &mut user).await?)
    } else {
        account::forget(db.get_ref(), &mut user).await?;
        None
    };
    info!("user {} logged in", user.id);
    Ok(ok(login_response(&config, &user, remember_token)?))
}

/// Trades a remembered `(user_id, remember_token)` pair for a fresh session token.
async fn restore(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<RestoreRequest>,
) -> Result<HttpResponse, AppError> {
    let user = match account::find_user(db.get_ref(), payload.user_id).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => return Err(AppError::need_login()),
        Err(e) => return Err(e),
    };
    if !user.activated || !user.authenticated(DigestKind::Remember, &payload.remember_token) {
        return Err(AppError::need_login());
    }
    Ok(ok(login_response(&config, &user, None)?))
}

async fn logout(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let mut user = account::find_user(db.get_ref(), auth.user_id).await?;
    account::forget(db.get_ref(), &mut user).await?;
    Ok(ok_empty())
}

pub(crate) fn login_response(
    config: &AppConfig,
    user: &user::Model,
    remember_token: Option<String>,
) -> Result<LoginResponse, AppError> {
    Ok(LoginResponse {
        token: issue_token(config, user.id)?,
        user_id: user.id,
        name: user.name.clone(),
        admin: user.admin,
        remember_token,
    })
}
