use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::account;
use crate::config::AppConfig;
use crate::entity::user::DigestKind;
use crate::error::AppError;
use crate::response::ok;
use crate::routes::session::login_response;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/{token}").route(web::get().to(activate)))
        .service(web::resource("/{token}/edit").route(web::get().to(activate)));
}

#[derive(Deserialize)]
struct ActivationQuery {
    email: Option<String>,
}

async fn activate(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
    query: web::Query<ActivationQuery>,
) -> Result<HttpResponse, AppError> {
    let email = query.email.clone().unwrap_or_default();
    let user = account::find_by_email(db.get_ref(), &email).await?;
    let mut user = match user {
        Some(u) if !u.activated && u.authenticated(DigestKind::Activation, &path) => u,
        _ => return Err(AppError::fail("Invalid activation link")),
    };
    account::activate(db.get_ref(), &mut user).await?;
    Ok(ok(login_response(&config, &user, None)?))
}
