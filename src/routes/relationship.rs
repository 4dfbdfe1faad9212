use actix_web::{web, HttpResponse};
use log::debug;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::response::ok;
use crate::social;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::post().to(follow)))
        .service(web::resource("/{followed_id:\\d+}").route(web::delete().to(unfollow)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowRequest {
    followed_id: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FollowStateDto {
    followed_id: i32,
    following: bool,
    followers_count: u64,
}

async fn follow(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<FollowRequest>,
) -> Result<HttpResponse, AppError> {
    let followed_id = payload
        .followed_id
        .ok_or_else(|| AppError::param_error("followedId cannot be null"))?;
    social::follow(db.get_ref(), auth.user_id, followed_id).await?;
    follow_state(db.get_ref(), followed_id, true).await
}

async fn unfollow(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let followed_id = *path;
    if !social::unfollow(db.get_ref(), auth.user_id, followed_id).await? {
        debug!("user {} was not following {}", auth.user_id, followed_id);
    }
    follow_state(db.get_ref(), followed_id, false).await
}

async fn follow_state(
    db: &DatabaseConnection,
    followed_id: i32,
    following: bool,
) -> Result<HttpResponse, AppError> {
    let counts = social::follow_counts(db, followed_id).await?;
    Ok(ok(FollowStateDto {
        followed_id,
        following,
        followers_count: counts.followers,
    }))
}
