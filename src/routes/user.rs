use actix_web::{web, HttpResponse};
use log::info;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::account::{self, NewUser, ProfileUpdate};
use crate::auth::{AuthUser, OptionalAuthUser};
use crate::db;
use crate::entity::user;
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::posts;
use crate::response::{ok, ok_empty, PageDto};
use crate::routes::micropost::{to_micropost_dto, MicropostDto};
use crate::routes::{to_page_dto, to_rfc3339, PageQuery};
use crate::social;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(register_user))
            .route(web::get().to(list_users)),
    )
    .service(
        web::resource("/{id:\\d+}")
            .route(web::get().to(get_user))
            .route(web::delete().to(delete_user)),
    )
    .service(web::resource("/{id:\\d+}/update").route(web::post().to(update_user)))
    .service(web::resource("/{id:\\d+}/following").route(web::get().to(list_following)))
    .service(web::resource("/{id:\\d+}/followers").route(web::get().to(list_followers)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUserRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    password_confirmation: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    password_confirmation: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserDto {
    id: i32,
    name: String,
    admin: bool,
    created: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    id: i32,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDetailDto {
    #[serde(flatten)]
    user: UserDto,
    following_count: u64,
    followers_count: u64,
    followed_by_viewer: Option<bool>,
    microposts: PageDto<MicropostDto>,
}

async fn register_user(
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<dyn Mailer>,
    payload: web::Json<RegisterUserRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let new = NewUser {
        name: payload.name.unwrap_or_default(),
        email: payload.email.unwrap_or_default(),
        password: payload.password.unwrap_or_default(),
        password_confirmation: payload.password_confirmation,
        ..Default::default()
    };

    let created = account::create_user(db.get_ref(), new).await?;
    mailer.send_activation(&created.user, &created.activation_token);

    Ok(ok(RegisterResponse {
        id: created.user.id,
        message: "Please check your email to activate your account.".to_string(),
    }))
}

async fn list_users(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let select = user::Entity::find()
        .filter(user::Column::Activated.eq(true))
        .order_by_asc(user::Column::Id);
    let page = db::fetch_page(db.get_ref(), select, query.page, query.size).await?;
    Ok(ok(to_page_dto(page, to_user_dto)))
}

async fn get_user(
    db: web::Data<DatabaseConnection>,
    viewer: OptionalAuthUser,
    path: web::Path<i32>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let user = account::find_user(db.get_ref(), *path).await?;
    if !user.activated {
        return Err(AppError::not_found("user"));
    }

    let counts = social::follow_counts(db.get_ref(), user.id).await?;
    let followed_by_viewer = match viewer.0 {
        Some(v) if v.user_id != user.id => Some(social::is_following(db.get_ref(), v.user_id, user.id).await?),
        _ => None,
    };
    let posts = posts::posts_of(db.get_ref(), user.id, query.page, query.size).await?;

    Ok(ok(UserDetailDto {
        user: to_user_dto(user),
        following_count: counts.following,
        followers_count: counts.followers,
        followed_by_viewer,
        microposts: to_page_dto(posts, to_micropost_dto),
    }))
}

async fn update_user(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_self(*path)?;
    let payload = payload.into_inner();
    let mut user = account::find_user(db.get_ref(), auth.user_id).await?;
    let changes = ProfileUpdate {
        name: payload.name.unwrap_or_else(|| user.name.clone()),
        email: payload.email.unwrap_or_else(|| user.email.clone()),
        password: payload.password,
        password_confirmation: payload.password_confirmation,
    };
    account::update_profile(db.get_ref(), &mut user, changes).await?;
    Ok(ok(to_user_dto(user)))
}

async fn delete_user(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let id = *path;
    if id == auth.user_id {
        return Err(AppError::fail("admins cannot delete themselves"));
    }
    account::destroy_user(db.get_ref(), id).await?;
    info!("user {} deleted by admin {}", id, auth.user_id);
    Ok(ok_empty())
}

async fn list_following(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let user = account::find_user(db.get_ref(), *path).await?;
    let page = db::fetch_page(db.get_ref(), social::following(user.id), query.page, query.size).await?;
    Ok(ok(to_page_dto(page, to_user_dto)))
}

async fn list_followers(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let user = account::find_user(db.get_ref(), *path).await?;
    let page = db::fetch_page(db.get_ref(), social::followers(user.id), query.page, query.size).await?;
    Ok(ok(to_page_dto(page, to_user_dto)))
}

pub(crate) fn to_user_dto(model: user::Model) -> UserDto {
    UserDto {
        id: model.id,
        name: model.name,
        admin: model.admin,
        created: to_rfc3339(model.created_at),
    }
}
