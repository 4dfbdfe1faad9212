use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::entity::micropost;
use crate::error::AppError;
use crate::posts;
use crate::response::{ok, ok_empty};
use crate::routes::{to_page_dto, to_rfc3339, PageQuery};
use crate::social;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::post().to(create)))
        .service(web::resource("/{id:\\d+}").route(web::delete().to(remove)));
}

pub fn feed_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::get().to(feed)));
}

#[derive(Deserialize)]
struct CreateMicropostRequest {
    content: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MicropostDto {
    id: i32,
    user_id: i32,
    content: String,
    created: String,
}

async fn create(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CreateMicropostRequest>,
) -> Result<HttpResponse, AppError> {
    let content = payload.content.clone().unwrap_or_default();
    let post = posts::create_post(db.get_ref(), auth.user_id, &content).await?;
    Ok(ok(to_micropost_dto(post)))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    posts::delete_post(db.get_ref(), auth.user_id, *path).await?;
    Ok(ok_empty())
}

async fn feed(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = social::feed_page(db.get_ref(), auth.user_id, query.page, query.size).await?;
    Ok(ok(to_page_dto(page, to_micropost_dto)))
}

pub(crate) fn to_micropost_dto(model: micropost::Model) -> MicropostDto {
    MicropostDto {
        id: model.id,
        user_id: model.user_id,
        content: model.content,
        created: to_rfc3339(model.created_at),
    }
}
