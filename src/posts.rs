use chrono::Utc;
use log::debug;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::db::{self, Page};
use crate::entity::micropost::{self, MAX_CONTENT_CHARS};
use crate::error::{AppError, ValidationErrors};

pub fn validate_content(content: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if content.trim().is_empty() {
        errors.add("content", "can't be blank");
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        errors.add("content", format!("is too long (maximum is {} characters)", MAX_CONTENT_CHARS));
    }
    errors
}

pub async fn create_post<C: ConnectionTrait>(db: &C, user_id: i32, content: &str) -> Result<micropost::Model, AppError> {
    validate_content(content).into_result()?;
    let now = Utc::now();
    let active = micropost::ActiveModel {
        user_id: Set(user_id),
        content: Set(content.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let post = active
        .insert(db)
        .await
        .map_err(|e| AppError::db("create_post", e))?;
    debug!("micropost {} created by {}", post.id, user_id);
    Ok(post)
}

/// Only the author may delete; someone else's post looks the same as a missing one.
pub async fn delete_post<C: ConnectionTrait>(db: &C, user_id: i32, post_id: i32) -> Result<(), AppError> {
    let res = micropost::Entity::delete_many()
        .filter(micropost::Column::Id.eq(post_id))
        .filter(micropost::Column::UserId.eq(user_id))
        .exec(db)
        .await
        .map_err(|e| AppError::db("delete_post", e))?;
    if res.rows_affected == 0 {
        return Err(AppError::not_found("micropost"));
    }
    Ok(())
}

pub async fn posts_of<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    page: Option<u64>,
    size: Option<u64>,
) -> Result<Page<micropost::Model>, AppError> {
    let select = micropost::Entity::find()
        .filter(micropost::Column::UserId.eq(user_id))
        .order_by_desc(micropost::Column::CreatedAt)
        .order_by_desc(micropost::Column::Id);
    db::fetch_page(db, select, page, size).await
}
