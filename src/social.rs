//! The directed follow graph and the feed built on top of it.
//!
//! Two rules are stricter than a bare relationship table: a user cannot follow
//! themselves, and following someone already followed leaves the single
//! existing row in place. Unfollowing someone not followed is a no-op.

use chrono::Utc;
use log::debug;
use sea_orm::sea_query::{Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Select, Set,
};

use crate::account;
use crate::db::{self, Page};
use crate::entity::{micropost, relationship, user};
use crate::error::{AppError, ValidationErrors};

pub async fn follow<C: ConnectionTrait>(db: &C, follower_id: i32, followed_id: i32) -> Result<(), AppError> {
    if follower_id == followed_id {
        return ValidationErrors::single("followed", "can't be yourself").into_result();
    }
    account::find_user(db, followed_id).await?;
    if is_following(db, follower_id, followed_id).await? {
        debug!("user {} already follows {}", follower_id, followed_id);
        return Ok(());
    }

    let now = Utc::now();
    let active = relationship::ActiveModel {
        follower_id: Set(follower_id),
        followed_id: Set(followed_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    if let Err(e) = active.insert(db).await {
        let msg = e.to_string();
        // lost a race against an identical follow
        if msg.contains("Duplicate") || msg.contains("UNIQUE") {
            return Ok(());
        }
        return Err(AppError::db("follow", e));
    }
    debug!("user {} follows {}", follower_id, followed_id);
    Ok(())
}

/// Returns whether a relationship was removed.
pub async fn unfollow<C: ConnectionTrait>(db: &C, follower_id: i32, followed_id: i32) -> Result<bool, AppError> {
    let res = relationship::Entity::delete_many()
        .filter(relationship::Column::FollowerId.eq(follower_id))
        .filter(relationship::Column::FollowedId.eq(followed_id))
        .exec(db)
        .await
        .map_err(|e| AppError::db("unfollow", e))?;
    Ok(res.rows_affected > 0)
}

pub async fn is_following<C: ConnectionTrait>(db: &C, follower_id: i32, followed_id: i32) -> Result<bool, AppError> {
    let count = relationship::Entity::find()
        .filter(relationship::Column::FollowerId.eq(follower_id))
        .filter(relationship::Column::FollowedId.eq(followed_id))
        .count(db)
        .await
        .map_err(|e| AppError::db("is_following", e))?;
    Ok(count > 0)
}

fn following_subquery(user_id: i32) -> SelectStatement {
    Query::select()
        .column(relationship::Column::FollowedId)
        .from(relationship::Entity)
        .and_where(relationship::Column::FollowerId.eq(user_id))
        .to_owned()
}

fn followers_subquery(user_id: i32) -> SelectStatement {
    Query::select()
        .column(relationship::Column::FollowerId)
        .from(relationship::Entity)
        .and_where(relationship::Column::FollowedId.eq(user_id))
        .to_owned()
}

#[cfg(test)]
pub async fn following_of<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<i32>, AppError> {
    use sea_orm::QuerySelect;
    relationship::Entity::find()
        .select_only()
        .column(relationship::Column::FollowedId)
        .filter(relationship::Column::FollowerId.eq(user_id))
        .order_by_asc(relationship::Column::FollowedId)
        .into_tuple::<i32>()
        .all(db)
        .await
        .map_err(|e| AppError::db("following_of", e))
}

#[cfg(test)]
pub async fn followers_of<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<i32>, AppError> {
    use sea_orm::QuerySelect;
    relationship::Entity::find()
        .select_only()
        .column(relationship::Column::FollowerId)
        .filter(relationship::Column::FollowedId.eq(user_id))
        .order_by_asc(relationship::Column::FollowerId)
        .into_tuple::<i32>()
        .all(db)
        .await
        .map_err(|e| AppError::db("followers_of", e))
}

pub fn following(user_id: i32) -> Select<user::Entity> {
    user::Entity::find()
        .filter(user::Column::Id.in_subquery(following_subquery(user_id)))
        .order_by_asc(user::Column::Id)
}

pub fn followers(user_id: i32) -> Select<user::Entity> {
    user::Entity::find()
        .filter(user::Column::Id.in_subquery(followers_subquery(user_id)))
        .order_by_asc(user::Column::Id)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FollowCounts {
    pub following: u64,
    pub followers: u64,
}

pub async fn follow_counts<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<FollowCounts, AppError> {
    let following = relationship::Entity::find()
        .filter(relationship::Column::FollowerId.eq(user_id))
        .count(db)
        .await
        .map_err(|e| AppError::db("follow_counts following", e))?;
    let followers = relationship::Entity::find()
        .filter(relationship::Column::FollowedId.eq(user_id))
        .count(db)
        .await
        .map_err(|e| AppError::db("follow_counts followers", e))?;
    Ok(FollowCounts { following, followers })
}

/// Posts by the user and by everyone the user follows, newest first. Nothing runs until executed.
pub fn feed(user_id: i32) -> Select<micropost::Entity> {
    micropost::Entity::find()
        .filter(
            Condition::any()
                .add(micropost::Column::UserId.in_subquery(following_subquery(user_id)))
                .add(micropost::Column::UserId.eq(user_id)),
        )
        .order_by_desc(micropost::Column::CreatedAt)
        .order_by_desc(micropost::Column::Id)
}

pub async fn feed_page<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    page: Option<u64>,
    size: Option<u64>,
) -> Result<Page<micropost::Model>, AppError> {
    db::fetch_page(db, feed(user_id), page, size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{create_user, destroy_user, NewUser};
    use crate::db::test_db;
    use crate::posts::create_post;

    async fn make_user<C: ConnectionTrait>(db: &C, n: u32) -> user::Model {
        create_user(
            db,
            NewUser::new(format!("User {}", n), format!("user-{}@example.com", n), "password"),
        )
        .await
        .unwrap()
        .user
    }

    async fn relationship_rows<C: ConnectionTrait>(db: &C) -> u64 {
        relationship::Entity::find().count(db).await.unwrap()
    }

    #[actix_rt::test]
    async fn follow_and_unfollow() {
        let db = test_db().await;
        let michael = make_user(&db, 1).await;
        let archer = make_user(&db, 2).await;

        assert!(!is_following(&db, michael.id, archer.id).await.unwrap());
        follow(&db, michael.id, archer.id).await.unwrap();
        assert!(is_following(&db, michael.id, archer.id).await.unwrap());
        assert!(!is_following(&db, archer.id, michael.id).await.unwrap());
        assert_eq!(followers_of(&db, archer.id).await.unwrap(), vec![michael.id]);
        assert_eq!(following_of(&db, michael.id).await.unwrap(), vec![archer.id]);

        let followed: Vec<i32> = following(michael.id)
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(followed, vec![archer.id]);
        let fans = followers(archer.id).all(&db).await.unwrap();
        assert_eq!(fans.len(), 1);
        assert_eq!(fans[0].email, michael.email);

        assert!(unfollow(&db, michael.id, archer.id).await.unwrap());
        assert!(!is_following(&db, michael.id, archer.id).await.unwrap());
    }

    #[actix_rt::test]
    async fn repeated_follow_keeps_one_row() {
        let db = test_db().await;
        let a = make_user(&db, 1).await;
        let b = make_user(&db, 2).await;

        follow(&db, a.id, b.id).await.unwrap();
        follow(&db, a.id, b.id).await.unwrap();
        assert_eq!(relationship_rows(&db).await, 1);
        assert_eq!(
            follow_counts(&db, a.id).await.unwrap(),
            FollowCounts { following: 1, followers: 0 }
        );
    }

    #[actix_rt::test]
    async fn self_follow_is_rejected() {
        let db = test_db().await;
        let a = make_user(&db, 1).await;
        let err = follow(&db, a.id, a.id).await.unwrap_err();
        assert_eq!(err.code(), 1);
        assert_eq!(err.msg(), "Followed can't be yourself");
        assert_eq!(relationship_rows(&db).await, 0);
    }

    #[actix_rt::test]
    async fn following_a_missing_user_is_not_found() {
        let db = test_db().await;
        let a = make_user(&db, 1).await;
        assert!(follow(&db, a.id, a.id + 42).await.unwrap_err().is_not_found());
    }

    #[actix_rt::test]
    async fn unfollow_without_relationship_is_a_noop() {
        let db = test_db().await;
        let a = make_user(&db, 1).await;
        let b = make_user(&db, 2).await;
        assert!(!unfollow(&db, a.id, b.id).await.unwrap());
        assert!(!is_following(&db, a.id, b.id).await.unwrap());
    }

    #[actix_rt::test]
    async fn feed_has_own_and_followed_posts_only() {
        let db = test_db().await;
        let michael = make_user(&db, 1).await;
        let archer = make_user(&db, 2).await;
        let lana = make_user(&db, 3).await;
        follow(&db, michael.id, lana.id).await.unwrap();

        for user in [&michael, &archer, &lana] {
            for i in 0..3 {
                create_post(&db, user.id, &format!("post {} by {}", i, user.name))
                    .await
                    .unwrap();
            }
        }

        let items = feed(michael.id).all(&db).await.unwrap();
        assert_eq!(items.len(), 6);
        assert!(items.iter().any(|p| p.user_id == michael.id));
        assert!(items.iter().any(|p| p.user_id == lana.id));
        assert!(items.iter().all(|p| p.user_id != archer.id));
        for pair in items.windows(2) {
            assert!(pair[0].id > pair[1].id);
        }

        // a user who follows nobody only sees their own posts
        let own = feed(archer.id).all(&db).await.unwrap();
        assert_eq!(own.len(), 3);
        assert!(own.iter().all(|p| p.user_id == archer.id));

        let page = feed_page(&db, michael.id, Some(2), Some(4)).await.unwrap();
        assert_eq!(page.total, 6);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 2);
    }

    #[actix_rt::test]
    async fn destroying_a_user_removes_their_relationships() {
        let db = test_db().await;
        let a = make_user(&db, 1).await;
        let b = make_user(&db, 2).await;
        let c = make_user(&db, 3).await;
        follow(&db, a.id, b.id).await.unwrap();
        follow(&db, c.id, a.id).await.unwrap();
        follow(&db, b.id, c.id).await.unwrap();
        create_post(&db, a.id, "soon gone").await.unwrap();

        destroy_user(&db, a.id).await.unwrap();

        let remaining = relationship::Entity::find().all(&db).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!((remaining[0].follower_id, remaining[0].followed_id), (b.id, c.id));
        assert_eq!(micropost::Entity::find().count(&db).await.unwrap(), 0);
        assert!(user::Entity::find_by_id(a.id).one(&db).await.unwrap().is_none());
    }
}
