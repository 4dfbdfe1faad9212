//! Development data: an admin, 99 more activated users, posts for the first six
//! and a follow graph around the first user.

use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::Name;
use fake::Fake;
use log::info;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, TransactionTrait};

use crate::account::{self, NewUser};
use crate::entity::user;
use crate::error::{map_tx_error, AppError};
use crate::{posts, social};

pub const EXTRA_USERS: usize = 99;
pub const POSTS_PER_USER: usize = 50;

pub async fn run(db: &DatabaseConnection) -> Result<(), AppError> {
    let existing = user::Entity::find()
        .count(db)
        .await
        .map_err(|e| AppError::db("seed count", e))?;
    if existing > 0 {
        info!("database already has {} users, skipping seed", existing);
        return Ok(());
    }

    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            let mut ids = Vec::with_capacity(EXTRA_USERS + 1);
            let admin = NewUser {
                admin: true,
                activated: true,
                password_confirmation: Some("foobar".to_string()),
                ..NewUser::new("Example User", "example@railstutorial.org", "foobar")
            };
            ids.push(account::create_user(txn, admin).await?.user.id);

            for n in 1..=EXTRA_USERS {
                let name: String = Name().fake();
                let new = NewUser {
                    activated: true,
                    ..NewUser::new(
                        truncate(&name, account::NAME_MAX_CHARS),
                        format!("example-{}@railstutorial.org", n),
                        "password",
                    )
                };
                ids.push(account::create_user(txn, new).await?.user.id);
            }

            for _ in 0..POSTS_PER_USER {
                let sentence: String = Sentence(5..6).fake();
                let content = truncate(&sentence, crate::entity::micropost::MAX_CONTENT_CHARS);
                for id in ids.iter().take(6) {
                    posts::create_post(txn, *id, &content).await?;
                }
            }

            let first = ids[0];
            for followed in &ids[2..=50] {
                social::follow(txn, first, *followed).await?;
            }
            for follower in &ids[3..=40] {
                social::follow(txn, *follower, first).await?;
            }
            Ok(())
        })
    })
    .await
    .map_err(map_tx_error)?;

    info!("seeded {} users", EXTRA_USERS + 1);
    Ok(())
}

fn truncate(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}
