//! User identity and credential lifecycle: sign-up, profile edits, remember-me,
//! activation, password reset and account removal.
//!
//! Writes go through an explicit pipeline instead of model callbacks:
//! [`NewUser::normalize`] lower-cases the email before every write, validation
//! collects every violated rule, and [`prepare_for_creation`] mints the
//! activation token right before the first insert. The single-column updates
//! (`remember`, `forget`, `activate`, `create_reset_digest`) bypass validation.

use chrono::Utc;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};

use crate::digest;
use crate::entity::{micropost, relationship, user};
use crate::error::{map_tx_error, AppError, ValidationErrors};

pub const NAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 255;
pub const PASSWORD_MIN_CHARS: usize = 6;
/// bcrypt only looks at the first 72 bytes.
pub const PASSWORD_MAX_BYTES: usize = 72;

// ASCII-only classes; `\w`, `\d` and case folding are Unicode-aware by default.
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i-u)^[\w+\-.]+@[a-z\d\-]+(\.[a-z\d\-]+)*\.[a-z]+$").expect("valid email regex")
});

#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: Option<String>,
    pub admin: bool,
    pub activated: bool,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
    }

    /// Field rules only; email uniqueness needs the store and is checked by [`create_user`].
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validate_name(&mut errors, &self.name);
        validate_email(&mut errors, &self.email);
        validate_password(&mut errors, &self.password, self.password_confirmation.as_deref());
        errors
    }
}

/// Changes accepted on an existing account. A blank password leaves the current one.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

impl ProfileUpdate {
    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
        if self.password.as_deref().map(str::is_empty).unwrap_or(false) {
            self.password = None;
            self.password_confirmation = None;
        }
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validate_name(&mut errors, &self.name);
        validate_email(&mut errors, &self.email);
        if let Some(password) = &self.password {
            validate_password(&mut errors, password, self.password_confirmation.as_deref());
        }
        errors
    }
}

#[derive(Clone, Debug)]
pub struct CreatedUser {
    pub user: user::Model,
    /// Never persisted; only its digest is stored.
    pub activation_token: String,
}

pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

fn validate_name(errors: &mut ValidationErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("name", "can't be blank");
    }
    if name.chars().count() > NAME_MAX_CHARS {
        errors.add("name", format!("is too long (maximum is {} characters)", NAME_MAX_CHARS));
    }
}

fn validate_email(errors: &mut ValidationErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "can't be blank");
    }
    if email.chars().count() > EMAIL_MAX_CHARS {
        errors.add("email", format!("is too long (maximum is {} characters)", EMAIL_MAX_CHARS));
    }
    if !EMAIL_REGEX.is_match(email) {
        errors.add("email", "is invalid");
    }
}

fn validate_password(errors: &mut ValidationErrors, password: &str, confirmation: Option<&str>) {
    if password.trim().is_empty() {
        errors.add("password", "can't be blank");
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.add("password", format!("is too short (minimum is {} characters)", PASSWORD_MIN_CHARS));
    }
    if password.len() > PASSWORD_MAX_BYTES {
        errors.add("password", format!("is too long (maximum is {} characters)", PASSWORD_MAX_BYTES));
    }
    if let Some(confirmation) = confirmation {
        if confirmation != password {
            errors.add("password_confirmation", "doesn't match Password");
        }
    }
}

/// Activation token and its digest, minted right before the first insert.
pub fn prepare_for_creation() -> Result<(String, String), AppError> {
    let token = digest::new_token();
    let digest = digest::hash(&token)?;
    Ok((token, digest))
}

pub async fn email_taken<C: ConnectionTrait>(
    db: &C,
    email: &str,
    except_id: Option<i32>,
) -> Result<bool, AppError> {
    let mut query = user::Entity::find().filter(user::Column::Email.eq(normalize_email(email)));
    if let Some(id) = except_id {
        query = query.filter(user::Column::Id.ne(id));
    }
    let found = query
        .one(db)
        .await
        .map_err(|e| AppError::db("email_taken", e))?;
    Ok(found.is_some())
}

pub async fn create_user<C: ConnectionTrait>(db: &C, mut new: NewUser) -> Result<CreatedUser, AppError> {
    new.normalize();
    let mut errors = new.validate();
    if !errors.has("email") && email_taken(db, &new.email, None).await? {
        errors.add("email", "has already been taken");
    }
    errors.into_result()?;

    let (activation_token, activation_digest) = prepare_for_creation()?;
    let password_digest = digest::hash(&new.password)?;
    let now = Utc::now();

    let active = user::ActiveModel {
        name: Set(new.name),
        email: Set(new.email),
        password_digest: Set(password_digest),
        remember_digest: Set(None),
        activation_digest: Set(Some(activation_digest)),
        activated: Set(new.activated),
        activated_at: Set(if new.activated { Some(now) } else { None }),
        reset_digest: Set(None),
        reset_sent_at: Set(None),
        admin: Set(new.admin),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let user = active.insert(db).await.map_err(map_unique_email)?;
    debug!("user created id={}", user.id);
    Ok(CreatedUser {
        user,
        activation_token,
    })
}

pub async fn update_profile<C: ConnectionTrait>(
    db: &C,
    user: &mut user::Model,
    mut changes: ProfileUpdate,
) -> Result<(), AppError> {
    changes.normalize();
    let mut errors = changes.validate();
    if !errors.has("email") && email_taken(db, &changes.email, Some(user.id)).await? {
        errors.add("email", "has already been taken");
    }
    errors.into_result()?;

    let mut active = user::ActiveModel {
        id: Set(user.id),
        name: Set(changes.name),
        email: Set(changes.email),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    if let Some(password) = changes.password {
        active.password_digest = Set(digest::hash(&password)?);
    }
    *user = user::Entity::update(active)
        .exec(db)
        .await
        .map_err(map_unique_email)?;
    Ok(())
}

/// Stores the digest of a fresh remember token and returns the token.
pub async fn remember<C: ConnectionTrait>(db: &C, user: &mut user::Model) -> Result<String, AppError> {
    let token = digest::new_token();
    let active = user::ActiveModel {
        id: Set(user.id),
        remember_digest: Set(Some(digest::hash(&token)?)),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    *user = update_columns(db, active, "remember").await?;
    Ok(token)
}

pub async fn forget<C: ConnectionTrait>(db: &C, user: &mut user::Model) -> Result<(), AppError> {
    let active = user::ActiveModel {
        id: Set(user.id),
        remember_digest: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    *user = update_columns(db, active, "forget").await?;
    Ok(())
}

/// Both columns go out in one UPDATE.
pub async fn activate<C: ConnectionTrait>(db: &C, user: &mut user::Model) -> Result<(), AppError> {
    let active = user::ActiveModel {
        id: Set(user.id),
        activated: Set(true),
        activated_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    *user = update_columns(db, active, "activate").await?;
    info!("user {} activated", user.id);
    Ok(())
}

/// Stores the digest of a fresh reset token with the send time and returns the token.
pub async fn create_reset_digest<C: ConnectionTrait>(
    db: &C,
    user: &mut user::Model,
) -> Result<String, AppError> {
    let token = digest::new_token();
    let active = user::ActiveModel {
        id: Set(user.id),
        reset_digest: Set(Some(digest::hash(&token)?)),
        reset_sent_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    *user = update_columns(db, active, "create_reset_digest").await?;
    Ok(token)
}

/// Sets a new password and clears the reset digest so the link cannot be reused.
pub async fn reset_password<C: ConnectionTrait>(
    db: &C,
    user: &mut user::Model,
    password: &str,
    confirmation: Option<&str>,
) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();
    if password.is_empty() {
        errors.add("password", "can't be empty");
    } else {
        validate_password(&mut errors, password, confirmation);
    }
    errors.into_result()?;

    let active = user::ActiveModel {
        id: Set(user.id),
        password_digest: Set(digest::hash(password)?),
        reset_digest: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    *user = update_columns(db, active, "reset_password").await?;
    Ok(())
}

pub async fn find_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| AppError::db("find_user", e))?
        .ok_or_else(|| AppError::not_found("user"))
}

pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<user::Model>, AppError> {
    user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
        .map_err(|e| AppError::db("find_by_email", e))
}

/// Deletes the user together with every relationship it takes part in and every post it wrote.
pub async fn destroy_user(db: &DatabaseConnection, user_id: i32) -> Result<(), AppError> {
    db.transaction::<_, (), AppError>(|txn| {
        Box::pin(async move {
            relationship::Entity::delete_many()
                .filter(relationship::Column::FollowerId.eq(user_id))
                .exec(txn)
                .await
                .map_err(|e| AppError::db("destroy_user relationships (active)", e))?;
            relationship::Entity::delete_many()
                .filter(relationship::Column::FollowedId.eq(user_id))
                .exec(txn)
                .await
                .map_err(|e| AppError::db("destroy_user relationships (passive)", e))?;
            micropost::Entity::delete_many()
                .filter(micropost::Column::UserId.eq(user_id))
                .exec(txn)
                .await
                .map_err(|e| AppError::db("destroy_user microposts", e))?;
            let res = user::Entity::delete_by_id(user_id)
                .exec(txn)
                .await
                .map_err(|e| AppError::db("destroy_user", e))?;
            if res.rows_affected == 0 {
                return Err(AppError::not_found("user"));
            }
            Ok(())
        })
    })
    .await
    .map_err(map_tx_error)?;
    info!("user {} destroyed", user_id);
    Ok(())
}

async fn update_columns<C: ConnectionTrait>(
    db: &C,
    active: user::ActiveModel,
    context: &str,
) -> Result<user::Model, AppError> {
    user::Entity::update(active).exec(db).await.map_err(|e| match e {
        DbErr::RecordNotUpdated | DbErr::RecordNotFound(_) => AppError::not_found("user"),
        e => AppError::db(context, e),
    })
}

fn map_unique_email(err: DbErr) -> AppError {
    let msg = err.to_string();
    if msg.contains("Duplicate") || msg.contains("UNIQUE") {
        return ValidationErrors::single("email", "has already been taken").into();
    }
    match err {
        DbErr::RecordNotUpdated | DbErr::RecordNotFound(_) => AppError::not_found("user"),
        e => AppError::db("user write", e),
    }
}
