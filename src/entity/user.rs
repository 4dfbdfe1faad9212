use chrono::{Duration, Utc};
use sea_orm::entity::prelude::*;

use crate::digest;

/// How long a password reset link stays usable.
pub const RESET_TTL_HOURS: i64 = 2;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_digest: String,
    pub remember_digest: Option<String>,
    pub activation_digest: Option<String>,
    pub activated: bool,
    pub activated_at: Option<DateTimeUtc>,
    pub reset_digest: Option<String>,
    pub reset_sent_at: Option<DateTimeUtc>,
    pub admin: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::micropost::Entity")]
    Microposts,
}

impl Related<super::micropost::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Microposts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The token-backed credentials a user can hold, each stored as a digest column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DigestKind {
    Remember,
    Activation,
    Reset,
}

impl Model {
    pub fn digest_for(&self, kind: DigestKind) -> Option<&str> {
        match kind {
            DigestKind::Remember => self.remember_digest.as_deref(),
            DigestKind::Activation => self.activation_digest.as_deref(),
            DigestKind::Reset => self.reset_digest.as_deref(),
        }
    }

    /// True when `token` matches the stored digest of `kind`. An unset digest never matches.
    pub fn authenticated(&self, kind: DigestKind, token: &str) -> bool {
        match self.digest_for(kind) {
            Some(d) => digest::verify(d, token),
            None => false,
        }
    }

    pub fn authenticate_password(&self, password: &str) -> bool {
        digest::verify(&self.password_digest, password)
    }

    pub fn password_reset_expired(&self) -> bool {
        self.password_reset_expired_at(Utc::now())
    }

    /// A reset that was never requested counts as expired.
    pub fn password_reset_expired_at(&self, now: DateTimeUtc) -> bool {
        match self.reset_sent_at {
            Some(sent) => sent < now - Duration::hours(RESET_TTL_HOURS),
            None => true,
        }
    }
}
