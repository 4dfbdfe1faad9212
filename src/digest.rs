//! One-way hashing for passwords and tokens, and random token generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use log::warn;
use once_cell::sync::OnceCell;
use rand::{rngs::OsRng, RngCore};

use crate::error::AppError;

pub const MIN_COST: u32 = 4;

const TOKEN_BYTES: usize = 16;

static COST: OnceCell<u32> = OnceCell::new();

/// Fixes the bcrypt cost for the rest of the process. Later calls are ignored.
pub fn init_cost(cost: Option<u32>) {
    let cost = match cost {
        Some(c) if (MIN_COST..=31).contains(&c) => c,
        Some(c) => {
            warn!("BCRYPT_COST {} out of range, using default", c);
            default_cost()
        }
        None => default_cost(),
    };
    let _ = COST.set(cost);
}

pub fn cost() -> u32 {
    *COST.get_or_init(default_cost)
}

fn default_cost() -> u32 {
    if cfg!(test) {
        MIN_COST
    } else {
        bcrypt::DEFAULT_COST
    }
}

pub fn hash(secret: &str) -> Result<String, AppError> {
    bcrypt::hash(secret, cost()).map_err(|e| AppError::db("bcrypt hash", e))
}

/// A digest that is not valid bcrypt never matches.
pub fn verify(digest: &str, secret: &str) -> bool {
    bcrypt::verify(secret, digest).unwrap_or(false)
}

/// 128 random bits, URL-safe base64 without padding (22 characters).
pub fn new_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
