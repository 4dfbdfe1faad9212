use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::db::Page;
use crate::response::PageDto;

pub mod account_activation;
pub mod cors;
pub mod micropost;
pub mod password_reset;
pub mod relationship;
pub mod session;
pub mod user;

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub size: Option<u64>,
}

pub fn to_page_dto<T, D: Serialize>(page: Page<T>, f: impl FnMut(T) -> D) -> PageDto<D> {
    let page = page.map(f);
    PageDto {
        items: page.items,
        total: page.total,
        total_page: page.total_pages,
    }
}

pub fn to_rfc3339(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}
