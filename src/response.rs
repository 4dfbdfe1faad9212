use actix_web::{error::JsonPayloadError, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
pub struct ResponseDto<T: Serialize> {
    pub data: Option<T>,
    pub code: i32,
    pub msg: String,
}

impl<T: Serialize> ResponseDto<T> {
    pub fn success(data: Option<T>) -> Self {
        Self {
            data,
            code: 0,
            msg: "".to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDto<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_page: u64,
}

#[derive(Serialize)]
pub struct EmptyResponse {}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ResponseDto::success(Some(data)))
}

pub fn ok_empty() -> HttpResponse {
    HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None))
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let app_err = match err {
        JsonPayloadError::ContentType => AppError::param_error("unsupported content type"),
        JsonPayloadError::Deserialize(_) => AppError::param_error("malformed request body"),
        _ => AppError::param_error("invalid request"),
    };
    app_err.into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    let data = match err {
        AppError::Invalid(errors) => Some(errors.full_messages()),
        AppError::Biz { .. } => None,
    };
    HttpResponse::Ok().json(ResponseDto::<Vec<String>> {
        data,
        code: err.code(),
        msg: err.msg(),
    })
}
