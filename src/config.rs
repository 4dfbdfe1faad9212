use std::env;

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
/// Longest session a JWT may carry.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_header: String,
    pub session_ttl_hours: i64,
    pub app_url: String,
    pub cors_origin: String,
    pub bcrypt_cost: Option<u32>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(38321);

        let sqlite_path = env::var("SQLITE_PATH").unwrap_or_else(|_| "./data/sample_app.sqlite".to_string());
        let database_url = env::var("DATABASE_URL").ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| "sample-app-development-secret".to_string());

        let token_header = env::var("TOKEN_HEADER").unwrap_or_else(|_| "token".to_string());

        let session_ttl_hours = parse_session_ttl(env::var("SESSION_TTL_HOURS").ok().as_deref());

        let app_url = env::var("APP_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", server_port));

        let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string());

        let bcrypt_cost = env::var("BCRYPT_COST").ok().and_then(|v| v.parse::<u32>().ok());

        Self {
            server_port,
            sqlite_path,
            database_url,
            jwt_secret,
            token_header,
            session_ttl_hours,
            app_url: app_url.trim_end_matches('/').to_string(),
            cors_origin,
            bcrypt_cost,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}", path)
    }
}

fn parse_session_ttl(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v.min(MAX_SESSION_TTL_HOURS))
        .unwrap_or(DEFAULT_SESSION_TTL_HOURS)
}

#[cfg(test)]
impl AppConfig {
    pub fn for_test() -> Self {
        Self {
            server_port: 0,
            sqlite_path: String::new(),
            database_url: Some("sqlite::memory:".to_string()),
            jwt_secret: "test-secret".to_string(),
            token_header: "token".to_string(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            app_url: "http://localhost:3000".to_string(),
            cors_origin: "*".to_string(),
            bcrypt_cost: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ttl_is_clamped() {
        assert_eq!(parse_session_ttl(None), DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(parse_session_ttl(Some("48")), 48);
        assert_eq!(parse_session_ttl(Some("0")), DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(parse_session_ttl(Some("-5")), DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(parse_session_ttl(Some("soon")), DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(parse_session_ttl(Some("9223372036854775807")), MAX_SESSION_TTL_HOURS);
    }
}
