mod account;
mod auth;
mod config;
mod db;
mod digest;
mod entity;
mod error;
mod mailer;
mod posts;
mod response;
mod routes;
mod seed;
mod social;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use db::connect_db;
use log::{error, info};
use mailer::{LogMailer, Mailer};
use response::json_error_handler;
use routes::{account_activation, micropost, password_reset, relationship, session, user};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env();
    digest::init_cost(config.bcrypt_cost);

    let db = connect_db(&config).await.map_err(|e| {
        error!("db connect failed: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    if std::env::args().nth(1).as_deref() == Some("seed") {
        return seed::run(&db)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }

    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(config.app_url.clone()));
    let server_port = config.server_port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::from(mailer.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .wrap(actix_web::middleware::from_fn(routes::cors::cors_handler))
            .service(api_scope())
    })
    .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}

pub(crate) fn api_scope() -> actix_web::Scope {
    web::scope("/api")
        .service(web::scope("/users").configure(user::config))
        .service(web::scope("/sessions").configure(session::config))
        .service(web::scope("/account_activations").configure(account_activation::config))
        .service(web::scope("/password_resets").configure(password_reset::config))
        .service(web::scope("/relationships").configure(relationship::config))
        .service(web::scope("/microposts").configure(micropost::config))
        .service(web::scope("/feed").configure(micropost::feed_config))
}
