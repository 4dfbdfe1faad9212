//! End-to-end flows through the HTTP adapter.

use std::sync::Arc;

use actix_web::{test, web, App};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::{json, Value};
use url::Url;

use crate::account::{self, NewUser};
use crate::auth::issue_token;
use crate::config::AppConfig;
use crate::db::test_db;
use crate::entity::user;
use crate::mailer::testing::{RecordingMailer, Sent};
use crate::mailer::{activation_message, password_reset_message, Mailer, Message};
use crate::response::json_error_handler;

macro_rules! test_app {
    ($db:expr, $mailer:expr) => {{
        let mailer: Arc<dyn Mailer> = $mailer.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppConfig::for_test()))
                .app_data(web::Data::new($db.clone()))
                .app_data(web::Data::from(mailer))
                .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                .service(crate::api_scope()),
        )
        .await
    }};
}

async fn activated_user(db: &DatabaseConnection, name: &str, email: &str, admin: bool) -> user::Model {
    let new = NewUser {
        activated: true,
        admin,
        ..NewUser::new(name, email, "password")
    };
    account::create_user(db, new).await.unwrap().user
}

fn bearer(user: &user::Model) -> (&'static str, String) {
    ("token", issue_token(&AppConfig::for_test(), user.id).unwrap())
}

#[actix_rt::test]
async fn signup_activation_and_remembered_login() {
    let db = test_db().await;
    let mailer = Arc::new(RecordingMailer::default());
    let app = test_app!(db, mailer);

    let req = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({"name": "", "email": "user@invalid", "password": "foo", "passwordConfirmation": "bar"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 1);
    let messages: Vec<String> = serde_json::from_value(body["data"].clone()).unwrap();
    assert!(messages.contains(&"Name can't be blank".to_string()));
    assert!(messages.contains(&"Email is invalid".to_string()));
    assert!(mailer.last().is_none());

    let req = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({
            "name": "Example User",
            "email": "Flow@Example.com",
            "password": "password",
            "passwordConfirmation": "password"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    let user_id = body["data"]["id"].as_i64().unwrap();

    let token = match mailer.last() {
        Some(Sent::Activation { email, token }) => {
            assert_eq!(email, "flow@example.com");
            token
        }
        other => panic!("expected activation mail, got {:?}", other),
    };

    let login = json!({"email": "flow@example.com", "password": "password", "rememberMe": true});
    let req = test::TestRequest::post().uri("/api/sessions").set_json(&login).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 2);

    let req = test::TestRequest::get()
        .uri("/api/account_activations/wrong-token?email=flow%40example.com")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 2);

    let req = test::TestRequest::get()
        .uri(&format!("/api/account_activations/{}/edit?email=flow%40example.com", token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["userId"].as_i64(), Some(user_id));

    // an activation link works once
    let req = test::TestRequest::get()
        .uri(&format!("/api/account_activations/{}?email=flow%40example.com", token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 2);

    let req = test::TestRequest::post().uri("/api/sessions").set_json(&login).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    let session = body["data"]["token"].as_str().unwrap().to_string();
    let remember_token = body["data"]["rememberToken"].as_str().unwrap().to_string();

    let restore = json!({"userId": user_id, "rememberToken": remember_token});
    let req = test::TestRequest::post()
        .uri("/api/sessions/restore")
        .set_json(&restore)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);

    let req = test::TestRequest::post()
        .uri("/api/sessions/logout")
        .insert_header(("token", session))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);

    let req = test::TestRequest::post()
        .uri("/api/sessions/restore")
        .set_json(&restore)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 3);
}

#[actix_rt::test]
async fn wrong_password_is_rejected() {
    let db = test_db().await;
    let mailer = Arc::new(RecordingMailer::default());
    let app = test_app!(db, mailer);
    activated_user(&db, "Michael", "michael@example.com", false).await;

    let req = test::TestRequest::post()
        .uri("/api/sessions")
        .set_json(json!({"email": "MICHAEL@example.com", "password": "wrong-password"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 2);
    assert_eq!(body["msg"], "Invalid email/password combination");
}

#[actix_rt::test]
async fn follow_post_and_read_feed() {
    let db = test_db().await;
    let mailer = Arc::new(RecordingMailer::default());
    let app = test_app!(db, mailer);
    let michael = activated_user(&db, "Michael", "michael@example.com", false).await;
    let archer = activated_user(&db, "Archer", "archer@example.com", false).await;

    let req = test::TestRequest::post()
        .uri("/api/relationships")
        .insert_header(bearer(&michael))
        .set_json(json!({"followedId": michael.id}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 1);

    let req = test::TestRequest::post()
        .uri("/api/relationships")
        .insert_header(bearer(&michael))
        .set_json(json!({"followedId": archer.id}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["followersCount"], 1);

    let req = test::TestRequest::post()
        .uri("/api/microposts")
        .insert_header(bearer(&archer))
        .set_json(json!({"content": "Hello from Archer"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);

    let req = test::TestRequest::get()
        .uri("/api/feed")
        .insert_header(bearer(&michael))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["content"], "Hello from Archer");

    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{}", archer.id))
        .insert_header(bearer(&michael))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["followersCount"], 1);
    assert_eq!(body["data"]["followedByViewer"], true);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/relationships/{}", archer.id))
        .insert_header(bearer(&michael))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["followersCount"], 0);

    let req = test::TestRequest::get()
        .uri("/api/feed")
        .insert_header(bearer(&michael))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 0);

    let req = test::TestRequest::get().uri("/api/feed").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 3);
}

#[actix_rt::test]
async fn password_reset_flow() {
    let db = test_db().await;
    let mailer = Arc::new(RecordingMailer::default());
    let app = test_app!(db, mailer);
    let michael = activated_user(&db, "Michael", "michael@example.com", false).await;

    let req = test::TestRequest::post()
        .uri("/api/password_resets")
        .set_json(json!({"email": "nobody@example.com"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 2);

    let req = test::TestRequest::post()
        .uri("/api/password_resets")
        .set_json(json!({"email": "Michael@Example.com"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    let token = match mailer.last() {
        Some(Sent::PasswordReset { token, .. }) => token,
        other => panic!("expected reset mail, got {:?}", other),
    };
    let uri = format!("/api/password_resets/{}", token);

    let req = test::TestRequest::post()
        .uri(&uri)
        .set_json(json!({"email": "michael@example.com", "password": "foobaz", "passwordConfirmation": "barquux"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 1);

    let req = test::TestRequest::post()
        .uri(&uri)
        .set_json(json!({"email": "michael@example.com", "password": "", "passwordConfirmation": ""}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["msg"], "Password can't be empty");

    let req = test::TestRequest::post()
        .uri("/api/password_resets/not-the-token")
        .set_json(json!({"email": "michael@example.com", "password": "foobaz", "passwordConfirmation": "foobaz"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["msg"], "Invalid password reset link");

    let stale = user::ActiveModel {
        id: Set(michael.id),
        reset_sent_at: Set(Some(Utc::now() - Duration::hours(3))),
        ..Default::default()
    };
    stale.update(&db).await.unwrap();
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_json(json!({"email": "michael@example.com", "password": "foobaz", "passwordConfirmation": "foobaz"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["msg"], "Password reset has expired.");

    let fresh = user::ActiveModel {
        id: Set(michael.id),
        reset_sent_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    fresh.update(&db).await.unwrap();
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_json(json!({"email": "michael@example.com", "password": "foobaz", "passwordConfirmation": "foobaz"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);

    let reloaded = user::Entity::find_by_id(michael.id).one(&db).await.unwrap().unwrap();
    assert!(reloaded.reset_digest.is_none());
    assert!(reloaded.authenticate_password("foobaz"));

    // the link is spent
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_json(json!({"email": "michael@example.com", "password": "again1", "passwordConfirmation": "again1"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["msg"], "Invalid password reset link");
}

/// The path and query of the link inside a mail body, as the server sees it.
fn link_target(message: &Message) -> String {
    let link = message
        .body
        .lines()
        .find(|line| line.starts_with("http"))
        .expect("mail carries a link");
    let url = Url::parse(link).unwrap();
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

#[actix_rt::test]
async fn mailed_links_reach_their_handlers() {
    let db = test_db().await;
    let mailer = Arc::new(RecordingMailer::default());
    let app = test_app!(db, mailer);
    let app_url = AppConfig::for_test().app_url;

    let created = account::create_user(&db, NewUser::new("Pat", "p@example.com", "password"))
        .await
        .unwrap();
    let message = activation_message(&app_url, &created.user, &created.activation_token).unwrap();
    let req = test::TestRequest::get().uri(&link_target(&message)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["userId"].as_i64(), Some(created.user.id as i64));

    let mut pat = account::find_user(&db, created.user.id).await.unwrap();
    assert!(pat.activated);
    let token = account::create_reset_digest(&db, &mut pat).await.unwrap();
    let message = password_reset_message(&app_url, &pat, &token).unwrap();
    let target = link_target(&message);
    let req = test::TestRequest::get().uri(&target).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);

    let req = test::TestRequest::get()
        .uri(&target.replace(token.as_str(), "not-the-token"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["msg"], "Invalid password reset link");
}

#[actix_rt::test]
async fn only_admins_delete_users() {
    let db = test_db().await;
    let mailer = Arc::new(RecordingMailer::default());
    let app = test_app!(db, mailer);
    let admin = activated_user(&db, "Admin", "admin@example.com", true).await;
    let archer = activated_user(&db, "Archer", "archer@example.com", false).await;
    let lana = activated_user(&db, "Lana", "lana@example.com", false).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", lana.id))
        .insert_header(bearer(&archer))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 3);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", lana.id))
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    assert!(user::Entity::find_by_id(lana.id).one(&db).await.unwrap().is_none());

    let req = test::TestRequest::get()
        .uri("/api/users")
        .insert_header(bearer(&archer))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 2);
}
