//! Outgoing account mail. Delivery is fire-and-forget: callers never see a failure.

use log::{error, info};
use url::Url;

use crate::entity::user;

pub trait Mailer: Send + Sync {
    fn send_activation(&self, user: &user::Model, token: &str);
    fn send_password_reset(&self, user: &user::Model, token: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn activation_message(app_url: &str, user: &user::Model, token: &str) -> Option<Message> {
    let link = token_link(app_url, "account_activations", token, &user.email)?;
    Some(Message {
        to: user.email.clone(),
        subject: "Account activation".to_string(),
        body: format!(
            "Hi {},\n\nWelcome to the Sample App! Click on the link below to activate your account:\n\n{}\n",
            user.name, link
        ),
    })
}

pub fn password_reset_message(app_url: &str, user: &user::Model, token: &str) -> Option<Message> {
    let link = token_link(app_url, "password_resets", token, &user.email)?;
    Some(Message {
        to: user.email.clone(),
        subject: "Password reset".to_string(),
        body: format!(
            "To reset your password click the link below:\n\n{}\n\nThis link will expire in two hours.\n\n\
             If you did not request your password to be reset, please ignore this email and your password will stay as it is.\n",
            link
        ),
    })
}

fn token_link(app_url: &str, resource: &str, token: &str, email: &str) -> Option<String> {
    let base = format!("{}/api/{}/{}/edit", app_url.trim_end_matches('/'), resource, token);
    match Url::parse(&base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("email", email);
            Some(url.to_string())
        }
        Err(e) => {
            error!("cannot build {} link from {}: {}", resource, app_url, e);
            None
        }
    }
}

/// Writes every message to the log instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogMailer {
    app_url: String,
}

impl LogMailer {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
        }
    }

    fn deliver(&self, message: Option<Message>) {
        if let Some(m) = message {
            info!("mail to={} subject={:?}\n{}", m.to, m.subject, m.body);
        }
    }
}

impl Mailer for LogMailer {
    fn send_activation(&self, user: &user::Model, token: &str) {
        self.deliver(activation_message(&self.app_url, user, token));
    }

    fn send_password_reset(&self, user: &user::Model, token: &str) {
        self.deliver(password_reset_message(&self.app_url, user, token));
    }
}
