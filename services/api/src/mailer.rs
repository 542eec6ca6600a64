//! Outgoing mail construction and dispatch
//!
//! Mail delivery is a fire-and-forget collaborator: callers log dispatch
//! failures but never let them undo the database work that triggered the
//! mail.

use anyhow::Result;
use tracing::info;

use crate::models::user::User;

/// A rendered mail ready for dispatch.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Render the password recovery mail for `user`.
pub fn password_reset_mail(user: &User, url: &str) -> OutgoingMail {
    let body = format!(
        "Hi {name},\n\n\
         you have requested a new password for your Ankisocial account.\n\
         To reset your password, click on the following link:\n\n\
         \x20 {url}\n\n\
         If this wasn't you, you can just ignore this email.\n\n\
         All the best,\n\
         the Ankisocial robot\n",
        name = user.name,
        url = url,
    );

    OutgoingMail {
        recipient: user.email.clone(),
        subject: "Password recovery".to_string(),
        body,
    }
}

/// Mail dispatch boundary.
#[derive(Clone, Default)]
pub struct Mailer;

impl Mailer {
    pub fn new() -> Self {
        Self
    }

    /// Hand the mail to the delivery backend.
    // TODO wire up an SMTP transport; until then the mail is only logged
    pub async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        info!("Sending \"{}\" to {}", mail.subject, mail.recipient);
        Ok(())
    }
}
