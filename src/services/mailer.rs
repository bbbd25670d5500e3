//! Transactional email
//!
//! Emails are never on the response path: callers hand a message to one of
//! the `spawn_*` helpers, which runs delivery on a detached task and logs
//! (then drops) any failure.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EmailArgs;
use crate::types::{LinkupError, Result};

/// Timeout for a single provider call
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Sent to the sender of a request once it is accepted
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionAcceptedEmail {
    pub to: String,
    pub sender_name: String,
    pub recipient_name: String,
    pub profile_url: String,
}

/// Sent after signup
#[derive(Debug, Clone, PartialEq)]
pub struct WelcomeEmail {
    pub to: String,
    pub name: String,
    pub profile_url: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_connection_accepted(&self, email: &ConnectionAcceptedEmail) -> Result<()>;

    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<()>;
}

/// Link to a user's profile page on the web client
pub fn profile_url(frontend_url: &str, username: &str) -> String {
    format!(
        "{}/profile/{}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(username)
    )
}

/// Pick the mailer for the configuration: HTTP when a token is set, log otherwise
pub fn from_args(args: &EmailArgs) -> Result<Arc<dyn Mailer>> {
    match &args.email_api_token {
        Some(token) if !token.is_empty() => Ok(Arc::new(HttpMailer::new(args, token.clone())?)),
        _ => {
            info!("EMAIL_API_TOKEN not set, emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

// ============================================================================
// Detached dispatch
// ============================================================================

/// Deliver the acceptance email in the background
pub fn spawn_connection_accepted(
    mailer: Arc<dyn Mailer>,
    email: ConnectionAcceptedEmail,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match mailer.send_connection_accepted(&email).await {
            Ok(()) => debug!(to = %email.to, "Connection accepted email sent"),
            Err(e) => warn!(to = %email.to, error = %e, "Failed to send connection accepted email"),
        }
    })
}

/// Deliver the welcome email in the background
pub fn spawn_welcome(mailer: Arc<dyn Mailer>, email: WelcomeEmail) -> JoinHandle<()> {
    tokio::spawn(async move {
        match mailer.send_welcome(&email).await {
            Ok(()) => debug!(to = %email.to, "Welcome email sent"),
            Err(e) => warn!(to = %email.to, error = %e, "Failed to send welcome email"),
        }
    })
}

// ============================================================================
// HTTP provider
// ============================================================================

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    from: Address<'a>,
    to: Vec<Address<'a>>,
    subject: String,
    html: String,
    category: &'a str,
}

/// Posts JSON messages to a transactional email API
pub struct HttpMailer {
    endpoint: String,
    token: String,
    from_email: String,
    from_name: String,
    /// HTTP client for the provider
    http_client: reqwest::Client,
}

impl HttpMailer {
    pub fn new(args: &EmailArgs, token: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| LinkupError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: args.email_api_url.clone(),
            token,
            from_email: args.email_from.clone(),
            from_name: args.email_from_name.clone(),
            http_client,
        })
    }

    async fn post(&self, to: &str, subject: String, html: String, category: &str) -> Result<()> {
        let message = OutgoingMessage {
            from: Address {
                email: &self.from_email,
                name: Some(&self.from_name),
            },
            to: vec![Address {
                email: to,
                name: None,
            }],
            subject,
            html,
            category,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LinkupError::Email(format!(
                "Provider returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_connection_accepted(&self, email: &ConnectionAcceptedEmail) -> Result<()> {
        self.post(
            &email.to,
            format!("{} accepted your connection request", email.recipient_name),
            connection_accepted_html(email),
            "connection_accepted",
        )
        .await
    }

    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<()> {
        self.post(
            &email.to,
            "Welcome to Linkup".to_string(),
            welcome_html(email),
            "welcome",
        )
        .await
    }
}

/// Writes emails to the log instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_connection_accepted(&self, email: &ConnectionAcceptedEmail) -> Result<()> {
        info!(
            to = %email.to,
            accepted_by = %email.recipient_name,
            profile = %email.profile_url,
            "[email] connection accepted"
        );
        Ok(())
    }

    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<()> {
        info!(to = %email.to, profile = %email.profile_url, "[email] welcome");
        Ok(())
    }
}

// ============================================================================
// Templates
// ============================================================================

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn connection_accepted_html(email: &ConnectionAcceptedEmail) -> String {
    format!(
        "<p>Hi {sender},</p>\
         <p><strong>{recipient}</strong> accepted your connection request on Linkup.</p>\
         <p><a href=\"{url}\">View {recipient}'s profile</a></p>",
        sender = escape(&email.sender_name),
        recipient = escape(&email.recipient_name),
        url = escape(&email.profile_url),
    )
}

fn welcome_html(email: &WelcomeEmail) -> String {
    format!(
        "<p>Welcome to Linkup, {name}!</p>\
         <p>Complete your profile to start connecting: <a href=\"{url}\">{url}</a></p>",
        name = escape(&email.name),
        url = escape(&email.profile_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing(AtomicUsize);

    #[async_trait]
    impl Mailer for Failing {
        async fn send_connection_accepted(&self, _: &ConnectionAcceptedEmail) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(LinkupError::Email("provider down".into()))
        }

        async fn send_welcome(&self, _: &WelcomeEmail) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(LinkupError::Email("provider down".into()))
        }
    }

    #[test]
    fn test_profile_url_encodes_username() {
        assert_eq!(
            profile_url("http://localhost:5173/", "ada lovelace"),
            "http://localhost:5173/profile/ada%20lovelace"
        );
        assert_eq!(
            profile_url("https://linkup.example", "ada"),
            "https://linkup.example/profile/ada"
        );
    }

    #[test]
    fn test_templates_escape_names() {
        let html = connection_accepted_html(&ConnectionAcceptedEmail {
            to: "a@example.com".into(),
            sender_name: "<b>Ada</b>".into(),
            recipient_name: "Bob".into(),
            profile_url: "http://x/profile/bob".into(),
        });
        assert!(html.contains("&lt;b&gt;Ada&lt;/b&gt;"));
        assert!(html.contains("http://x/profile/bob"));
    }

    #[tokio::test]
    async fn test_spawned_failure_is_swallowed() {
        let mailer = Arc::new(Failing(AtomicUsize::new(0)));
        let handle = spawn_connection_accepted(
            mailer.clone(),
            ConnectionAcceptedEmail {
                to: "a@example.com".into(),
                sender_name: "Ada".into(),
                recipient_name: "Bob".into(),
                profile_url: "http://x/profile/bob".into(),
            },
        );

        // The task completes normally even though delivery failed
        assert!(handle.await.is_ok());
        assert_eq!(mailer.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_log_mailer_without_token() {
        let args = EmailArgs {
            email_api_url: "http://localhost/send".into(),
            email_api_token: None,
            email_from: "no-reply@linkup.local".into(),
            email_from_name: "Linkup".into(),
        };
        assert!(from_args(&args).is_ok());
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let ok = LogMailer
            .send_welcome(&WelcomeEmail {
                to: "a@example.com".into(),
                name: "Ada".into(),
                profile_url: "http://x/profile/ada".into(),
            })
            .await;
        tokio_test::assert_ok!(ok);
    }
}
