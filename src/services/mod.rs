//! Application services
//!
//! - [`connections`] - connection request workflow and the social graph
//! - [`notifications`] - per-user notification inbox
//! - [`posts`] - home feed, comments and likes
//! - [`mailer`] - transactional email with detached delivery

pub mod connections;
pub mod mailer;
pub mod notifications;
pub mod posts;

pub use connections::{AcceptOutcome, ConnectionStatus, ConnectionWorkflow, IncomingRequest};
pub use mailer::{ConnectionAcceptedEmail, HttpMailer, LogMailer, Mailer, WelcomeEmail};
pub use notifications::{NotificationService, NotificationView};
pub use posts::{CommentView, PostService, PostView};
