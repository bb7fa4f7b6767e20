//! SMTP implementation of the core `Notifier` trait.
//!
//! The transport authenticates with the sender address and password when a
//! password is configured, and sends unauthenticated otherwise. Port 465
//! uses implicit TLS, every other port upgrades with STARTTLS when offered.
//! Certificate validation is disabled unless `notify.accept_invalid_certs` is
//! set to `false`, so self-signed relays keep working.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use release_watch_core::config::NotifyConfig;
use release_watch_core::contract::{Notification, Notifier};
use release_watch_core::error::SendError;

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self, SendError> {
        let parameters = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| SendError(format!("invalid TLS parameters: {e}")))?;
        let tls = if config.port == IMPLICIT_TLS_PORT {
            Tls::Wrapper(parameters)
        } else {
            Tls::Opportunistic(parameters)
        };

        if config.accept_invalid_certs {
            tracing::warn!(host = %config.host, "SMTP certificate validation is disabled");
        }

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
                .port(config.port)
                .tls(tls);
        match credentials(config) {
            Some(credentials) => builder = builder.credentials(credentials),
            None => tracing::info!(host = %config.host, "No SMTP password set, sending unauthenticated"),
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

/// Sender address and password, or `None` for unauthenticated relays.
fn credentials(config: &NotifyConfig) -> Option<Credentials> {
    if config.password.is_empty() {
        return None;
    }
    Some(Credentials::new(
        config.from.clone(),
        config.password.clone(),
    ))
}

fn mailbox(address: &str) -> Result<Mailbox, SendError> {
    address
        .parse()
        .map_err(|e| SendError(format!("invalid address {address:?}: {e}")))
}

/// Build the multipart message: plain-text body first, then one part per attachment.
pub fn build_message(notification: &Notification) -> Result<Message, SendError> {
    let mut builder = Message::builder()
        .from(mailbox(&notification.from)?)
        .subject(notification.subject.clone());
    for to in &notification.to {
        builder = builder.to(mailbox(to)?);
    }

    let octet_stream = ContentType::parse("application/octet-stream")
        .map_err(|e| SendError(format!("invalid content type: {e}")))?;
    let mut body = MultiPart::mixed().singlepart(SinglePart::plain(notification.body.clone()));
    for attachment in &notification.attachments {
        body = body.singlepart(
            MailAttachment::new(attachment.filename.clone())
                .body(attachment.content.clone(), octet_stream.clone()),
        );
    }

    builder
        .multipart(body)
        .map_err(|e| SendError(format!("failed to build message: {e}")))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: Notification) -> Result<(), SendError> {
        let message = build_message(&notification)?;
        tracing::info!(
            subject = %notification.subject,
            recipients = notification.to.len(),
            attachments = notification.attachments.len(),
            "Sending notification mail"
        );
        self.transport
            .send(message)
            .await
            .map(|response| {
                tracing::debug!(code = %response.code(), "SMTP server accepted message");
            })
            .map_err(|e| SendError(e.to_string()))
    }
}
