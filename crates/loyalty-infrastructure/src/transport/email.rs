// ============================================================================
// Loyalty Infrastructure - SMTP Email Sender
// File: crates/loyalty-infrastructure/src/transport/email.rs
// ============================================================================

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use loyalty_core::ports::{EmailSender, TransportError};
use loyalty_shared::config::EmailSettings;
use loyalty_shared::utils::mask_email;

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(settings: &EmailSettings) -> Result<Self, TransportError> {
        let from: Mailbox = settings
            .from_address
            .parse()
            .map_err(|e| TransportError::Rejected(format!("invalid from address: {}", e)))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|e| TransportError::Unavailable(e.to_string()))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(settings.username.clone(), settings.password.clone()))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_email(&self, address: &str, subject: &str, html: &str) -> Result<(), TransportError> {
        let to: Mailbox = address
            .parse()
            .map_err(|e| TransportError::Rejected(format!("invalid recipient: {}", e)))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| {
            if e.is_permanent() {
                TransportError::Rejected(e.to_string())
            } else {
                TransportError::Unavailable(e.to_string())
            }
        })?;

        debug!("Email sent to {}", mask_email(address));
        Ok(())
    }
}
