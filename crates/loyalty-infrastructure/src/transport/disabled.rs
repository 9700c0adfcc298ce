//! Stand-ins for channels without configuration. Every send fails, so the
//! dispatcher falls through to the next channel.

use async_trait::async_trait;

use loyalty_core::ports::{EmailSender, PhoneMessenger, TransportError};

#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPhoneMessenger;

#[async_trait]
impl PhoneMessenger for DisabledPhoneMessenger {
    async fn send_phone_message(&self, _phone: &str, _text: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured("whatsapp"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send_email(&self, _address: &str, _subject: &str, _html: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured("email"))
    }
}
