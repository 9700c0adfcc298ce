//! Outbound transport adapters and the QR link builder

pub mod disabled;
pub mod email;
pub mod qr;
pub mod whatsapp;

pub use disabled::{DisabledEmailSender, DisabledPhoneMessenger};
pub use email::SmtpEmailSender;
pub use qr::QrServerRenderer;
pub use whatsapp::WhatsAppMessenger;
