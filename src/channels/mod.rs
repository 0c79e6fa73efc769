//! Messaging gateway
//!
//! Inbound WhatsApp messages arrive as Twilio webhook forms and are answered
//! inline with TwiML; proactive messages (reminders) go out through the
//! Twilio REST API behind [`MessageSender`].

pub mod traits;
pub mod whatsapp;

pub use traits::{ChannelError, DisabledSender, MessageSender};
pub use whatsapp::{twiml, TwilioSender, TwilioWebhookData, WhatsAppConfig};
