//! Sender identifier normalization
//!
//! The gateway prefixes WhatsApp senders with a transport scheme
//! (`whatsapp:+5547999990000`). Everything downstream keys state on the
//! bare number, treated as an opaque string.

/// Transport prefix added by the messaging gateway
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Strip one transport prefix and surrounding whitespace.
///
/// No format validation is done: malformed input passes through unchanged.
/// Idempotent for identifiers carrying at most one prefix; a doubled prefix
/// loses one layer per call.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_prefix(WHATSAPP_PREFIX) {
        Some(rest) => rest.trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Add the transport prefix for outbound sends (no-op if already present)
pub fn to_whatsapp_address(phone: &str) -> String {
    if phone.starts_with(WHATSAPP_PREFIX) {
        phone.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, phone)
    }
}
