//! Structured mail transport errors.
//!
//! Provider text is interpreted once, at the transport boundary, into a
//! [`MailErrorKind`]. Everything downstream matches on the kind.

use std::io;

use thiserror::Error;

/// What went wrong while handing a message to the mail transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailErrorKind {
    /// Connect, read or write timed out.
    Timeout,
    /// The transport could not be reached.
    Connect,
    /// Provider reports a temporary outage.
    TemporarilyUnavailable,
    /// Provider is throttling or busy.
    Busy,
    /// SMTP reply code relayed by the provider.
    SmtpReply(u16),
    /// Recipient address rejected.
    InvalidRecipient,
    /// Credentials rejected.
    AuthenticationFailed,
    /// Anything not recognised above.
    Other,
}

impl MailErrorKind {
    /// Interpret free-form provider text.
    pub fn infer(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();

        if lower.contains("authentication failed") || lower.contains("invalid credentials") {
            return Self::AuthenticationFailed;
        }
        if lower.contains("invalid email")
            || lower.contains("invalid recipient")
            || lower.contains("invalid address")
        {
            return Self::InvalidRecipient;
        }
        if let Some(code) = leading_reply_code(&lower) {
            return Self::SmtpReply(code);
        }
        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::Timeout;
        }
        if lower.contains("temporarily unavailable") {
            return Self::TemporarilyUnavailable;
        }
        if lower.contains("busy") {
            return Self::Busy;
        }
        if lower.contains("connection refused") || lower.contains("connection reset") {
            return Self::Connect;
        }
        Self::Other
    }
}

/// Three-digit 4xx/5xx reply code at the start of the text, e.g. `"451 4.3.0 ..."`.
fn leading_reply_code(text: &str) -> Option<u16> {
    let text = text.trim_start();
    let digits = text.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text[3..].starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let code: u16 = digits.parse().ok()?;
    (400..600).contains(&code).then_some(code)
}

/// Error returned by a [`MailTransport`](crate::notification::MailTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MailError {
    kind: MailErrorKind,
    message: String,
}

impl MailError {
    pub fn new(kind: MailErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build an error from provider text, inferring its kind.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: MailErrorKind::infer(&message),
            message,
        }
    }

    /// Build an error from a relay's non-success HTTP response.
    pub fn from_relay_response(status: u16, body: &str) -> Self {
        let body = body.trim();
        let kind = match MailErrorKind::infer(body) {
            MailErrorKind::Other => match status {
                401 | 403 => MailErrorKind::AuthenticationFailed,
                429 => MailErrorKind::Busy,
                502..=504 => MailErrorKind::TemporarilyUnavailable,
                _ => MailErrorKind::Other,
            },
            inferred => inferred,
        };
        let message = if body.is_empty() {
            format!("mail relay responded with HTTP {status}")
        } else {
            format!("mail relay responded with HTTP {status}: {body}")
        };
        Self { kind, message }
    }

    pub fn kind(&self) -> MailErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for MailError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => MailErrorKind::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => MailErrorKind::Connect,
            _ => MailErrorKind::infer(&err.to_string()),
        };
        Self::new(kind, err.to_string())
    }
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            MailErrorKind::Timeout
        } else if err.is_connect() {
            MailErrorKind::Connect
        } else {
            MailErrorKind::infer(&err.to_string())
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_from_provider_text() {
        assert_eq!(
            MailErrorKind::infer("535 5.7.8 Authentication failed"),
            MailErrorKind::AuthenticationFailed
        );
        assert_eq!(MailErrorKind::infer("Invalid email: foo@"), MailErrorKind::InvalidRecipient);
        assert_eq!(MailErrorKind::infer("550 mailbox unavailable"), MailErrorKind::SmtpReply(550));
        assert_eq!(MailErrorKind::infer("421 try again later"), MailErrorKind::SmtpReply(421));
        assert_eq!(MailErrorKind::infer("Connection timed out"), MailErrorKind::Timeout);
        assert_eq!(
            MailErrorKind::infer("Service temporarily unavailable"),
            MailErrorKind::TemporarilyUnavailable
        );
        assert_eq!(MailErrorKind::infer("Mail server is busy"), MailErrorKind::Busy);
        assert_eq!(MailErrorKind::infer("something odd happened"), MailErrorKind::Other);
    }

    #[test]
    fn test_reply_code_must_stand_alone() {
        assert_eq!(MailErrorKind::infer("5500 widgets"), MailErrorKind::Other);
        assert_eq!(MailErrorKind::infer("200 ok"), MailErrorKind::Other);
        assert_eq!(MailErrorKind::infer("  452 too many recipients"), MailErrorKind::SmtpReply(452));
    }

    #[test]
    fn test_io_errors_map_by_kind() {
        let timeout = io::Error::new(io::ErrorKind::TimedOut, "read timed out");
        assert_eq!(MailError::from(timeout).kind(), MailErrorKind::Timeout);

        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(MailError::from(refused).kind(), MailErrorKind::Connect);
    }

    #[test]
    fn test_relay_response_prefers_body() {
        let err = MailError::from_relay_response(502, "550 no such user");
        assert_eq!(err.kind(), MailErrorKind::SmtpReply(550));

        assert_eq!(MailError::from_relay_response(503, "").kind(), MailErrorKind::TemporarilyUnavailable);
        assert_eq!(MailError::from_relay_response(401, "nope").kind(), MailErrorKind::AuthenticationFailed);
        assert_eq!(MailError::from_relay_response(418, "teapot").kind(), MailErrorKind::Other);
    }
}
