//! Failure classification for retry decisions.
//!
//! Splits transport errors into failures worth retrying and failures that
//! will not succeed on another attempt. Unrecognised errors are retried.

use crate::notification::{MailError, MailErrorKind};

/// Whether a failed call may succeed if repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

/// Errors that can be classified for retry purposes.
pub trait Classify {
    fn classify(&self) -> FailureClass;
}

/// Classify a mail transport error kind.
pub fn classify(kind: MailErrorKind) -> FailureClass {
    match kind {
        MailErrorKind::Timeout
        | MailErrorKind::Connect
        | MailErrorKind::TemporarilyUnavailable
        | MailErrorKind::Busy => FailureClass::Transient,
        MailErrorKind::InvalidRecipient | MailErrorKind::AuthenticationFailed => {
            FailureClass::Permanent
        }
        MailErrorKind::SmtpReply(code) => classify_reply_code(code),
        MailErrorKind::Other => FailureClass::Transient,
    }
}

/// 550-class rejections and 535 (bad credentials) are final; other 4xx/5xx replies are retried.
fn classify_reply_code(code: u16) -> FailureClass {
    match code {
        535 | 550..=559 => FailureClass::Permanent,
        _ => FailureClass::Transient,
    }
}

impl Classify for MailError {
    fn classify(&self) -> FailureClass {
        classify(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_authentication_failure_is_permanent() {
        let err = MailError::from_message("Authentication failed for user portfolio");
        assert_eq!(err.classify(), FailureClass::Permanent);
    }

    #[test]
    fn test_socket_timeout_is_transient() {
        let err = MailError::from(io::Error::new(io::ErrorKind::TimedOut, "socket timeout"));
        assert_eq!(err.classify(), FailureClass::Transient);
    }

    #[test]
    fn test_unknown_errors_are_retried() {
        let err = MailError::from_message("the flux capacitor is misaligned");
        assert_eq!(err.kind(), MailErrorKind::Other);
        assert_eq!(err.classify(), FailureClass::Transient);
    }

    #[test]
    fn test_reply_code_table() {
        for code in [421, 450, 451, 452, 500, 503, 530] {
            assert_eq!(classify(MailErrorKind::SmtpReply(code)), FailureClass::Transient, "{code}");
        }
        for code in [535, 550, 551, 552, 553, 554] {
            assert_eq!(classify(MailErrorKind::SmtpReply(code)), FailureClass::Permanent, "{code}");
        }
    }

    #[test]
    fn test_transport_kinds() {
        assert_eq!(classify(MailErrorKind::Connect), FailureClass::Transient);
        assert_eq!(classify(MailErrorKind::Busy), FailureClass::Transient);
        assert_eq!(classify(MailErrorKind::TemporarilyUnavailable), FailureClass::Transient);
        assert_eq!(classify(MailErrorKind::InvalidRecipient), FailureClass::Permanent);
    }
}
