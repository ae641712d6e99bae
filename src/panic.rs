//! Utilities for working with panic payloads.
//!
//! Handler code runs inside tasks that catch panics; these helpers turn the
//! payload into a log-friendly message or an APPLICATION_ERROR for the peer.

use std::{any::Any, fmt};

use crate::error::RSocketError;

/// Wrapper that formats a panic payload when logged or displayed.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to `Debug` formatting otherwise.
///
/// ```
/// use rsframe::panic::format_panic;
/// assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
/// assert_eq!(
///     format_panic(Box::new(String::from("boom"))).to_string(),
///     "boom"
/// );
/// assert!(format_panic(Box::new(5_u32)).to_string().contains("Any"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Create a [`PanicMessage`] for the given payload.
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }

/// APPLICATION_ERROR reported to the peer when a handler panics.
#[must_use]
pub fn panic_error(panic: Box<dyn Any + Send>) -> RSocketError {
    let message = format_panic(panic);
    log::error!("handler panicked: panic={message}");
    RSocketError::application(format!("handler panicked: {message}"))
}

#[cfg(test)]
mod tests {
    use logtest::Logger;

    use super::panic_error;
    use crate::error::ErrorCode;

    #[test]
    fn panics_become_application_errors() {
        let mut logger = Logger::start();
        let err = panic_error(Box::new("boom"));
        assert_eq!(err.code, ErrorCode::APPLICATION_ERROR);
        assert_eq!(err.message, "handler panicked: boom");
        let logged = std::iter::from_fn(|| logger.pop()).any(|record| {
            record.level() == log::Level::Error && record.args().contains("panic=boom")
        });
        assert!(logged, "panic should be logged");
    }
}
