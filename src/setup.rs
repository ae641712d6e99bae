//! Connection setup parameters and server-side validation.

use std::fmt;

use bytes::Bytes;

use crate::{
    error::RSocketError,
    keepalive::KeepAlive,
    payload::{Payload, PayloadMimeType},
};

/// Protocol version carried by SETUP and RESUME.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major version; only 1 is supported.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
}

impl Version {
    /// Version 1.0.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };
}

impl Default for Version {
    fn default() -> Self { Self::CURRENT }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parameters the client sends in SETUP. Immutable once the connection
/// starts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionSetup {
    /// Protocol version.
    pub version: Version,
    /// The client will honour LEASE frames from the server.
    pub honor_lease: bool,
    /// Keepalive settings for both sides.
    pub keep_alive: KeepAlive,
    /// Resume token; present only when resumption is requested.
    pub resume_token: Option<Bytes>,
    /// Mime types of metadata and data.
    pub mime_types: PayloadMimeType,
    /// Setup payload delivered to the server's acceptor.
    pub payload: Payload,
}

impl ConnectionSetup {
    /// Setup with defaults: version 1.0, no lease, default keepalive,
    /// octet-stream mime types, empty payload.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Override keepalive settings.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: KeepAlive) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Override mime types.
    #[must_use]
    pub fn with_mime_types(mut self, mime_types: PayloadMimeType) -> Self {
        self.mime_types = mime_types;
        self
    }

    /// Attach a setup payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Request resumption with the given token.
    #[must_use]
    pub fn with_resume_token(mut self, token: impl Into<Bytes>) -> Self {
        self.resume_token = Some(token.into());
        self
    }

    /// Agree to honour leases granted by the server.
    #[must_use]
    pub fn with_honor_lease(mut self, honor_lease: bool) -> Self {
        self.honor_lease = honor_lease;
        self
    }
}

/// Checks a received SETUP against what this server supports.
///
/// # Examples
///
/// ```
/// use rsframe::{ConnectionSetup, ErrorCode, PayloadMimeType, SetupValidator};
///
/// let validator = SetupValidator::default().with_data_mime_types(["application/json"]);
/// let setup = ConnectionSetup::new()
///     .with_mime_types(PayloadMimeType::new("application/json", "text/plain"));
/// let err = validator.validate(&setup).expect_err("text/plain is not accepted");
/// assert_eq!(err.code, ErrorCode::UNSUPPORTED_SETUP);
/// ```
#[derive(Clone, Debug)]
pub struct SetupValidator {
    metadata_mime_types: Option<Vec<String>>,
    data_mime_types: Option<Vec<String>>,
    lease_supported: bool,
    resume_supported: bool,
}

impl Default for SetupValidator {
    fn default() -> Self {
        Self {
            metadata_mime_types: None,
            data_mime_types: None,
            lease_supported: true,
            resume_supported: false,
        }
    }
}

impl SetupValidator {
    /// Accept only the listed metadata mime types.
    #[must_use]
    pub fn with_metadata_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata_mime_types = Some(mime_types.into_iter().map(Into::into).collect());
        self
    }

    /// Accept only the listed data mime types.
    #[must_use]
    pub fn with_data_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_mime_types = Some(mime_types.into_iter().map(Into::into).collect());
        self
    }

    /// Whether clients may ask to honour leases.
    #[must_use]
    pub fn with_lease_supported(mut self, supported: bool) -> Self {
        self.lease_supported = supported;
        self
    }

    /// Whether this server advertises resume support.
    #[must_use]
    pub fn resume_supported(&self) -> bool { self.resume_supported }

    /// Validate a SETUP.
    ///
    /// # Errors
    ///
    /// - `INVALID_SETUP` for an unsupported major version or zero keepalive
    ///   values.
    /// - `UNSUPPORTED_SETUP` for a resume token, a lease request the server
    ///   cannot honour, or a mime type outside the accepted lists.
    pub fn validate(&self, setup: &ConnectionSetup) -> Result<(), RSocketError> {
        if setup.version.major != Version::CURRENT.major {
            return Err(RSocketError::invalid_setup(format!(
                "unsupported version: {}",
                setup.version
            )));
        }
        if setup.keep_alive.interval.is_zero() || setup.keep_alive.max_lifetime.is_zero() {
            return Err(RSocketError::invalid_setup(
                "keepalive interval and max lifetime must be positive",
            ));
        }
        if setup.resume_token.is_some() && !self.resume_supported {
            return Err(RSocketError::unsupported_setup("resumption is not supported"));
        }
        if setup.honor_lease && !self.lease_supported {
            return Err(RSocketError::unsupported_setup("lease is not supported"));
        }
        check_mime("metadata", &setup.mime_types.metadata, self.metadata_mime_types.as_deref())?;
        check_mime("data", &setup.mime_types.data, self.data_mime_types.as_deref())
    }
}

fn check_mime(kind: &str, mime: &str, accepted: Option<&[String]>) -> Result<(), RSocketError> {
    match accepted {
        Some(list) if !list.iter().any(|candidate| candidate == mime) => Err(
            RSocketError::unsupported_setup(format!("unsupported {kind} mime type: {mime}")),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::{ConnectionSetup, SetupValidator, Version};
    use crate::{error::ErrorCode, keepalive::KeepAlive, payload::PayloadMimeType};

    #[rstest]
    #[case::default(ConnectionSetup::new(), None)]
    #[case::version(
        ConnectionSetup { version: Version { major: 2, minor: 0 }, ..ConnectionSetup::new() },
        Some(ErrorCode::INVALID_SETUP)
    )]
    #[case::zero_interval(
        ConnectionSetup::new().with_keep_alive(KeepAlive::new(Duration::ZERO, Duration::from_secs(1))),
        Some(ErrorCode::INVALID_SETUP)
    )]
    #[case::resume(
        ConnectionSetup::new().with_resume_token("token"),
        Some(ErrorCode::UNSUPPORTED_SETUP)
    )]
    #[case::metadata_mime(
        ConnectionSetup::new().with_mime_types(PayloadMimeType::new("text/xml", "application/json")),
        Some(ErrorCode::UNSUPPORTED_SETUP)
    )]
    #[case::accepted_mime(
        ConnectionSetup::new().with_mime_types(PayloadMimeType::new("text/plain", "application/json")),
        None
    )]
    fn setups_are_validated(#[case] setup: ConnectionSetup, #[case] expected: Option<ErrorCode>) {
        let validator = SetupValidator::default()
            .with_metadata_mime_types(["text/plain", "application/octet-stream"]);
        let result = validator.validate(&setup);
        assert_eq!(result.err().map(|err| err.code), expected);
    }

    #[test]
    fn lease_requests_fail_when_unsupported() {
        let validator = SetupValidator::default().with_lease_supported(false);
        let setup = ConnectionSetup::new().with_honor_lease(true);
        let err = validator.validate(&setup).expect_err("lease unsupported");
        assert_eq!(err.code, ErrorCode::UNSUPPORTED_SETUP);
        assert_eq!(err.message, "lease is not supported");
    }

    #[test]
    fn version_displays_as_major_minor() {
        assert_eq!(Version::CURRENT.to_string(), "1.0");
    }
}
