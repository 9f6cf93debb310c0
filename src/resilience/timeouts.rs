//! Timeout enforcement.
//!
//! # Responsibilities
//! - Hold the four outbound deadlines (connect, response, read, write)
//! - Classify transport failures into the leg that expired
//!
//! # Design Decisions
//! - Connect deadline is enforced by the TCP connector
//! - Read/write deadlines are socket inactivity limits (see `client::io`)
//! - Response deadline is armed once the request body is fully written
//! - Timeout errors are distinct from other transport errors

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::error::ProxyError;

/// Which deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutLeg {
    Connect,
    Response,
    Read,
    Write,
}

impl fmt::Display for TimeoutLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeoutLeg::Connect => "connect",
            TimeoutLeg::Response => "response",
            TimeoutLeg::Read => "read",
            TimeoutLeg::Write => "write",
        };
        f.write_str(name)
    }
}

/// Marker error carried inside `io::Error` when a socket goes idle too long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityElapsed(pub TimeoutLeg);

impl fmt::Display for InactivityElapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no bytes transferred within the {} inactivity timeout", self.0)
    }
}

impl StdError for InactivityElapsed {}

impl InactivityElapsed {
    pub fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, self)
    }
}

/// Outbound deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub response: Duration,
    pub read: Duration,
    pub write: Duration,
}

impl From<&TransportConfig> for Timeouts {
    fn from(config: &TransportConfig) -> Self {
        Self {
            connect: Duration::from_millis(config.connect_timeout_ms),
            response: Duration::from_millis(config.response_timeout_ms),
            read: Duration::from_millis(config.read_timeout_ms),
            write: Duration::from_millis(config.write_timeout_ms),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

/// Map a transport failure to a typed error.
///
/// `connecting` is true when the failure happened while establishing the
/// connection; a bare `TimedOut` there is the connect deadline.
pub fn classify_transport_error(err: &(dyn StdError + 'static), connecting: bool) -> ProxyError {
    let mut saw_timed_out = false;
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);

    while let Some(e) = current {
        if let Some(elapsed) = e.downcast_ref::<InactivityElapsed>() {
            return ProxyError::Timeout(elapsed.0);
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if let Some(elapsed) = io_err
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<InactivityElapsed>())
            {
                return ProxyError::Timeout(elapsed.0);
            }
            if io_err.kind() == io::ErrorKind::TimedOut {
                saw_timed_out = true;
            }
        }
        current = e.source();
    }

    if saw_timed_out && connecting {
        return ProxyError::Timeout(TimeoutLeg::Connect);
    }
    if saw_timed_out {
        return ProxyError::Timeout(TimeoutLeg::Read);
    }

    ProxyError::Transport(error_chain(err))
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        message.push_str(": ");
        message.push_str(&e.to_string());
        current = e.source();
    }
    message
}
