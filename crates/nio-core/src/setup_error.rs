//! Errors thrown from synchronous, non-awaitable call sites: engine
//! construction and façade constructors that need a descriptor before
//! there is anything to await. Distinct from `Status`, which is reserved
//! for the per-operation completion channel (§7 of the design).

use std::fmt;

#[derive(Debug, Clone, Copy)]
pub enum SetupError {
    /// The kernel queue (io_uring instance / completion port) could not be
    /// created.
    QueueInit(i32),
    /// `socket()` failed before an async operation could even be queued.
    SocketCreate(crate::status::Status),
    /// `open`/`CreateFileW` failed before an async operation could even be
    /// queued.
    OpenFailed(crate::status::Status),
    /// `bind()`/`listen()` failed while standing up an acceptor.
    BindListen(crate::status::Status),
    /// An argument failed portable validation (empty access flags, an
    /// address of the wrong family, etc.) before reaching the OS at all.
    InvalidArgument(&'static str),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::QueueInit(code) => write!(f, "failed to initialize kernel queue: {code}"),
            SetupError::SocketCreate(s) => write!(f, "failed to create socket: {s}"),
            SetupError::OpenFailed(s) => write!(f, "failed to open file: {s}"),
            SetupError::BindListen(s) => write!(f, "failed to bind/listen: {s}"),
            SetupError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for SetupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_readably() {
        let e = SetupError::InvalidArgument("empty access flags");
        assert_eq!(e.to_string(), "invalid argument: empty access flags");
    }
}
