//! Portable error vocabulary shared by every backend.
//!
//! `Status` is the only error type that crosses the core boundary: both the
//! ring backend and the port backend map their native codes down onto this
//! single enumeration (see `nio-uring::error` / `nio-iocp::error`).

macro_rules! define_status {
    ($( $variant:ident = $val:expr => $doc:expr ),+ $(,)?) => {
        /// Portable completion status. `Ok` is always zero so that
        /// `IoResult`'s packed representation can distinguish "success with
        /// a count" from "failure with a status" by sign alone.
        #[repr(i32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Status {
            $(#[doc = $doc] $variant = $val,)+
        }

        impl Status {
            /// Total mapping from a small integer code back to a `Status`.
            /// Unrecognized codes collapse to `Unknown` rather than panicking.
            pub fn from_code(code: i32) -> Status {
                match code {
                    $($val => Status::$variant,)+
                    _ => Status::Unknown,
                }
            }

            fn message(self) -> &'static str {
                match self {
                    $(Status::$variant => $doc,)+
                }
            }
        }

        impl core::fmt::Display for Status {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.message())
            }
        }
    };
}

define_status! {
    Ok                       = 0  => "success",
    AccessDenied             = 1  => "permission denied",
    AddrInUse                = 2  => "address already in use",
    AddrNotAvailable         = 3  => "address not available",
    AddrFamilyNotSupported   = 4  => "address family not supported",
    WouldBlock               = 5  => "resource temporarily unavailable",
    AlreadyInProgress        = 6  => "connection already in progress",
    BadFileDescriptor        = 7  => "bad file descriptor",
    ResourceBusy             = 8  => "resource busy or locked",
    Canceled                 = 9  => "operation canceled",
    InvalidCharset           = 10 => "invalid unicode character",
    ConnectionAborted        = 11 => "software caused connection abort",
    ConnectionRefused        = 12 => "connection refused",
    ConnectionReset          = 13 => "connection reset by peer",
    DestAddrRequired         = 14 => "destination address required",
    AlreadyExists            = 15 => "file already exists",
    BadAddress               = 16 => "bad address in system call argument",
    FileTooLarge             = 17 => "file too large",
    HostUnreachable          = 18 => "host is unreachable",
    Interrupted              = 19 => "interrupted system call",
    InvalidArgument          = 20 => "invalid argument",
    IoError                  = 21 => "i/o error",
    AlreadyConnected         = 22 => "socket is already connected",
    IsADirectory             = 23 => "illegal operation on a directory",
    TooManySymlinks          = 24 => "too many symbolic links encountered",
    TooManyOpenFiles         = 25 => "too many open files",
    MessageTooLong           = 26 => "message too long",
    NameTooLong              = 27 => "name too long",
    NetworkDown              = 28 => "network is down",
    NetworkUnreachable       = 29 => "network is unreachable",
    FileTableOverflow        = 30 => "file table overflow",
    NoBufferSpace            = 31 => "no buffer space available",
    NoSuchDevice             = 32 => "no such device",
    NotFound                 = 33 => "no such file or directory",
    OutOfMemory              = 34 => "not enough memory",
    MachineNotOnNetwork      = 35 => "machine is not on the network",
    ProtocolOptionNotAvailable = 36 => "protocol not available",
    StorageFull              = 37 => "no space left on device",
    NotImplemented           = 38 => "function not implemented",
    NotConnected             = 39 => "socket is not connected",
    NotADirectory            = 40 => "not a directory",
    DirectoryNotEmpty        = 41 => "directory not empty",
    NotASocket               = 42 => "socket operation on non-socket",
    NotSupported             = 43 => "operation not supported",
    ValueOverflow            = 44 => "value too large for defined data type",
    PermissionDenied         = 45 => "operation not permitted",
    BrokenPipe               = 46 => "broken pipe",
    ProtocolError            = 47 => "protocol error",
    ProtocolNotSupported     = 48 => "protocol not supported",
    WrongProtocolType        = 49 => "protocol wrong type for socket",
    ResultOutOfRange         = 50 => "result too large",
    ReadOnlyFilesystem       = 51 => "read-only file system",
    EndpointShutdown         = 52 => "cannot send after transport endpoint shutdown",
    InvalidSeek              = 53 => "invalid seek",
    NoSuchProcess            = 54 => "no such process",
    TimedOut                 = 55 => "connection timed out",
    TextFileBusy             = 56 => "text file is busy",
    CrossDeviceLink          = 57 => "cross-device link not permitted",
    Unknown                  = 58 => "unknown error",
    Eof                      = 59 => "end of file",
    NoSuchDeviceOrAddress    = 60 => "no such device or address",
    TooManyLinks             = 61 => "too many links",
    NotATty                  = 62 => "inappropriate ioctl for device",
    WrongFileType            = 63 => "inappropriate file type or format",
    InvalidSequence          = 64 => "illegal byte sequence",
    SocketTypeNotSupported   = 65 => "socket type not supported",
}

impl std::error::Error for Status {}

impl Status {
    /// True for the cancellation-class statuses a pending accept/read can
    /// resolve with after its handle is closed out from under it.
    pub fn is_cancellation_class(self) -> bool {
        matches!(
            self,
            Status::Canceled | Status::EndpointShutdown | Status::ConnectionReset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_is_zero() {
        assert_eq!(Status::Ok as i32, 0);
    }

    #[test]
    fn round_trips_through_from_code() {
        for s in [
            Status::AccessDenied,
            Status::TimedOut,
            Status::Eof,
            Status::SocketTypeNotSupported,
        ] {
            assert_eq!(Status::from_code(s as i32), s);
        }
    }

    #[test]
    fn unknown_code_collapses_to_unknown() {
        assert_eq!(Status::from_code(9999), Status::Unknown);
        assert_eq!(Status::from_code(-1), Status::Unknown);
    }

    #[test]
    fn cancellation_class() {
        assert!(Status::Canceled.is_cancellation_class());
        assert!(Status::EndpointShutdown.is_cancellation_class());
        assert!(!Status::TimedOut.is_cancellation_class());
    }
}
