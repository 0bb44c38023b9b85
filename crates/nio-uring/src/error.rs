//! errno → `Status` mapping for the ring backend.
//!
//! `map_error` is total and pure: unrecognized codes fall through to
//! `Status::Unknown`. `map_result` normalizes a raw syscall-shaped return
//! value (non-negative count, or `-errno`) by taking the absolute value
//! before the lookup — this is the literal rule from the design, applied
//! even though one original source snapshot of this table called the
//! mapper directly on the still-negative value at one call site; see
//! `DESIGN.md` for why that isn't reproduced here.

use nio_core::{IoResult, Status};

pub fn map_error(code: i32) -> Status {
    if code <= 0 {
        return Status::Ok;
    }
    match code {
        libc::EACCES => Status::AccessDenied,
        libc::EADDRINUSE => Status::AddrInUse,
        libc::EADDRNOTAVAIL => Status::AddrNotAvailable,
        libc::EAFNOSUPPORT => Status::AddrFamilyNotSupported,
        libc::EAGAIN => Status::WouldBlock, // EWOULDBLOCK aliases EAGAIN on Linux
        libc::EALREADY => Status::AlreadyInProgress,
        libc::EBADF => Status::BadFileDescriptor,
        libc::EBUSY => Status::ResourceBusy,
        libc::ECANCELED => Status::Canceled,
        libc::ECONNABORTED => Status::ConnectionAborted,
        libc::ECONNREFUSED => Status::ConnectionRefused,
        libc::ECONNRESET => Status::ConnectionReset,
        libc::EDESTADDRREQ => Status::DestAddrRequired,
        libc::EEXIST => Status::AlreadyExists,
        libc::EFAULT => Status::BadAddress,
        libc::E2BIG => Status::FileTooLarge,
        libc::EHOSTUNREACH => Status::HostUnreachable,
        libc::EINTR => Status::Interrupted,
        libc::EINVAL => Status::InvalidArgument,
        libc::EIO => Status::IoError,
        libc::EISCONN => Status::AlreadyConnected,
        libc::EISDIR => Status::IsADirectory,
        libc::ELOOP => Status::TooManySymlinks,
        libc::EMFILE => Status::TooManyOpenFiles,
        libc::EMSGSIZE => Status::MessageTooLong,
        libc::ENAMETOOLONG => Status::NameTooLong,
        libc::ENETDOWN => Status::NetworkDown,
        libc::ENETUNREACH => Status::NetworkUnreachable,
        libc::ENFILE => Status::FileTableOverflow,
        libc::ENOBUFS => Status::NoBufferSpace,
        libc::ENODEV => Status::NoSuchDevice,
        libc::ENOENT => Status::NotFound,
        libc::ENOMEM => Status::OutOfMemory,
        libc::ENONET => Status::MachineNotOnNetwork,
        libc::ENOPROTOOPT => Status::ProtocolOptionNotAvailable,
        libc::ENOSPC => Status::StorageFull,
        libc::ENOSYS => Status::NotImplemented,
        libc::ENOTCONN => Status::NotConnected,
        libc::ENOTDIR => Status::NotADirectory,
        libc::ENOTEMPTY => Status::DirectoryNotEmpty,
        libc::ENOTSOCK => Status::NotASocket,
        libc::EOPNOTSUPP => Status::NotSupported,
        libc::EOVERFLOW => Status::ValueOverflow,
        libc::EPERM => Status::PermissionDenied,
        libc::EPIPE => Status::BrokenPipe,
        libc::EPROTO => Status::ProtocolError,
        libc::EPROTONOSUPPORT => Status::ProtocolNotSupported,
        libc::EPROTOTYPE => Status::WrongProtocolType,
        libc::ERANGE => Status::ResultOutOfRange,
        libc::EROFS => Status::ReadOnlyFilesystem,
        libc::ESHUTDOWN => Status::EndpointShutdown,
        libc::ESPIPE => Status::InvalidSeek,
        libc::ESRCH => Status::NoSuchProcess,
        libc::ETIMEDOUT => Status::TimedOut,
        libc::ETXTBSY => Status::TextFileBusy,
        libc::EXDEV => Status::CrossDeviceLink,
        libc::ENXIO => Status::NoSuchDeviceOrAddress,
        libc::EMLINK => Status::TooManyLinks,
        libc::ENOTTY => Status::NotATty,
        libc::EILSEQ => Status::InvalidSequence,
        libc::ESOCKTNOSUPPORT => Status::SocketTypeNotSupported,
        _ => Status::Unknown,
    }
}

/// `ret >= 0` → `(OK, ret)`; `ret < 0` → `map_error(-ret)`.
pub fn map_result(ret: i64) -> IoResult {
    if ret >= 0 {
        IoResult::ok(ret as i32)
    } else {
        IoResult::err(map_error((-ret) as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonnegative_is_ok() {
        assert_eq!(map_result(13).result(), Ok(13));
    }

    #[test]
    fn negative_normalizes_before_lookup() {
        assert_eq!(map_result(-(libc::EEXIST as i64)).status(), Status::AlreadyExists);
    }

    #[test]
    fn unknown_errno_falls_through() {
        assert_eq!(map_error(999_999), Status::Unknown);
    }

    #[test]
    fn zero_is_ok() {
        assert_eq!(map_error(0), Status::Ok);
    }
}
