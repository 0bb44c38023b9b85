//! Win32/Winsock error code → `Status` mapping for the port backend.
//!
//! Grounded on `NTOS/Module/Error.cpp`'s `map_error`: a flat `match` over
//! the `ERROR_*`/`WSAE*` codes the original repository's file and socket
//! paths actually observed, collapsing everything else to `Unknown`.

use nio_core::{IoResult, Status};
use windows_sys::Win32::Foundation::*;
use windows_sys::Win32::Networking::WinSock::*;

/// Sentinel the port platform uses in place of "this would block": the
/// synchronous call queued the operation and the real result arrives
/// through the completion port.
pub const ERROR_IO_PENDING_I32: i32 = ERROR_IO_PENDING as i32;

pub fn map_error(code: u32) -> Status {
    if code == 0 {
        return Status::Ok;
    }
    match code {
        ERROR_NOACCESS => Status::AccessDenied,
        c if c == WSAEACCES as u32 => Status::AccessDenied,
        ERROR_CANT_ACCESS_FILE => Status::AccessDenied,
        ERROR_ADDRESS_ALREADY_ASSOCIATED => Status::AddrInUse,
        c if c == WSAEADDRINUSE as u32 => Status::AddrInUse,
        c if c == WSAEADDRNOTAVAIL as u32 => Status::AddrNotAvailable,
        c if c == WSAEAFNOSUPPORT as u32 => Status::AddrFamilyNotSupported,
        c if c == WSAEWOULDBLOCK as u32 => Status::WouldBlock,
        c if c == WSAEALREADY as u32 => Status::AlreadyInProgress,
        ERROR_INVALID_FLAGS => Status::BadFileDescriptor,
        ERROR_INVALID_HANDLE => Status::BadFileDescriptor,
        ERROR_LOCK_VIOLATION => Status::ResourceBusy,
        ERROR_SHARING_VIOLATION => Status::ResourceBusy,
        ERROR_OPERATION_ABORTED => Status::Canceled,
        c if c == WSAEINTR as u32 => Status::Canceled,
        ERROR_NO_UNICODE_TRANSLATION => Status::InvalidCharset,
        ERROR_CONNECTION_ABORTED => Status::ConnectionAborted,
        c if c == WSAECONNABORTED as u32 => Status::ConnectionAborted,
        ERROR_CONNECTION_REFUSED => Status::ConnectionRefused,
        c if c == WSAECONNREFUSED as u32 => Status::ConnectionRefused,
        ERROR_NETNAME_DELETED => Status::ConnectionReset,
        c if c == WSAECONNRESET as u32 => Status::ConnectionReset,
        ERROR_ALREADY_EXISTS => Status::AlreadyExists,
        ERROR_FILE_EXISTS => Status::AlreadyExists,
        ERROR_BUFFER_OVERFLOW => Status::BadAddress,
        c if c == WSAEFAULT as u32 => Status::BadAddress,
        ERROR_HOST_UNREACHABLE => Status::HostUnreachable,
        c if c == WSAEHOSTUNREACH as u32 => Status::HostUnreachable,
        ERROR_INSUFFICIENT_BUFFER => Status::InvalidArgument,
        ERROR_INVALID_DATA => Status::InvalidArgument,
        ERROR_INVALID_PARAMETER => Status::InvalidArgument,
        c if c == WSAEINVAL as u32 => Status::InvalidArgument,
        c if c == WSAEPFNOSUPPORT as u32 => Status::InvalidArgument,
        ERROR_GEN_FAILURE => Status::IoError,
        ERROR_IO_DEVICE => Status::IoError,
        ERROR_CRC => Status::IoError,
        c if c == WSAEISCONN as u32 => Status::AlreadyConnected,
        ERROR_CANT_RESOLVE_FILENAME => Status::TooManySymlinks,
        ERROR_TOO_MANY_OPEN_FILES => Status::TooManyOpenFiles,
        c if c == WSAEMFILE as u32 => Status::TooManyOpenFiles,
        c if c == WSAEMSGSIZE as u32 => Status::MessageTooLong,
        ERROR_FILENAME_EXCED_RANGE => Status::NameTooLong,
        ERROR_NETWORK_UNREACHABLE => Status::NetworkUnreachable,
        c if c == WSAENETUNREACH as u32 => Status::NetworkUnreachable,
        c if c == WSAENOBUFS as u32 => Status::NoBufferSpace,
        ERROR_BAD_PATHNAME => Status::NotFound,
        ERROR_DIRECTORY => Status::NotFound,
        ERROR_FILE_NOT_FOUND => Status::NotFound,
        ERROR_PATH_NOT_FOUND => Status::NotFound,
        ERROR_INVALID_NAME => Status::NotFound,
        ERROR_INVALID_DRIVE => Status::NotFound,
        ERROR_MOD_NOT_FOUND => Status::NotFound,
        ERROR_NOT_ENOUGH_MEMORY => Status::OutOfMemory,
        ERROR_OUTOFMEMORY => Status::OutOfMemory,
        ERROR_DISK_FULL => Status::StorageFull,
        ERROR_HANDLE_DISK_FULL => Status::StorageFull,
        c if c == WSAENOTCONN as u32 => Status::NotConnected,
        ERROR_DIR_NOT_EMPTY => Status::DirectoryNotEmpty,
        c if c == WSAENOTSOCK as u32 => Status::NotASocket,
        ERROR_NOT_SUPPORTED => Status::NotSupported,
        ERROR_BROKEN_PIPE => Status::Eof,
        ERROR_ACCESS_DENIED => Status::PermissionDenied,
        ERROR_PRIVILEGE_NOT_HELD => Status::PermissionDenied,
        ERROR_BAD_PIPE => Status::BrokenPipe,
        ERROR_NO_DATA => Status::BrokenPipe,
        ERROR_PIPE_NOT_CONNECTED => Status::BrokenPipe,
        c if c == WSAESHUTDOWN as u32 => Status::EndpointShutdown,
        c if c == WSAEPROTONOSUPPORT as u32 => Status::ProtocolNotSupported,
        ERROR_WRITE_PROTECT => Status::ReadOnlyFilesystem,
        ERROR_SEM_TIMEOUT => Status::TimedOut,
        c if c == WSAETIMEDOUT as u32 => Status::TimedOut,
        ERROR_NOT_SAME_DEVICE => Status::CrossDeviceLink,
        ERROR_INVALID_FUNCTION => Status::IsADirectory,
        c if c == WSAESOCKTNOSUPPORT as u32 => Status::SocketTypeNotSupported,
        _ => Status::Unknown,
    }
}

/// `ret >= 0` → `(OK, ret)`; `ret < 0` → `map_error(-ret)` with the Win32
/// code packed the same way the ring backend packs `-errno` (§4.1).
pub fn map_result(ret: i64) -> IoResult {
    if ret >= 0 {
        IoResult::ok(ret as i32)
    } else {
        IoResult::err(map_error((-ret) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_ok() {
        assert_eq!(map_error(0), Status::Ok);
    }

    #[test]
    fn file_not_found_maps() {
        assert_eq!(map_error(ERROR_FILE_NOT_FOUND), Status::NotFound);
    }

    #[test]
    fn unknown_code_falls_through() {
        assert_eq!(map_error(0xDEAD_BEEF), Status::Unknown);
    }

    #[test]
    fn map_result_packs_like_the_ring_backend() {
        assert_eq!(map_result(13).result(), Ok(13));
        assert_eq!(
            map_result(-(ERROR_FILE_EXISTS as i64)).status(),
            Status::AlreadyExists
        );
    }
}
