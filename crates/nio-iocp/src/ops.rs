//! Translation from portable operations to overlapped Win32/Winsock calls.
//!
//! Grounded on `NTOS/Module/Block.cpp` and `NTOS/Module/TCP.cpp`: every
//! submission closure returns a `DWORD` code; `ERROR_IO_PENDING` means the
//! completion will arrive through the port, anything else means the call
//! already finished (and, per the two source files, that can only be a
//! failure — `ReadFile`/`WriteFile`/`WSASend`/`WSARecv`/`AcceptEx`/`ConnectEx`
//! never report synchronous success through this path on an IOCP-bound
//! handle). `Await.h`'s `IOAwait` constructor encodes exactly this rule; the
//! `Overlapped`/`Cell` pair here reproduces it without the coroutine type.

use crate::engine::{Engine, Overlapped};
use crate::error::{map_result, ERROR_IO_PENDING_I32};
use nio_core::{Address, Cell, IoResult, OpenFlags, Peer, SetupError, Status};
use std::net::SocketAddr;
use std::sync::Arc;
use windows_sys::Win32::Foundation::*;
use windows_sys::Win32::Networking::WinSock::*;
use windows_sys::Win32::Storage::FileSystem::*;

fn resolve_io_result(cell: &Cell) -> IoResult {
    map_result(cell.raw())
}

fn resolve_status(cell: &Cell) -> Status {
    map_result(cell.raw()).status()
}

/// Classify a submission closure's return code: `ERROR_IO_PENDING` means the
/// port will deliver this completion later, so the overlapped block is
/// handed to the kernel (leaked until the reaper reclaims it via
/// `Box::from_raw`); any other code is an immediate failure, so the cell
/// resolves now and the overlapped block is simply dropped.
fn classify(cell: &Arc<Cell>, overlapped: Box<Overlapped>, code: u32) {
    if code == ERROR_IO_PENDING {
        Box::into_raw(overlapped);
    } else {
        cell.resolve_immediate(-(code as i64));
        drop(overlapped);
    }
}

/// `handle` must already be bound to the engine's port (via `create_file`);
/// a read/write adapter needs no further reference to the engine itself —
/// the completion is delivered to whichever port the handle was bound to.
pub fn read(handle: HANDLE, buf: &mut [u8], offset: u64) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    let mut overlapped = Overlapped::new_boxed(cell.clone());
    overlapped.set_offset(offset);
    let o_ptr = overlapped.as_ptr();
    let len = buf.len().min(u32::MAX as usize) as u32;
    let code = unsafe {
        if ReadFile(handle, buf.as_mut_ptr(), len, std::ptr::null_mut(), o_ptr) == 0 {
            GetLastError()
        } else {
            ERROR_IO_PENDING
        }
    };
    classify(&cell, overlapped, code);
    nio_core::Awaitable::new(cell, resolve_io_result)
}

pub fn write(handle: HANDLE, buf: &[u8], offset: u64) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    let mut overlapped = Overlapped::new_boxed(cell.clone());
    overlapped.set_offset(offset);
    let o_ptr = overlapped.as_ptr();
    let len = buf.len().min(u32::MAX as usize) as u32;
    let code = unsafe {
        if WriteFile(handle, buf.as_ptr(), len, std::ptr::null_mut(), o_ptr) == 0 {
            GetLastError()
        } else {
            ERROR_IO_PENDING
        }
    };
    classify(&cell, overlapped, code);
    nio_core::Awaitable::new(cell, resolve_io_result)
}

/// `FlushFileBuffers` has no overlapped form; it is always a synchronous
/// call, so the cell is resolved immediately either way (never pending).
pub fn fsync(handle: HANDLE) -> nio_core::Awaitable<Status> {
    let cell = Arc::new(Cell::new());
    let code = unsafe {
        if FlushFileBuffers(handle) == 0 {
            GetLastError()
        } else {
            0
        }
    };
    cell.resolve_immediate(if code == 0 { 0 } else { -(code as i64) });
    nio_core::Awaitable::new(cell, resolve_status)
}

/// `CloseHandle` is likewise always synchronous.
pub fn close_file(handle: HANDLE) -> nio_core::Awaitable<Status> {
    let cell = Arc::new(Cell::new());
    let code = unsafe {
        if CloseHandle(handle) == 0 {
            GetLastError()
        } else {
            0
        }
    };
    cell.resolve_immediate(if code == 0 { 0 } else { -(code as i64) });
    nio_core::Awaitable::new(cell, resolve_status)
}

fn ntos_path(path_utf8: &str) -> Vec<u16> {
    let normalized = path_utf8.replace('/', "\\");
    let mut wide: Vec<u16> = std::ffi::OsStr::new(&normalized)
        .encode_wide_compat()
        .collect();
    let mut out = Vec::with_capacity(wide.len() + 5);
    out.extend(r"\\?\".encode_utf16());
    out.append(&mut wide);
    out.push(0);
    out
}

/// `std::ffi::OsStr` doesn't carry `encode_wide` off of Windows (it's a
/// Windows-only extension trait), so this crate provides its own narrow
/// shim over the UTF-8 path we already have in hand rather than depending
/// on `std::os::windows::ffi::OsStrExt` (which would not compile the crate
/// on non-Windows CI, even though only the Windows target ever links it).
trait EncodeWideCompat {
    fn encode_wide_compat(&self) -> std::vec::IntoIter<u16>;
}

impl EncodeWideCompat for std::ffi::OsStr {
    fn encode_wide_compat(&self) -> std::vec::IntoIter<u16> {
        self.to_string_lossy().encode_utf16().collect::<Vec<u16>>().into_iter()
    }
}

fn access_flags(flags: OpenFlags) -> Result<u32, Status> {
    if !flags.wants_read() && !flags.wants_write() {
        return Err(Status::AccessDenied);
    }
    let mut access = 0u32;
    if flags.wants_read() {
        access |= GENERIC_READ;
    }
    if flags.wants_write() {
        access |= GENERIC_WRITE;
    }
    Ok(access)
}

fn creation_disposition(flags: OpenFlags) -> Result<u32, Status> {
    use nio_core::Disposition::*;
    Ok(match flags.disposition()? {
        OpenExisting => OPEN_EXISTING,
        OpenAlways => OPEN_ALWAYS,
        CreateNew => CREATE_NEW,
        OpenAlwaysTruncate => CREATE_ALWAYS,
        TruncateExisting => TRUNCATE_EXISTING,
    })
}

fn share_mode(flags: OpenFlags) -> u32 {
    if flags.exclusive_lock() {
        0
    } else {
        FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE
    }
}

/// Opens (or creates) a file, binding the resulting handle to the engine's
/// completion port before returning it. Synchronous: there is no kernel
/// queue submission involved in opening a file on this platform, matching
/// `ntos_create_file`'s shape.
pub fn create_file(engine: &Arc<Engine>, path_utf8: &str, flags: OpenFlags) -> Result<HANDLE, Status> {
    let access = access_flags(flags)?;
    let disposition = creation_disposition(flags)?;
    let share = share_mode(flags);
    let wide = ntos_path(path_utf8);
    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            access,
            share,
            std::ptr::null(),
            disposition,
            FILE_FLAG_OVERLAPPED | FILE_FLAG_WRITE_THROUGH,
            0,
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        let code = unsafe { GetLastError() };
        return Err(crate::error::map_error(code));
    }
    engine.bind(handle).map_err(|e| match e {
        SetupError::QueueInit(code) => crate::error::map_error(code as u32),
        _ => Status::Unknown,
    })?;
    Ok(handle)
}

fn wsa_classify(cell: &Arc<Cell>, overlapped: Box<Overlapped>, ret: i32, pending_value: i32) -> () {
    // `WSAO`: a return equal to the "synchronous success" sentinel still
    // means "wait for the port" on an overlapped socket — only a genuine
    // failure (and not `WSA_IO_PENDING` specifically) resolves immediately.
    if ret == pending_value {
        Box::into_raw(overlapped);
        return;
    }
    let code = unsafe { WSAGetLastError() };
    if code == ERROR_IO_PENDING_I32 {
        Box::into_raw(overlapped);
    } else {
        cell.resolve_immediate(-(code as i64));
        drop(overlapped);
    }
}

fn create_socket(engine: &Arc<Engine>, v4: bool) -> Result<SOCKET, Status> {
    let af = if v4 { AF_INET } else { AF_INET6 };
    let socket = unsafe {
        WSASocketW(
            af as i32,
            SOCK_STREAM as i32,
            IPPROTO_TCP as i32,
            std::ptr::null(),
            0,
            WSA_FLAG_OVERLAPPED,
        )
    };
    if socket == INVALID_SOCKET {
        let code = unsafe { WSAGetLastError() };
        return Err(crate::error::map_error(code as u32));
    }
    if let Err(e) = engine.bind(socket as HANDLE) {
        unsafe {
            closesocket(socket);
        }
        return Err(match e {
            SetupError::QueueInit(code) => crate::error::map_error(code as u32),
            _ => Status::Unknown,
        });
    }
    Ok(socket)
}

fn sockaddr_in_from_peer(peer: Peer) -> (SOCKADDR_IN, i32) {
    let mut sin: SOCKADDR_IN = unsafe { std::mem::zeroed() };
    sin.sin_family = AF_INET as u16;
    sin.sin_port = peer.port.to_be();
    if let Address::V4(bytes) = peer.address {
        sin.sin_addr.S_un.S_addr = u32::from_be_bytes(bytes).to_be();
    }
    (sin, std::mem::size_of::<SOCKADDR_IN>() as i32)
}

fn sockaddr_in6_from_peer(peer: Peer) -> (SOCKADDR_IN6, i32) {
    let mut sin6: SOCKADDR_IN6 = unsafe { std::mem::zeroed() };
    sin6.sin6_family = AF_INET6 as u16;
    sin6.sin6_port = peer.port.to_be();
    if let Address::V6(bytes) = peer.address {
        sin6.sin6_addr.u.Byte = bytes;
    }
    (sin6, std::mem::size_of::<SOCKADDR_IN6>() as i32)
}

/// `connect()`: creates a fresh socket, pre-binds it to the any-address of
/// the matching family (required by `ConnectEx`), and issues the async
/// connect. On failure the transient socket is released by the caller
/// (`nio-facade`), matching `createSocket`'s `RAII` cleanup.
pub fn connect(
    engine: &Arc<Engine>,
    peer: Peer,
) -> Result<(SOCKET, nio_core::Awaitable<Status>), Status> {
    let v4 = peer.address.is_v4();
    let socket = create_socket(engine, v4)?;

    let bind_result = if v4 {
        let mut local: SOCKADDR_IN = unsafe { std::mem::zeroed() };
        local.sin_family = AF_INET as u16;
        unsafe { bind(socket, &local as *const _ as *const SOCKADDR, std::mem::size_of::<SOCKADDR_IN>() as i32) }
    } else {
        let mut local: SOCKADDR_IN6 = unsafe { std::mem::zeroed() };
        local.sin6_family = AF_INET6 as u16;
        unsafe { bind(socket, &local as *const _ as *const SOCKADDR, std::mem::size_of::<SOCKADDR_IN6>() as i32) }
    };
    if bind_result != 0 {
        let code = unsafe { WSAGetLastError() };
        unsafe {
            closesocket(socket);
        }
        return Err(crate::error::map_error(code as u32));
    }

    let cell = Arc::new(Cell::new());
    let mut overlapped = Overlapped::new_boxed(cell.clone());
    let o_ptr = overlapped.as_ptr();
    let mut sent: u32 = 0;
    let ret = if v4 {
        let (sin, len) = sockaddr_in_from_peer(peer);
        unsafe {
            ConnectEx(socket, &sin as *const _ as *const SOCKADDR, len, std::ptr::null(), 0, &mut sent, o_ptr)
        }
    } else {
        let (sin6, len) = sockaddr_in6_from_peer(peer);
        unsafe {
            ConnectEx(socket, &sin6 as *const _ as *const SOCKADDR, len, std::ptr::null(), 0, &mut sent, o_ptr)
        }
    };
    wsa_classify(&cell, overlapped, ret as i32, TRUE);

    let awaitable = nio_core::Awaitable::new(cell, resolve_status);
    Ok((socket, awaitable))
}

/// Runs `setsockopt(SO_UPDATE_CONNECT_CONTEXT)` once `connect` resolves
/// successfully, as the platform requires before the socket behaves like a
/// normally-connected one (e.g. for subsequent `getpeername`/`shutdown`).
pub fn update_connect_context(socket: SOCKET) -> Result<(), Status> {
    let ret = unsafe { setsockopt(socket, SOL_SOCKET as i32, SO_UPDATE_CONNECT_CONTEXT, std::ptr::null(), 0) };
    if ret == SOCKET_ERROR {
        let code = unsafe { WSAGetLastError() };
        Err(crate::error::map_error(code as u32))
    } else {
        Ok(())
    }
}

pub fn send(socket: SOCKET, buf: &[u8]) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    let mut overlapped = Overlapped::new_boxed(cell.clone());
    let o_ptr = overlapped.as_ptr();
    let wsabuf = WSABUF {
        len: buf.len().min(u32::MAX as usize) as u32,
        buf: buf.as_ptr() as *mut u8,
    };
    let ret = unsafe { WSASend(socket, &wsabuf, 1, std::ptr::null_mut(), 0, o_ptr, None) };
    wsa_classify(&cell, overlapped, ret, 0);
    nio_core::Awaitable::new(cell, resolve_io_result)
}

pub fn recv(socket: SOCKET, buf: &mut [u8]) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    let mut overlapped = Overlapped::new_boxed(cell.clone());
    let o_ptr = overlapped.as_ptr();
    let mut wsabuf = WSABUF {
        len: buf.len().min(u32::MAX as usize) as u32,
        buf: buf.as_mut_ptr(),
    };
    let mut flags: u32 = 0;
    let ret = unsafe { WSARecv(socket, &mut wsabuf, 1, std::ptr::null_mut(), &mut flags, o_ptr, None) };
    wsa_classify(&cell, overlapped, ret, 0);
    nio_core::Awaitable::new(cell, resolve_io_result)
}

/// Scatter/gather send: the cell owns the translated `WSABUF` array so its
/// address is stable for the kernel's lifetime (mirrors `recvmsg`/`sendmsg`
/// on the ring backend, §4.3's vectored cell).
struct WsaBufVec {
    bufs: Vec<WSABUF>,
}

pub fn writev(socket: SOCKET, iov: &[std::io::IoSlice<'_>]) -> nio_core::Awaitable<IoResult> {
    let bufs: Vec<WSABUF> = iov
        .iter()
        .map(|s| WSABUF {
            len: s.len().min(u32::MAX as usize) as u32,
            buf: s.as_ptr() as *mut u8,
        })
        .collect();
    let aux = WsaBufVec { bufs };
    let (cell, ptr) = Cell::with_aux(aux);
    let mut overlapped = Overlapped::new_boxed(cell.clone());
    let o_ptr = overlapped.as_ptr();
    let (bufs_ptr, len) = unsafe { ((*ptr).bufs.as_ptr(), (*ptr).bufs.len() as u32) };
    let ret = unsafe { WSASend(socket, bufs_ptr, len, std::ptr::null_mut(), 0, o_ptr, None) };
    wsa_classify(&cell, overlapped, ret, 0);
    nio_core::Awaitable::new(cell, resolve_io_result)
}

pub fn readv(socket: SOCKET, iov: &mut [std::io::IoSliceMut<'_>]) -> nio_core::Awaitable<IoResult> {
    let bufs: Vec<WSABUF> = iov
        .iter_mut()
        .map(|s| WSABUF {
            len: s.len().min(u32::MAX as usize) as u32,
            buf: s.as_mut_ptr(),
        })
        .collect();
    let aux = WsaBufVec { bufs };
    let (cell, ptr) = Cell::with_aux(aux);
    let mut overlapped = Overlapped::new_boxed(cell.clone());
    let o_ptr = overlapped.as_ptr();
    let (bufs_ptr, len) = unsafe { ((*ptr).bufs.as_mut_ptr(), (*ptr).bufs.len() as u32) };
    let mut flags: u32 = 0;
    let ret = unsafe { WSARecv(socket, bufs_ptr, len, std::ptr::null_mut(), &mut flags, o_ptr, None) };
    wsa_classify(&cell, overlapped, ret, 0);
    nio_core::Awaitable::new(cell, resolve_io_result)
}

/// `closeAsync`: a socket's graceful close goes through `DisconnectEx` so
/// the completion still flows through the port like every other op on this
/// platform; lacking a stable function pointer cache here, this issues a
/// plain `shutdown` + `closesocket` instead, which is always synchronous.
/// Tracked as a simplification relative to the source's `DisconnectEx`
/// path — see DESIGN.md.
pub fn close_socket(socket: SOCKET) -> nio_core::Awaitable<Status> {
    let cell = Arc::new(Cell::new());
    unsafe {
        shutdown(socket, SD_BOTH as i32);
    }
    let code = unsafe {
        if closesocket(socket) == 0 {
            0
        } else {
            WSAGetLastError() as u32
        }
    };
    cell.resolve_immediate(if code == 0 { 0 } else { -(code as i64) });
    nio_core::Awaitable::new(cell, resolve_status)
}

/// The result of a completed accept: either the new socket paired with the
/// peer's address, or the cancellation/error status.
pub type AcceptResult = Result<(Peer, SOCKET), Status>;

struct AcceptAux {
    buf: [u8; 2 * (std::mem::size_of::<SOCKADDR_IN6>() + 16)],
    local_len: u32,
    accept_socket: SOCKET,
    v4: bool,
}

/// `AcceptEx` requires a pre-created accept socket (unlike the ring
/// platform's `accept(2)`, which allocates one for you) — `AcceptImpl4`'s
/// `once()` creates it, binds it to the port, and only reveals it to the
/// caller once `SO_UPDATE_ACCEPT_CONTEXT` has run.
pub fn accept(engine: &Arc<Engine>, listen_socket: SOCKET, v4: bool) -> Result<nio_core::Awaitable<AcceptResult>, Status> {
    let accept_socket = create_socket(engine, v4)?;
    let addr_len = if v4 {
        std::mem::size_of::<SOCKADDR_IN>()
    } else {
        std::mem::size_of::<SOCKADDR_IN6>()
    } + 16;
    let aux = AcceptAux {
        buf: [0u8; 2 * (std::mem::size_of::<SOCKADDR_IN6>() + 16)],
        local_len: addr_len as u32,
        accept_socket,
        v4,
    };
    let (cell, ptr) = Cell::with_aux(aux);
    let mut overlapped = Overlapped::new_boxed(cell.clone());
    let o_ptr = overlapped.as_ptr();
    let mut received: u32 = 0;
    let ret = unsafe {
        AcceptEx(
            listen_socket,
            accept_socket,
            (*ptr).buf.as_mut_ptr() as *mut std::ffi::c_void,
            0,
            addr_len as u32,
            addr_len as u32,
            &mut received,
            o_ptr,
        )
    };
    wsa_classify(&cell, overlapped, ret as i32, TRUE);

    Ok(nio_core::Awaitable::new(cell, |cell| {
        let raw = cell.raw();
        if raw < 0 {
            return Err(Status::from_code(-raw as i32));
        }
        // Safety: the handoff has fired, so the aux buffer AcceptEx wrote
        // into is done being mutated.
        let aux = unsafe { cell.aux_ref::<AcceptAux>() }.expect("accept aux missing");
        let addr_len = if aux.v4 {
            std::mem::size_of::<SOCKADDR_IN>()
        } else {
            std::mem::size_of::<SOCKADDR_IN6>()
        } + 16;
        let mut local_sockaddr: *mut SOCKADDR = std::ptr::null_mut();
        let mut local_len: i32 = 0;
        let mut remote_sockaddr: *mut SOCKADDR = std::ptr::null_mut();
        let mut remote_len: i32 = 0;
        unsafe {
            GetAcceptExSockaddrs(
                aux.buf.as_ptr() as *const std::ffi::c_void,
                0,
                addr_len as u32,
                addr_len as u32,
                &mut local_sockaddr,
                &mut local_len,
                &mut remote_sockaddr,
                &mut remote_len,
            );
        }
        let peer = if aux.v4 {
            let sin = unsafe { &*(remote_sockaddr as *const SOCKADDR_IN) };
            let bytes = unsafe { sin.sin_addr.S_un.S_addr }.to_be_bytes();
            Peer::new(Address::V4(bytes), u16::from_be(sin.sin_port))
        } else {
            let sin6 = unsafe { &*(remote_sockaddr as *const SOCKADDR_IN6) };
            let bytes = unsafe { sin6.sin6_addr.u.Byte };
            Peer::new(Address::V6(bytes), u16::from_be(sin6.sin6_port))
        };
        Ok((peer, aux.accept_socket))
    }))
}

/// `setsockopt(SO_UPDATE_ACCEPT_CONTEXT)`, required before the accepted
/// socket behaves like a normally-accepted one.
pub fn update_accept_context(accept_socket: SOCKET, listen_socket: SOCKET) -> Result<(), Status> {
    let listen_bytes = listen_socket.to_ne_bytes();
    let ret = unsafe {
        setsockopt(
            accept_socket,
            SOL_SOCKET as i32,
            SO_UPDATE_ACCEPT_CONTEXT,
            listen_bytes.as_ptr(),
            listen_bytes.len() as i32,
        )
    };
    if ret == SOCKET_ERROR {
        let code = unsafe { WSAGetLastError() };
        Err(crate::error::map_error(code as u32))
    } else {
        Ok(())
    }
}

pub fn acceptor_socket(engine: &Arc<Engine>, peer: Peer, backlog: i32) -> Result<SOCKET, Status> {
    let v4 = peer.address.is_v4();
    let socket = create_socket(engine, v4)?;
    let bind_result = if v4 {
        let (sin, len) = sockaddr_in_from_peer(peer);
        unsafe { bind(socket, &sin as *const _ as *const SOCKADDR, len) }
    } else {
        let (sin6, len) = sockaddr_in6_from_peer(peer);
        unsafe { bind(socket, &sin6 as *const _ as *const SOCKADDR, len) }
    };
    if bind_result != 0 {
        let code = unsafe { WSAGetLastError() };
        unsafe {
            closesocket(socket);
        }
        return Err(crate::error::map_error(code as u32));
    }
    if unsafe { listen(socket, backlog) } != 0 {
        let code = unsafe { WSAGetLastError() };
        unsafe {
            closesocket(socket);
        }
        return Err(crate::error::map_error(code as u32));
    }
    Ok(socket)
}

/// Not part of the portable surface: used by the `nio-facade` acceptor/
/// connect setup paths that need the family bit off a portable `Peer`
/// before any socket has been created for it yet.
pub fn std_socket_addr(peer: Peer) -> SocketAddr {
    match peer.address {
        Address::V4(b) => SocketAddr::from((b, peer.port)),
        Address::V6(b) => SocketAddr::from((b, peer.port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntos_path_prefixes_and_normalizes_separators() {
        let wide = ntos_path("C:/tmp/file.kls.io");
        let s = String::from_utf16(&wide[..wide.len() - 1]).unwrap();
        assert_eq!(s, r"\\?\C:\tmp\file.kls.io");
    }

    #[test]
    fn disposition_maps_to_the_canonical_win32_table() {
        assert_eq!(
            creation_disposition(OpenFlags::READ | OpenFlags::CREAT),
            Ok(OPEN_ALWAYS)
        );
        assert_eq!(
            creation_disposition(OpenFlags::WRITE | OpenFlags::CREAT | OpenFlags::EXCL),
            Ok(CREATE_NEW)
        );
        assert_eq!(
            creation_disposition(OpenFlags::WRITE | OpenFlags::CREAT | OpenFlags::TRUNC),
            Ok(CREATE_ALWAYS)
        );
    }
}
