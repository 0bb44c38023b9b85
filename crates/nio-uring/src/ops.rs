//! Translation from portable operations to io_uring SQEs.
//!
//! Each function here is one façade adapter's Linux half: format an SQE,
//! submit it under the engine's lock, and hand back the `Awaitable` the
//! caller polls. The argument mapping for each opcode follows the syscall
//! it wraps, the same convention `ksvc-module`'s opcode table used.

use crate::engine::Engine;
use crate::error::map_result;
use io_uring::{opcode, types};
use nio_core::{Address, Cell, IoResult, Peer, Status};
use std::net::SocketAddr;
use std::sync::Arc;

fn resolve_io_result(cell: &Cell) -> IoResult {
    map_result(cell.raw())
}

fn resolve_status(cell: &Cell) -> Status {
    map_result(cell.raw()).status()
}

pub fn read(engine: &Arc<Engine>, fd: i32, buf: &mut [u8], offset: u64) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    engine.submit(&cell, |tag| {
        opcode::Read::new(types::Fd(fd), buf.as_mut_ptr(), buf.len() as u32)
            .offset(offset)
            .build()
            .user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_io_result)
}

pub fn write(engine: &Arc<Engine>, fd: i32, buf: &[u8], offset: u64) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    engine.submit(&cell, |tag| {
        opcode::Write::new(types::Fd(fd), buf.as_ptr(), buf.len() as u32)
            .offset(offset)
            .build()
            .user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_io_result)
}

/// Opens `path` (already a NUL-terminated `CString`, so the caller owns
/// the buffer for the submission's lifetime) with the given POSIX flags.
/// Resolves to an `IoResult` whose count, on success, is the new fd.
pub fn openat(
    engine: &Arc<Engine>,
    path: &std::ffi::CStr,
    posix_flags: i32,
    mode: u32,
) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    let path_ptr = path.as_ptr();
    engine.submit(&cell, |tag| {
        opcode::OpenAt::new(types::Fd(libc::AT_FDCWD), path_ptr)
            .flags(posix_flags)
            .mode(mode)
            .build()
            .user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_io_result)
}

pub fn close(engine: &Arc<Engine>, fd: i32) -> nio_core::Awaitable<Status> {
    let cell = Arc::new(Cell::new());
    engine.submit(&cell, |tag| opcode::Close::new(types::Fd(fd)).build().user_data(tag));
    nio_core::Awaitable::new(cell, resolve_status)
}

pub fn fsync(engine: &Arc<Engine>, fd: i32, data_only: bool) -> nio_core::Awaitable<Status> {
    let cell = Arc::new(Cell::new());
    engine.submit(&cell, |tag| {
        let mut op = opcode::Fsync::new(types::Fd(fd));
        if data_only {
            op = op.flags(types::FsyncFlags::DATASYNC);
        }
        op.build().user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_status)
}

pub fn send(engine: &Arc<Engine>, fd: i32, buf: &[u8]) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    engine.submit(&cell, |tag| {
        opcode::Send::new(types::Fd(fd), buf.as_ptr(), buf.len() as u32)
            .build()
            .user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_io_result)
}

pub fn recv(engine: &Arc<Engine>, fd: i32, buf: &mut [u8]) -> nio_core::Awaitable<IoResult> {
    let cell = Arc::new(Cell::new());
    engine.submit(&cell, |tag| {
        opcode::Recv::new(types::Fd(fd), buf.as_mut_ptr(), buf.len() as u32)
            .build()
            .user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_io_result)
}

pub fn shutdown(engine: &Arc<Engine>, fd: i32, how: i32) -> nio_core::Awaitable<Status> {
    let cell = Arc::new(Cell::new());
    engine.submit(&cell, |tag| opcode::Shutdown::new(types::Fd(fd), how).build().user_data(tag));
    nio_core::Awaitable::new(cell, resolve_status)
}

pub fn connect(engine: &Arc<Engine>, fd: i32, peer: Peer) -> nio_core::Awaitable<Status> {
    let sockaddr = sockaddr_from_peer(peer);
    let (cell, ptr) = Cell::with_aux(sockaddr);
    let addr_ptr = ptr as *const libc::sockaddr;
    let addr_len = aux_sockaddr_len(unsafe { &*ptr });
    engine.submit(&cell, |tag| {
        opcode::Connect::new(types::Fd(fd), addr_ptr, addr_len)
            .build()
            .user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_status)
}

/// The result of a completed accept: either the new socket paired with the
/// peer's address, or the cancellation/error status.
pub type AcceptResult = Result<(Peer, nio_core::RawDescriptor), Status>;

struct AcceptAux {
    storage: libc::sockaddr_storage,
    len: libc::socklen_t,
}

pub fn accept(engine: &Arc<Engine>, listen_fd: i32) -> nio_core::Awaitable<AcceptResult> {
    let aux = AcceptAux {
        storage: unsafe { std::mem::zeroed() },
        len: std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t,
    };
    let (cell, ptr) = Cell::with_aux(aux);
    let addr_ptr = unsafe { &mut (*ptr).storage as *mut _ as *mut libc::sockaddr };
    let len_ptr = unsafe { &mut (*ptr).len as *mut libc::socklen_t };
    engine.submit(&cell, |tag| {
        opcode::Accept::new(types::Fd(listen_fd), addr_ptr, len_ptr)
            .flags(libc::SOCK_CLOEXEC)
            .build()
            .user_data(tag)
    });
    nio_core::Awaitable::new(cell, |cell| {
        let result = map_result(cell.raw());
        match result.result() {
            Ok(fd) => {
                // Safety: the handoff has fired, so the aux buffer the
                // kernel wrote into is done being mutated.
                let aux = unsafe { cell.aux_ref::<AcceptAux>() }.expect("accept aux missing");
                let peer = peer_from_sockaddr(&aux.storage);
                Ok((peer, nio_core::RawDescriptor(fd as i64)))
            }
            Err(status) => Err(status),
        }
    })
}

/// Embedded scatter/gather storage for a vectored send/recv: the cell owns
/// both the `iovec` array (copied in from the caller's slice, which only
/// needs to live until submission returns) and the `msghdr` pointing at it,
/// so both addresses stay stable for as long as the kernel holds the SQE.
struct VecAux {
    iovecs: Vec<libc::iovec>,
    msg: libc::msghdr,
}

fn vec_aux(iov: &mut [std::io::IoSliceMut<'_>]) -> VecAux {
    let iovecs: Vec<libc::iovec> = iov
        .iter_mut()
        .map(|s| libc::iovec {
            iov_base: s.as_mut_ptr() as *mut libc::c_void,
            iov_len: s.len(),
        })
        .collect();
    let msg = libc::msghdr {
        msg_name: std::ptr::null_mut(),
        msg_namelen: 0,
        msg_iov: std::ptr::null_mut(),
        msg_iovlen: iovecs.len(),
        msg_control: std::ptr::null_mut(),
        msg_controllen: 0,
        msg_flags: 0,
    };
    VecAux { iovecs, msg }
}

fn vec_aux_out(iov: &[std::io::IoSlice<'_>]) -> VecAux {
    let iovecs: Vec<libc::iovec> = iov
        .iter()
        .map(|s| libc::iovec {
            iov_base: s.as_ptr() as *mut libc::c_void,
            iov_len: s.len(),
        })
        .collect();
    let msg = libc::msghdr {
        msg_name: std::ptr::null_mut(),
        msg_namelen: 0,
        msg_iov: std::ptr::null_mut(),
        msg_iovlen: iovecs.len(),
        msg_control: std::ptr::null_mut(),
        msg_controllen: 0,
        msg_flags: 0,
    };
    VecAux { iovecs, msg }
}

/// `recvmsg(2)` via `io_uring_prep_recvmsg`: scatter the completed bytes
/// across `iov`. The cell keeps its own copy of the iovec array and the
/// `msghdr` alive for the duration of the operation (§4.3's vectored cell).
pub fn recvmsg(engine: &Arc<Engine>, fd: i32, iov: &mut [std::io::IoSliceMut<'_>]) -> nio_core::Awaitable<IoResult> {
    let mut aux = vec_aux(iov);
    aux.msg.msg_iov = aux.iovecs.as_mut_ptr();
    let (cell, ptr) = Cell::with_aux(aux);
    let msg_ptr = unsafe { &mut (*ptr).msg as *mut libc::msghdr };
    engine.submit(&cell, |tag| {
        opcode::RecvMsg::new(types::Fd(fd), msg_ptr).build().user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_io_result)
}

/// `sendmsg(2)` via `io_uring_prep_sendmsg`: gather `iov` into one send.
pub fn sendmsg(engine: &Arc<Engine>, fd: i32, iov: &[std::io::IoSlice<'_>]) -> nio_core::Awaitable<IoResult> {
    let mut aux = vec_aux_out(iov);
    aux.msg.msg_iov = aux.iovecs.as_mut_ptr();
    let (cell, ptr) = Cell::with_aux(aux);
    let msg_ptr = unsafe { &mut (*ptr).msg as *mut libc::msghdr };
    engine.submit(&cell, |tag| {
        opcode::SendMsg::new(types::Fd(fd), msg_ptr).build().user_data(tag)
    });
    nio_core::Awaitable::new(cell, resolve_io_result)
}

fn sockaddr_from_peer(peer: Peer) -> libc::sockaddr_storage {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    match peer.address {
        Address::V4(bytes) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: peer.port.to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_be_bytes(bytes).to_be(),
                },
                sin_zero: [0; 8],
            };
            unsafe {
                std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in, sin);
            }
        }
        Address::V6(bytes) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: peer.port.to_be(),
                sin6_flowinfo: 0,
                sin6_addr: libc::in6_addr { s6_addr: bytes },
                sin6_scope_id: 0,
            };
            unsafe {
                std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in6, sin6);
            }
        }
    }
    storage
}

fn aux_sockaddr_len(storage: &libc::sockaddr_storage) -> u32 {
    match storage.ss_family as i32 {
        libc::AF_INET => std::mem::size_of::<libc::sockaddr_in>() as u32,
        _ => std::mem::size_of::<libc::sockaddr_in6>() as u32,
    }
}

fn peer_from_sockaddr(storage: &libc::sockaddr_storage) -> Peer {
    match storage.ss_family as i32 {
        libc::AF_INET => {
            let sin = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
            let addr = Address::V4(u32::from_be(sin.sin_addr.s_addr).to_be_bytes());
            Peer::new(addr, u16::from_be(sin.sin_port))
        }
        _ => {
            let sin6 = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
            let addr = Address::V6(sin6.sin6_addr.s6_addr);
            Peer::new(addr, u16::from_be(sin6.sin6_port))
        }
    }
}

/// Not part of the portable surface: used by the synchronous `socket()`/
/// `bind()`/`listen()` setup path in `nio-facade` to turn a `SocketAddr`
/// (built from a portable `Peer`) into raw bytes for libc calls.
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
    fn sockaddr_round_trips_v4() {
        let peer = Peer::new(Address::V4([127, 0, 0, 1]), 30080);
        let storage = sockaddr_from_peer(peer);
        assert_eq!(peer_from_sockaddr(&storage), peer);
    }

    #[test]
    fn sockaddr_round_trips_v6() {
        let peer = Peer::new(Address::V6([0; 15].iter().chain([1].iter()).copied().collect::<Vec<_>>().try_into().unwrap()), 443);
        let storage = sockaddr_from_peer(peer);
        assert_eq!(peer_from_sockaddr(&storage), peer);
    }
}
