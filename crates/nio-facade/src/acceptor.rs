//! `acceptor_tcp` and the `Acceptor` handle. Grounded on
//! `Linux5/Module/TCP.cpp`'s `acceptor_tcp`/`once()` and
//! `NTOS/Module/TCP.cpp`'s `acceptor4`/`acceptor6`/`AcceptImpl{4,6}::once`.

use crate::backend;
use crate::socket::{self, SocketTCP};
use nio_core::{Handle, Peer, SetupError, Status};
use std::sync::Arc;

pub struct Acceptor {
    handle: Handle<nio_core::Acceptor>,
    engine: Arc<backend::Engine>,
    #[cfg(windows)]
    v4: bool,
}

impl Acceptor {
    /// Yields exactly one fully-established connection. May be called
    /// repeatedly on the same acceptor. A pending call is cancelled by
    /// closing the acceptor — see §4.4's cancellation note.
    pub async fn once(&self) -> Result<(Peer, SocketTCP), Status> {
        #[cfg(target_os = "linux")]
        {
            let listen_fd = backend::to_native_socket(self.handle.raw());
            match nio_uring::ops::accept(&self.engine, listen_fd).await {
                Ok((peer, raw)) => {
                    let socket = socket::from_accepted(self.engine.clone(), backend::to_native_socket(raw));
                    Ok((peer, socket))
                }
                Err(status) => Err(status),
            }
        }
        #[cfg(windows)]
        {
            let listen_socket = backend::to_native_socket(self.handle.raw());
            let awaitable = nio_iocp::ops::accept(&self.engine, listen_socket, self.v4)?;
            match awaitable.await {
                Ok((peer, accept_socket)) => {
                    nio_iocp::ops::update_accept_context(accept_socket, listen_socket)?;
                    let socket = socket::from_accepted(self.engine.clone(), accept_socket);
                    Ok((peer, socket))
                }
                Err(status) => Err(status),
            }
        }
    }

    pub fn close(&self) -> nio_core::Awaitable<Status> {
        self.handle.mark_closed();
        #[cfg(target_os = "linux")]
        {
            // Direct close on the ring platform, matching `SocketTCP::close`.
            // A pending `once()` observes this as the cancellation-class
            // status the kernel reports for a closed listening fd.
            nio_uring::ops::close(&self.engine, backend::to_native_socket(self.handle.raw()))
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::close_socket(backend::to_native_socket(self.handle.raw()))
        }
    }
}

/// Binds and listens synchronously; fails at the call site, never through
/// an awaitable (§4.5).
pub fn acceptor_tcp(peer: Peer, backlog: i32) -> Result<Acceptor, SetupError> {
    let engine = backend::engine()?;
    #[cfg(target_os = "linux")]
    {
        let fd = unsafe {
            libc::socket(
                if peer.address.is_v4() { libc::AF_INET } else { libc::AF_INET6 },
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                0,
            )
        };
        if fd < 0 {
            let status = nio_uring::map_error(unsafe { *libc::__errno_location() });
            return Err(SetupError::BindListen(status));
        }
        let one: libc::c_int = 1;
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &one as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as u32,
            );
        }
        let std_addr = nio_uring::ops::std_socket_addr(peer);
        let bind_result = match std_addr {
            std::net::SocketAddr::V4(v4) => {
                let sin = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: v4.port().to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: u32::from_be_bytes(v4.ip().octets()).to_be(),
                    },
                    sin_zero: [0; 8],
                };
                unsafe {
                    libc::bind(
                        fd,
                        &sin as *const _ as *const libc::sockaddr,
                        std::mem::size_of::<libc::sockaddr_in>() as u32,
                    )
                }
            }
            std::net::SocketAddr::V6(v6) => {
                let sin6 = libc::sockaddr_in6 {
                    sin6_family: libc::AF_INET6 as libc::sa_family_t,
                    sin6_port: v6.port().to_be(),
                    sin6_flowinfo: 0,
                    sin6_addr: libc::in6_addr {
                        s6_addr: v6.ip().octets(),
                    },
                    sin6_scope_id: 0,
                };
                unsafe {
                    libc::bind(
                        fd,
                        &sin6 as *const _ as *const libc::sockaddr,
                        std::mem::size_of::<libc::sockaddr_in6>() as u32,
                    )
                }
            }
        };
        if bind_result != 0 {
            let status = nio_uring::map_error(unsafe { *libc::__errno_location() });
            unsafe {
                libc::close(fd);
            }
            return Err(SetupError::BindListen(status));
        }
        if unsafe { libc::listen(fd, backlog) } != 0 {
            let status = nio_uring::map_error(unsafe { *libc::__errno_location() });
            unsafe {
                libc::close(fd);
            }
            return Err(SetupError::BindListen(status));
        }
        Ok(Acceptor {
            handle: Handle::new(backend::from_native_socket(fd), backend::close_socket_raw),
            engine,
        })
    }
    #[cfg(windows)]
    {
        let v4 = peer.address.is_v4();
        let socket = nio_iocp::ops::acceptor_socket(&engine, peer, backlog).map_err(SetupError::BindListen)?;
        Ok(Acceptor {
            handle: Handle::new(backend::from_native_socket(socket), backend::close_socket_raw),
            engine,
            v4,
        })
    }
}
