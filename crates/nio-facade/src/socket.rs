//! `connect` and the `SocketTCP` handle — async TCP I/O, including the
//! vectored `readv`/`writev` pair. Grounded on `Linux5/Module/TCP.cpp`'s
//! `connect`/`SocketTcpImpl` and `NTOS/Module/TCP.cpp`'s `connect`/
//! `SocketTcpImpl`.

use crate::backend;
use nio_core::{Handle, IoResult, Peer, SetupError, Status};
use std::sync::Arc;

pub struct SocketTCP {
    handle: Handle<nio_core::SocketTCP>,
    engine: Arc<backend::Engine>,
}

impl SocketTCP {
    pub fn read(&self, buf: &mut [u8]) -> nio_core::Awaitable<IoResult> {
        #[cfg(target_os = "linux")]
        {
            nio_uring::ops::recv(&self.engine, backend::to_native_socket(self.handle.raw()), buf)
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::recv(backend::to_native_socket(self.handle.raw()), buf)
        }
    }

    pub fn write(&self, buf: &[u8]) -> nio_core::Awaitable<IoResult> {
        #[cfg(target_os = "linux")]
        {
            nio_uring::ops::send(&self.engine, backend::to_native_socket(self.handle.raw()), buf)
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::send(backend::to_native_socket(self.handle.raw()), buf)
        }
    }

    pub fn readv(&self, iov: &mut [std::io::IoSliceMut<'_>]) -> nio_core::Awaitable<IoResult> {
        #[cfg(target_os = "linux")]
        {
            nio_uring::ops::recvmsg(&self.engine, backend::to_native_socket(self.handle.raw()), iov)
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::readv(backend::to_native_socket(self.handle.raw()), iov)
        }
    }

    pub fn writev(&self, iov: &[std::io::IoSlice<'_>]) -> nio_core::Awaitable<IoResult> {
        #[cfg(target_os = "linux")]
        {
            nio_uring::ops::sendmsg(&self.engine, backend::to_native_socket(self.handle.raw()), iov)
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::writev(backend::to_native_socket(self.handle.raw()), iov)
        }
    }

    pub fn close(&self) -> nio_core::Awaitable<Status> {
        self.handle.mark_closed();
        #[cfg(target_os = "linux")]
        {
            // Direct close on the ring platform (§4.4's socket state
            // machine). `shutdown` alone would leave the fd open forever,
            // now that `mark_closed` has disarmed the `Handle`'s `Drop`
            // safety net.
            nio_uring::ops::close(&self.engine, backend::to_native_socket(self.handle.raw()))
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::close_socket(backend::to_native_socket(self.handle.raw()))
        }
    }

    /// Repeats `read` until `buf` is full or the peer closes (§4.4's
    /// full-read utility, §8 scenario S5).
    pub async fn read_full(&self, buf: &mut [u8]) -> IoResult {
        crate::util::full_read(buf, |chunk| self.read(chunk)).await
    }

    /// Repeats `write` until `buf` is fully sent (§4.4's full-write
    /// utility, §8 scenario S4).
    pub async fn write_full(&self, buf: &[u8]) -> IoResult {
        crate::util::full_write(buf, |chunk| self.write(chunk)).await
    }
}

fn new_socket(engine: Arc<backend::Engine>, native: backend::NativeSocket) -> SocketTCP {
    SocketTCP {
        handle: Handle::new(backend::from_native_socket(native), backend::close_socket_raw),
        engine,
    }
}

/// Creates a fresh socket, pre-binds it to the any-address of the matching
/// family (required on the port platform), and issues the async connect.
/// On failure the transient socket is released before the error surfaces
/// at the call site, matching `createSocket`'s `RAII` cleanup.
pub async fn connect(peer: Peer) -> Result<SocketTCP, SetupError> {
    let engine = backend::engine()?;
    #[cfg(target_os = "linux")]
    {
        // Unlike the port platform, `connect(2)` needs no pre-bind; the
        // socket is created and the async connect issued directly (§4.4).
        let fd = unsafe {
            libc::socket(
                if peer.address.is_v4() { libc::AF_INET } else { libc::AF_INET6 },
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
                0,
            )
        };
        if fd < 0 {
            let status = nio_uring::map_error(unsafe { *libc::__errno_location() });
            return Err(SetupError::SocketCreate(status));
        }
        let status = nio_uring::ops::connect(&engine, fd, peer).await;
        if status != Status::Ok {
            unsafe {
                libc::close(fd);
            }
            return Err(SetupError::SocketCreate(status));
        }
        Ok(new_socket(engine, fd))
    }
    #[cfg(windows)]
    {
        let (socket, awaitable) =
            nio_iocp::ops::connect(&engine, peer).map_err(SetupError::SocketCreate)?;
        let status = awaitable.await;
        if status != Status::Ok {
            unsafe {
                windows_sys::Win32::Networking::WinSock::closesocket(socket);
            }
            return Err(SetupError::SocketCreate(status));
        }
        nio_iocp::ops::update_connect_context(socket).map_err(SetupError::SocketCreate)?;
        Ok(new_socket(engine, socket))
    }
}

pub(crate) fn from_accepted(engine: Arc<backend::Engine>, native: backend::NativeSocket) -> SocketTCP {
    new_socket(engine, native)
}
