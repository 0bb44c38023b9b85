//! Picks the active completion engine for this target and exposes the thin
//! set of primitives `block.rs`/`socket.rs`/`acceptor.rs` need from it: a
//! handle to the process-wide engine, the native descriptor type, and a
//! `Drop`-safe close function to register with `Handle::new`.

#[cfg(target_os = "linux")]
mod imp {
    use nio_core::{RawDescriptor, SetupError};
    use std::sync::Arc;

    pub type Engine = nio_uring::Engine;
    pub type NativeFile = i32;
    pub type NativeSocket = i32;

    pub fn engine() -> Result<Arc<Engine>, SetupError> {
        Engine::global()
    }

    pub fn close_file_raw(raw: RawDescriptor) {
        unsafe {
            libc::close(raw.0 as i32);
        }
    }

    pub fn close_socket_raw(raw: RawDescriptor) {
        unsafe {
            libc::close(raw.0 as i32);
        }
    }

    pub fn to_native_file(raw: RawDescriptor) -> NativeFile {
        raw.0 as i32
    }

    pub fn to_native_socket(raw: RawDescriptor) -> NativeSocket {
        raw.0 as i32
    }

    pub fn from_native_file(native: NativeFile) -> RawDescriptor {
        RawDescriptor(native as i64)
    }

    pub fn from_native_socket(native: NativeSocket) -> RawDescriptor {
        RawDescriptor(native as i64)
    }
}

#[cfg(windows)]
mod imp {
    use nio_core::{RawDescriptor, SetupError};
    use std::sync::Arc;
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::Networking::WinSock::{closesocket, SOCKET};

    pub type Engine = nio_iocp::Engine;
    pub type NativeFile = HANDLE;
    pub type NativeSocket = SOCKET;

    pub fn engine() -> Result<Arc<Engine>, SetupError> {
        Engine::global()
    }

    pub fn close_file_raw(raw: RawDescriptor) {
        unsafe {
            CloseHandle(raw.0 as HANDLE);
        }
    }

    pub fn close_socket_raw(raw: RawDescriptor) {
        unsafe {
            closesocket(raw.0 as usize as SOCKET);
        }
    }

    pub fn to_native_file(raw: RawDescriptor) -> NativeFile {
        raw.0 as HANDLE
    }

    pub fn to_native_socket(raw: RawDescriptor) -> NativeSocket {
        raw.0 as usize as SOCKET
    }

    pub fn from_native_file(native: NativeFile) -> RawDescriptor {
        RawDescriptor(native as i64)
    }

    pub fn from_native_socket(native: NativeSocket) -> RawDescriptor {
        RawDescriptor(native as i64)
    }
}

pub use imp::*;
