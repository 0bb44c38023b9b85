//! `open_block` and the `Block` handle — async file I/O at an explicit
//! offset. Grounded on `Linux5/Module/Block.cpp`'s `open_block`/`BlockImpl`
//! and `NTOS/Module/Block.cpp`'s `ntos_create_file`/`BlockImpl`.

use crate::backend;
use nio_core::{nerror, Handle, IoResult, OpenFlags, SetupError, Status};
use std::sync::Arc;

/// A file opened for async read/write at an explicit offset. Closing goes
/// through the completion engine so the caller sees the platform's real
/// close status; the `Handle`'s own destructor is only a safety net for a
/// `Block` dropped without an explicit `.close().await`.
pub struct Block {
    handle: Handle<nio_core::Block>,
    engine: Arc<backend::Engine>,
}

impl Block {
    pub fn read(&self, buf: &mut [u8], offset: u64) -> nio_core::Awaitable<IoResult> {
        #[cfg(target_os = "linux")]
        {
            nio_uring::ops::read(&self.engine, backend::to_native_file(self.handle.raw()), buf, offset)
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::read(backend::to_native_file(self.handle.raw()), buf, offset)
        }
    }

    pub fn write(&self, buf: &[u8], offset: u64) -> nio_core::Awaitable<IoResult> {
        #[cfg(target_os = "linux")]
        {
            nio_uring::ops::write(&self.engine, backend::to_native_file(self.handle.raw()), buf, offset)
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::write(backend::to_native_file(self.handle.raw()), buf, offset)
        }
    }

    /// Repeats `read` at successive offsets until `buf` is full or the file
    /// ends (§4.4's full-read utility, §8 scenario S5).
    pub async fn read_full(&self, buf: &mut [u8], offset: u64) -> IoResult {
        crate::util::full_read_at(buf, offset, |chunk, at| self.read(chunk, at)).await
    }

    /// Repeats `write` at successive offsets until `buf` is fully written
    /// (§4.4's full-write utility, §8 scenario S4).
    pub async fn write_full(&self, buf: &[u8], offset: u64) -> IoResult {
        crate::util::full_write_at(buf, offset, |chunk, at| self.write(chunk, at)).await
    }

    pub fn sync(&self) -> nio_core::Awaitable<Status> {
        #[cfg(target_os = "linux")]
        {
            nio_uring::ops::fsync(&self.engine, backend::to_native_file(self.handle.raw()), false)
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::fsync(backend::to_native_file(self.handle.raw()))
        }
    }

    pub fn close(&self) -> nio_core::Awaitable<Status> {
        self.handle.mark_closed();
        #[cfg(target_os = "linux")]
        {
            nio_uring::ops::close(&self.engine, backend::to_native_file(self.handle.raw()))
        }
        #[cfg(windows)]
        {
            let _ = &self.engine;
            nio_iocp::ops::close_file(backend::to_native_file(self.handle.raw()))
        }
    }
}

/// Opens (creating as needed, per the canonical disposition table in
/// `OpenFlags::disposition`) the file at `path`. Fails at the call site —
/// not through an awaitable — when the underlying `open`/`CreateFileW`
/// syscall itself fails, matching `open_block`'s `throw` path in the
/// source.
pub async fn open_block(path: &str, flags: OpenFlags) -> Result<Block, SetupError> {
    let engine = backend::engine()?;
    #[cfg(target_os = "linux")]
    {
        let fd = open_linux(&engine, path, flags).await?;
        Ok(Block {
            handle: Handle::new(backend::from_native_file(fd), backend::close_file_raw),
            engine,
        })
    }
    #[cfg(windows)]
    {
        let handle = nio_iocp::ops::create_file(&engine, path, flags)
            .map_err(SetupError::OpenFailed)?;
        Ok(Block {
            handle: Handle::new(backend::from_native_file(handle), backend::close_file_raw),
            engine,
        })
    }
}

#[cfg(target_os = "linux")]
async fn open_linux(
    engine: &Arc<backend::Engine>,
    path: &str,
    flags: OpenFlags,
) -> Result<backend::NativeFile, SetupError> {
    let absolute = std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| std::path::PathBuf::from(path));
    let c_path = std::ffi::CString::new(absolute.to_string_lossy().as_bytes())
        .map_err(|_| SetupError::InvalidArgument("path contains an interior NUL byte"))?;
    let posix_flags = linux_open_flags(flags)?;
    // Owner read/write only; this façade exposes no mode parameter (§4.4).
    let result = nio_uring::ops::openat(engine, &c_path, posix_flags, 0o600).await;
    let fd = match result.result() {
        Ok(fd) => fd,
        Err(status) => {
            nerror!("open_block({path}) failed: {status}");
            return Err(SetupError::OpenFailed(status));
        }
    };
    if flags.exclusive_lock() {
        // The ring platform has no share-mode concept; EXLOCK is satisfied
        // with an advisory exclusive lock taken after a successful open.
        if unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) } != 0 {
            let status = nio_uring::map_error(unsafe { *libc::__errno_location() });
            nerror!("open_block({path}) EXLOCK failed: {status}");
            unsafe {
                libc::close(fd);
            }
            return Err(SetupError::OpenFailed(status));
        }
    }
    Ok(fd)
}

#[cfg(target_os = "linux")]
fn linux_open_flags(flags: OpenFlags) -> Result<i32, Status> {
    let disposition = flags.disposition()?;
    let mut posix = if flags.wants_read() && flags.wants_write() {
        libc::O_RDWR
    } else if flags.wants_write() {
        libc::O_WRONLY
    } else {
        libc::O_RDONLY
    };
    use nio_core::Disposition::*;
    posix |= match disposition {
        OpenExisting => 0,
        OpenAlways => libc::O_CREAT,
        CreateNew => libc::O_CREAT | libc::O_EXCL,
        OpenAlwaysTruncate => libc::O_CREAT | libc::O_TRUNC,
        TruncateExisting => libc::O_TRUNC,
    };
    Ok(posix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn disposition_maps_to_posix_bits() {
        let f = OpenFlags::READ | OpenFlags::CREAT | OpenFlags::EXCL;
        let posix = linux_open_flags(f).unwrap();
        assert_eq!(posix & libc::O_CREAT, libc::O_CREAT);
        assert_eq!(posix & libc::O_EXCL, libc::O_EXCL);
    }
}
