//! The completion-port engine: one process-wide `HANDLE` created by
//! `CreateIoCompletionPort`, and a dedicated reaper thread blocking on
//! `GetQueuedCompletionStatus`.
//!
//! Grounded on the source repository's NTOS `IOCP` singleton (`bind`/`get`
//! pattern referenced throughout `NTOS/Module/Block.cpp` and `TCP.cpp`):
//! one port for the whole process, every handle associated with it once at
//! creation, completions delivered one at a time and dispatched by the
//! `OVERLAPPED*` the kernel hands back.

use nio_core::{Cell, EngineConfig, SetupError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, FALSE, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::System::IO::{
    CreateIoCompletionPort, GetQueuedCompletionStatus, PostQueuedCompletionStatus, OVERLAPPED,
};

/// A `HANDLE` is just an opaque pointer-sized value; the completion port
/// handle is read from many threads (every submitting façade call) but
/// never mutated after construction, so sharing it across threads is safe.
#[derive(Clone, Copy)]
struct PortHandle(HANDLE);
unsafe impl Send for PortHandle {}
unsafe impl Sync for PortHandle {}

/// Per-operation kernel-owned state: the `OVERLAPPED` block the kernel
/// writes through, boxed so its address is stable, with the owning cell
/// kept alive alongside it. `raw` MUST be the first field: the reaper casts
/// the `LPOVERLAPPED` the kernel hands back straight to `*mut Overlapped`.
#[repr(C)]
pub struct Overlapped {
    pub raw: OVERLAPPED,
    pub cell: Arc<Cell>,
}

impl Overlapped {
    pub fn new_boxed(cell: Arc<Cell>) -> Box<Overlapped> {
        Box::new(Overlapped {
            raw: unsafe { std::mem::zeroed() },
            cell,
        })
    }

    /// Set the offset fields consumed by `ReadFile`/`WriteFile`.
    pub fn set_offset(&mut self, offset: u64) {
        self.raw.Anonymous.Anonymous.Offset = (offset & 0xFFFF_FFFF) as u32;
        self.raw.Anonymous.Anonymous.OffsetHigh = (offset >> 32) as u32;
    }

    pub fn as_ptr(self: &mut Box<Self>) -> *mut OVERLAPPED {
        &mut self.raw as *mut OVERLAPPED
    }
}

pub struct Engine {
    port: PortHandle,
    config: EngineConfig,
    shutdown: Arc<AtomicBool>,
    reaper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

static ENGINE: OnceLock<Result<Arc<Engine>, SetupError>> = OnceLock::new();

impl Engine {
    pub fn global() -> Result<Arc<Engine>, SetupError> {
        ENGINE
            .get_or_init(|| Engine::new(EngineConfig::default()).map(Arc::new))
            .clone()
    }

    fn new(config: EngineConfig) -> Result<Self, SetupError> {
        let port = unsafe { CreateIoCompletionPort(INVALID_HANDLE_VALUE, 0, 0, 0) };
        if port == 0 {
            return Err(SetupError::QueueInit(unsafe { GetLastError() } as i32));
        }
        let port = PortHandle(port);
        let reaper_port = port;
        let batch = config.reaper_batch;
        let shutdown = Arc::new(AtomicBool::new(false));
        let reaper_shutdown = shutdown.clone();
        let reaper = std::thread::Builder::new()
            .name("nio-iocp-reaper".into())
            .spawn(move || reaper_loop(reaper_port, reaper_shutdown, batch))
            .expect("failed to spawn IOCP reaper thread");

        Ok(Engine {
            port,
            config,
            shutdown,
            reaper: std::sync::Mutex::new(Some(reaper)),
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Associate an OS handle (file `HANDLE` or socket cast to `HANDLE`)
    /// with the completion port. Every handle must be bound exactly once,
    /// before its first async operation.
    pub fn bind(&self, handle: HANDLE) -> Result<(), SetupError> {
        let bound = unsafe { CreateIoCompletionPort(handle, self.port.0, 0, 0) };
        if bound == 0 {
            return Err(SetupError::QueueInit(unsafe { GetLastError() } as i32));
        }
        Ok(())
    }

    /// Test-only: unblock the reaper with a zero-length completion packet
    /// tagged with a null overlapped pointer, then join it. Production
    /// lifetime is the whole process.
    #[cfg(test)]
    pub fn shutdown_for_test(&self) {
        self.shutdown.store(true, Ordering::Release);
        unsafe {
            PostQueuedCompletionStatus(self.port.0, 0, 0, std::ptr::null_mut());
        }
        if let Some(h) = self.reaper.lock().unwrap().take() {
            let _ = h.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.port.0);
        }
    }
}

fn reaper_loop(port: PortHandle, shutdown: Arc<AtomicBool>, batch: usize) {
    let mut drained = 0usize;
    while !shutdown.load(Ordering::Acquire) {
        let mut transferred: u32 = 0;
        let mut key: usize = 0;
        let mut overlapped_ptr: *mut OVERLAPPED = std::ptr::null_mut();
        let ok = unsafe {
            GetQueuedCompletionStatus(port.0, &mut transferred, &mut key, &mut overlapped_ptr, u32::MAX)
        };
        if overlapped_ptr.is_null() {
            // Our own shutdown packet (test-only), or a spurious wakeup with
            // no associated operation either way — nothing to release.
            continue;
        }
        let entry = unsafe { Box::from_raw(overlapped_ptr as *mut Overlapped) };
        let result: i64 = if ok == FALSE {
            let code = unsafe { GetLastError() };
            -(code as i64)
        } else {
            transferred as i64
        };
        entry.cell.release(result);
        drained += 1;
        if drained >= batch {
            drained = 0;
        }
    }
}
