//! `Handle<R>` — a non-copyable OS descriptor with a single-shot destructor.
//!
//! `R` is a zero-sized role marker (`Block`, `SocketTCP`, `Acceptor`); it
//! exists purely so the façade layer cannot pass a file handle where a
//! socket handle is expected. The actual close syscall is supplied by the
//! backend at construction time, since it differs per platform and per
//! descriptor kind.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

/// An opaque OS descriptor. Widened to `i64` so it can carry either a Unix
/// file descriptor (`i32`) or a Windows `HANDLE`/`SOCKET` (pointer-sized).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor(pub i64);

/// Role marker: a block device / regular file opened for async read/write.
#[derive(Debug)]
pub struct Block;

/// Role marker: a connected TCP socket.
#[derive(Debug)]
pub struct SocketTCP;

/// Role marker: a listening TCP socket.
#[derive(Debug)]
pub struct Acceptor;

pub struct Handle<R> {
    raw: RawDescriptor,
    closed: AtomicBool,
    raw_close: fn(RawDescriptor),
    _role: PhantomData<R>,
}

impl<R> Handle<R> {
    pub fn new(raw: RawDescriptor, raw_close: fn(RawDescriptor)) -> Self {
        Handle {
            raw,
            closed: AtomicBool::new(false),
            raw_close,
            _role: PhantomData,
        }
    }

    #[inline]
    pub fn raw(&self) -> RawDescriptor {
        self.raw
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Transition to closed without running the registered destructor.
    /// Returns `true` the first time this is called for a given handle.
    ///
    /// Exposed so a façade whose close operation goes through the
    /// completion engine (rather than `raw_close`) can disarm the `Drop`
    /// safety net once its own close has been submitted, without paying for
    /// a second, redundant synchronous close of the same descriptor.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Explicitly release the descriptor now rather than waiting for drop.
    /// Idempotent: closing an already-closed handle is a no-op.
    pub fn close_now(&self) {
        if self.mark_closed() {
            (self.raw_close)(self.raw);
        }
    }
}

impl<R> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("raw", &self.raw)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<R> Drop for Handle<R> {
    fn drop(&mut self) {
        // Safety net: if the caller's `.close().await` never ran (panic,
        // early return, cancellation), make sure the descriptor is still
        // released exactly once.
        self.close_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static CLOSE_COUNT: AtomicUsize = AtomicUsize::new(0);

    fn counting_close(_raw: RawDescriptor) {
        CLOSE_COUNT.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn drop_closes_exactly_once() {
        CLOSE_COUNT.store(0, Ordering::SeqCst);
        {
            let h: Handle<Block> = Handle::new(RawDescriptor(3), counting_close);
            h.close_now();
            h.close_now(); // idempotent
        }
        assert_eq!(CLOSE_COUNT.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_runs_close_if_never_closed_explicitly() {
        CLOSE_COUNT.store(0, Ordering::SeqCst);
        {
            let _h: Handle<SocketTCP> = Handle::new(RawDescriptor(4), counting_close);
        }
        assert_eq!(CLOSE_COUNT.load(Ordering::SeqCst), 1);
    }
}
