//! The io_uring completion engine: one process-wide ring, a submission
//! spinlock, and a dedicated reaper thread.

use nio_core::{Cell, EngineConfig, SetupError, SpinLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

/// Owns the ring's submission queue (behind the submission spinlock) and
/// the submitter handle used both to flush submissions and, from the
/// reaper thread, to block on `io_uring_enter` waiting for completions.
///
/// The ring itself is leaked (`Box::leak`) so its submission/completion
/// queues can carry a `'static` lifetime into the reaper thread — this
/// engine is a process-wide singleton that is never actually torn down
/// outside of tests, matching the lifecycle the design calls for (handles
/// hold a reference so the engine outlives any live I/O).
pub struct Engine {
    sq: SpinLock<io_uring::SubmissionQueue<'static>>,
    submitter: io_uring::Submitter<'static>,
    config: EngineConfig,
    shutdown: Arc<AtomicBool>,
    reaper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

static ENGINE: OnceLock<Result<Arc<Engine>, SetupError>> = OnceLock::new();

impl Engine {
    /// The process-wide engine, built lazily on first use. A failure to
    /// create the kernel queue is cached and returned to every caller
    /// rather than retried, since a second attempt would not plausibly
    /// succeed either.
    pub fn global() -> Result<Arc<Engine>, SetupError> {
        ENGINE
            .get_or_init(|| Engine::new(EngineConfig::default()).map(Arc::new))
            .clone()
    }

    fn new(config: EngineConfig) -> Result<Self, SetupError> {
        let ring = io_uring::IoUring::builder()
            .build(config.queue_depth)
            .map_err(|e| SetupError::QueueInit(e.raw_os_error().unwrap_or(-1)))?;
        let ring: &'static mut io_uring::IoUring = Box::leak(Box::new(ring));
        let (submitter, sq, cq) = ring.split();

        let shutdown = Arc::new(AtomicBool::new(false));
        let reaper_shutdown = shutdown.clone();
        let reaper_submitter = submitter.clone();
        let batch = config.reaper_batch;
        let reaper = std::thread::Builder::new()
            .name("nio-uring-reaper".into())
            .spawn(move || reaper_loop(cq, reaper_submitter, reaper_shutdown, batch))
            .expect("failed to spawn io_uring reaper thread");

        Ok(Engine {
            sq: SpinLock::new(sq),
            submitter,
            config,
            shutdown,
            reaper: std::sync::Mutex::new(Some(reaper)),
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Submit one SQE under the submission spinlock, tagging it with an
    /// `Arc<Cell>` clone as the kernel correlation tag. The clone is
    /// reconstituted (and dropped) by the reaper once the completion for
    /// this tag arrives, which is what keeps the cell's memory alive even
    /// if the caller's own `Awaitable` is dropped early.
    pub fn submit(&self, cell: &Arc<Cell>, build: impl FnOnce(u64) -> io_uring::squeue::Entry) {
        let user_data = Arc::into_raw(cell.clone()) as u64;
        let sqe = build(user_data);
        let mut spin = 0u32;
        let mut guard = self.sq.lock();
        loop {
            if unsafe { guard.push(&sqe) }.is_ok() {
                break;
            }
            // Ring momentarily full: flush what's queued and spin.
            drop(guard);
            let _ = self.submitter.submit();
            spin = spin.wrapping_add(1);
            for _ in 0..spin.min(64) {
                std::hint::spin_loop();
            }
            guard = self.sq.lock();
        }
        guard.sync();
        drop(guard);
        if let Err(e) = self.submitter.submit() {
            nio_core::nerror!("io_uring submit failed: {e}");
            // The SQE is already queued; a later submit (from the next
            // operation) will pick it up. Nothing to recover here.
        }
    }

    /// Test-only: stop the reaper and join it. Production lifetime is the
    /// whole process, so this is never called outside the test suite.
    #[cfg(test)]
    pub fn shutdown_for_test(&self) {
        self.shutdown.store(true, Ordering::Release);
        let nop = io_uring::opcode::Nop::new().build().user_data(0);
        let mut guard = self.sq.lock();
        unsafe {
            let _ = guard.push(&nop);
        }
        guard.sync();
        drop(guard);
        let _ = self.submitter.submit();
        if let Some(h) = self.reaper.lock().unwrap().take() {
            let _ = h.join();
        }
    }
}

fn reaper_loop(
    mut cq: io_uring::CompletionQueue<'static>,
    submitter: io_uring::Submitter<'static>,
    shutdown: Arc<AtomicBool>,
    batch: usize,
) {
    while !shutdown.load(Ordering::Acquire) {
        match submitter.submit_and_wait(1) {
            Ok(_) => {}
            Err(e) if e.raw_os_error() == Some(libc::EINTR) => continue,
            Err(e) => {
                nio_core::nerror!("io_uring reaper wait failed: {e}");
                continue;
            }
        }
        cq.sync();
        let mut drained = 0usize;
        for cqe in &mut cq {
            let user_data = cqe.user_data();
            if user_data == 0 {
                continue; // shutdown nop or otherwise untagged entry
            }
            let cell = unsafe { Arc::from_raw(user_data as *const Cell) };
            cell.release(cqe.result() as i64);
            drained += 1;
            if drained >= batch {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nio_core::{Awaitable, Status};
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll, Wake, Waker};
    use std::thread;

    struct ParkWaker(thread::Thread);
    impl Wake for ParkWaker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }
        fn wake_by_ref(self: &Arc<Self>) {
            self.0.unpark();
        }
    }

    fn block_on<T>(mut aw: Awaitable<T>) -> T {
        let waker: Waker = Arc::new(ParkWaker(thread::current())).into();
        let mut cx = Context::from_waker(&waker);
        loop {
            match Pin::new(&mut aw).poll(&mut cx) {
                Poll::Ready(v) => return v,
                Poll::Pending => thread::park(),
            }
        }
    }

    fn submit_nop(engine: &Arc<Engine>) -> Awaitable<Status> {
        let cell = Arc::new(Cell::new());
        engine.submit(&cell, |tag| io_uring::opcode::Nop::new().build().user_data(tag));
        Awaitable::new(cell, |cell| crate::error::map_result(cell.raw()).status())
    }

    /// §8 property 3: the engine serves N concurrent submissions from K
    /// threads with no completion lost or delivered twice. A lost
    /// completion would hang this test forever (no waker ever fires); a
    /// doubly-delivered one would trip `release fired twice` in `Cell`.
    #[test]
    fn concurrent_submissions_from_many_threads_all_complete_exactly_once() {
        let engine = match Engine::global() {
            Ok(e) => e,
            Err(_) => return, // no io_uring support in this environment
        };
        const THREADS: usize = 8;
        const PER_THREAD: usize = 200;
        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let engine = engine.clone();
                let completed = completed.clone();
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        let status = block_on(submit_nop(&engine));
                        assert_eq!(status, Status::Ok);
                        completed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(completed.load(Ordering::SeqCst), THREADS * PER_THREAD);
    }

    /// §8 property 4: completion order does not need to track submission
    /// order. Submit a batch up front (recording the lock-serialized
    /// submission order is trivially FIFO per `SpinLock`'s own tests) and
    /// await the awaitables back to front — every one must still resolve.
    #[test]
    fn completion_order_is_independent_of_submission_order() {
        let engine = match Engine::global() {
            Ok(e) => e,
            Err(_) => return,
        };
        let batch: Vec<_> = (0..32).map(|_| submit_nop(&engine)).collect();
        for aw in batch.into_iter().rev() {
            assert_eq!(block_on(aw), Status::Ok);
        }
    }
}
