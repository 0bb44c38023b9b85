//! The awaitable cell and the handoff protocol that makes it race-free.
//!
//! A `Cell` is the address-stable object the kernel is told about at
//! submission time (its address, or a reference-counted handle to it, is
//! the correlation tag threaded through the ring/port). It must never move
//! once submitted, which is why it is always reached through `Arc<Cell>`:
//! the engine keeps its own clone alive as the kernel's correlation tag,
//! independent of whatever the polling future does with its own clone.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

const UNSET: u8 = 0;
const WAITING: u8 = 1;
const FIRED: u8 = 2;

/// Three-state handoff between "kernel completed" and "task suspended".
///
/// Single-shot: each cell is submitted once, suspended at most once, and
/// released at most once. Observing anything other than `UNSET` on the
/// first `suspend` call (besides the already-`FIRED` race) is a caller bug.
pub struct Handoff {
    state: AtomicU8,
    waker: std::cell::UnsafeCell<Option<Waker>>,
}

// The waker cell is only ever written by the (single) suspending task
// before the state transition that publishes it, and only ever read by
// the (single) releaser after observing that transition. See `suspend`/
// `release` for the ordering argument.
unsafe impl Send for Handoff {}
unsafe impl Sync for Handoff {}

impl Handoff {
    pub fn new() -> Self {
        Handoff {
            state: AtomicU8::new(UNSET),
            waker: std::cell::UnsafeCell::new(None),
        }
    }

    /// Install `waker` and attempt `UNSET -> WAITING`.
    ///
    /// Returns `true` if the caller must park (the handoff won the race and
    /// will wake `waker` on release). Returns `false` if `release` already
    /// fired — the caller must not park and should resolve immediately.
    pub fn suspend(&self, waker: &Waker) -> bool {
        // Write the waker before the CAS. If `release` wins the race it
        // never looks at this cell (prior state observed as UNSET), so the
        // write is simply discarded with no reader; if our CAS wins, the
        // Release ordering on success publishes the write to `release`.
        unsafe {
            *self.waker.get() = Some(waker.clone());
        }
        match self
            .state
            .compare_exchange(UNSET, WAITING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(FIRED) => false,
            Err(_) => unreachable!("double suspend on a single-shot awaitable"),
        }
    }

    /// Atomically transition to `FIRED` and wake whoever is waiting, if
    /// anyone installed a waker before this call.
    pub fn release(&self) {
        match self.state.swap(FIRED, Ordering::AcqRel) {
            UNSET => {} // not yet suspended; the eventual suspend() will see FIRED
            WAITING => {
                let waker = unsafe { (*self.waker.get()).take() };
                if let Some(w) = waker {
                    w.wake();
                }
            }
            FIRED => unreachable!("release fired twice on a single-shot awaitable"),
            _ => unreachable!(),
        }
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-operation completion state shared between the submitting task
/// and the reaper.
///
/// `raw` is the engine's pre-combined result: a non-negative transferred
/// count, or a negated `Status` discriminant — the same packing `IoResult`
/// uses, so resolving a cell is just `IoResult`'s constructor applied to
/// `raw` (or a thinner projection of it for plain `Status` results).
pub struct Cell {
    raw: AtomicI64,
    immediate: AtomicBool,
    handoff: Handoff,
    /// Backend-owned auxiliary storage kept alive for the duration of the
    /// operation: the embedded scatter/gather header for a vectored send/
    /// recv, or the `sockaddr` buffer for an accept. Type-erased because
    /// `nio-core` doesn't know the concrete aux type any given backend
    /// needs; populated once before submission and read at most once, by
    /// the same task, after the handoff fires — see `with_aux`/`aux_ref`.
    aux: std::cell::UnsafeCell<Option<Box<dyn std::any::Any + Send + Sync>>>,
}

// `aux` is written once before the cell is shared with the kernel/reaper
// and read at most once after the handoff has fired; the handoff's own
// Acquire/Release edges are what make that single write visible to the
// single post-completion read, so no separate synchronization is needed.
unsafe impl Sync for Cell {}

impl Cell {
    pub fn new() -> Self {
        Cell {
            raw: AtomicI64::new(0),
            immediate: AtomicBool::new(false),
            handoff: Handoff::new(),
            aux: std::cell::UnsafeCell::new(None),
        }
    }

    /// Construct a cell with embedded auxiliary storage, returning a raw
    /// pointer to that storage stable for as long as the returned `Arc`
    /// (or any clone of it, including the kernel's own correlation-tag
    /// clone) is alive.
    pub fn with_aux<A: Send + Sync + 'static>(aux: A) -> (Arc<Cell>, *mut A) {
        let cell = Arc::new(Cell::new());
        let ptr: *mut A = Box::into_raw(Box::new(aux));
        // Re-boxing into a trait object does not relocate the `A` value;
        // it only attaches a vtable to the existing heap allocation `ptr`
        // already points into.
        let erased: Box<dyn std::any::Any + Send + Sync> = unsafe { Box::from_raw(ptr) };
        unsafe {
            *cell.aux.get() = Some(erased);
        }
        (cell, ptr)
    }

    /// Read back the auxiliary storage installed by `with_aux`.
    ///
    /// # Safety
    /// Must only be called after the awaitable has resolved (i.e. from a
    /// resolver function, which only runs once `ready()` or the handoff
    /// has fired) and with the same `A` used to construct the cell.
    pub unsafe fn aux_ref<A: 'static>(&self) -> Option<&A> {
        (*self.aux.get()).as_deref().and_then(|b| b.downcast_ref::<A>())
    }

    /// Mark this cell resolved synchronously at submission time (the
    /// port-platform fast path: the OS returned a definite code other than
    /// "pending", so the reaper will never see this operation).
    pub fn resolve_immediate(&self, raw: i64) {
        self.raw.store(raw, Ordering::Release);
        self.immediate.store(true, Ordering::Release);
    }

    /// True only when `resolve_immediate` already ran. Does not reflect
    /// reaper-driven completions — those go through `handoff` instead.
    pub fn ready(&self) -> bool {
        self.immediate.load(Ordering::Acquire)
    }

    /// Called by the reaper once the kernel reports this cell's completion.
    pub fn release(&self, raw: i64) {
        self.raw.store(raw, Ordering::Release);
        self.handoff.release();
    }

    pub fn raw(&self) -> i64 {
        self.raw.load(Ordering::Acquire)
    }

    pub fn handoff(&self) -> &Handoff {
        &self.handoff
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}

/// A `Future` bound to a `Cell`, resolving it into `T` via a plain function
/// pointer (no closures: the resolver is always one of a handful of known
/// projections — `Status`, `IoResult`, `(Peer, Handle<SocketTCP>)` — so a
/// fn pointer keeps `Awaitable` a single word plus the `Arc`). The resolver
/// receives the whole `Cell`, not just its `raw` value, so vectored/accept
/// resolvers can also reach into `aux_ref` for the embedded buffer.
pub struct Awaitable<T> {
    cell: Arc<Cell>,
    resolve: fn(&Cell) -> T,
}

impl<T> Awaitable<T> {
    pub fn new(cell: Arc<Cell>, resolve: fn(&Cell) -> T) -> Self {
        Awaitable { cell, resolve }
    }

    /// The cell backing this awaitable. Backends use this to stash an
    /// `Arc::into_raw` clone as the kernel's correlation tag at submission
    /// time.
    pub fn cell(&self) -> &Arc<Cell> {
        &self.cell
    }
}

impl<T> Future for Awaitable<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if this.cell.ready() {
            return Poll::Ready((this.resolve)(&this.cell));
        }
        if this.cell.handoff().suspend(cx.waker()) {
            Poll::Pending
        } else {
            Poll::Ready((this.resolve)(&this.cell))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::task::Wake;

    struct CountingWaker(AtomicUsize);
    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn wake_by_ref(self: &Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn release_before_suspend_skips_parking() {
        let h = Handoff::new();
        h.release();
        let w = Arc::new(CountingWaker(AtomicUsize::new(0))).into();
        assert!(!h.suspend(&w));
    }

    #[test]
    fn suspend_before_release_parks_then_wakes() {
        let h = Handoff::new();
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let w: Waker = counter.clone().into();
        assert!(h.suspend(&w));
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        h.release();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cell_immediate_bypasses_handoff() {
        let cell = Cell::new();
        cell.resolve_immediate(-(crate::status::Status::AlreadyExists as i64));
        assert!(cell.ready());
        assert_eq!(
            crate::status::Status::from_code(-cell.raw() as i32),
            crate::status::Status::AlreadyExists
        );
    }

    #[test]
    fn awaitable_resolves_immediately() {
        let cell = Arc::new(Cell::new());
        cell.resolve_immediate(13);
        let aw = Awaitable::new(cell, |c| c.raw());
        futures_poll_once(aw);
    }

    #[test]
    fn aux_storage_survives_behind_the_erased_box() {
        let (cell, ptr) = Cell::with_aux::<[u8; 4]>([1, 2, 3, 4]);
        unsafe {
            (*ptr)[0] = 9;
        }
        let aux = unsafe { cell.aux_ref::<[u8; 4]>() }.unwrap();
        assert_eq!(*aux, [9, 2, 3, 4]);
    }

    /// §8 property 2: a handoff never resumes its waiter twice, even when
    /// `suspend` and `release` race on real OS threads rather than being
    /// called in a fixed order from one thread. Either ordering is legal;
    /// what isn't is the waker firing more than once or `release` tripping
    /// its own "fired twice" panic.
    #[test]
    fn handoff_races_resolve_to_exactly_one_wake() {
        for _ in 0..2000 {
            let handoff = Arc::new(Handoff::new());
            let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
            let waker: Waker = counter.clone().into();

            let suspender = {
                let handoff = handoff.clone();
                std::thread::spawn(move || handoff.suspend(&waker))
            };
            let releaser = {
                let handoff = handoff.clone();
                std::thread::spawn(move || {
                    handoff.release();
                })
            };
            let must_be_woken = suspender.join().unwrap();
            releaser.join().unwrap();

            // `release` raced ahead of the CAS: the caller never parks, so
            // no wake is owed. Otherwise the caller parked and `release`
            // owes it exactly one wake, which it has already delivered by
            // the time both threads have joined.
            let expected = if must_be_woken { 1 } else { 0 };
            assert_eq!(counter.0.load(Ordering::SeqCst), expected);
        }
    }

    fn futures_poll_once<T: std::fmt::Debug>(mut aw: Awaitable<T>) {
        let waker = Arc::new(CountingWaker(AtomicUsize::new(0))).into();
        let mut cx = Context::from_waker(&waker);
        match Pin::new(&mut aw).poll(&mut cx) {
            Poll::Ready(v) => assert_eq!(format!("{v:?}"), "13"),
            Poll::Pending => panic!("expected immediate readiness"),
        }
    }
}
