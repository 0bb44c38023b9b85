//! Windows backend for the completion-based I/O façade: one `HANDLE`-typed
//! completion port per process, a dedicated reaper thread, and the
//! overlapped-call adapters each façade operation submits through.
//!
//! Grounded on the source repository's `NTOS/Module/Block.cpp:105` and
//! `NTOS/Module/TCP.cpp:178-245` (the `detail::IOCP::bind` call sites): one
//! port, every handle bound to it exactly once, a
//! `GetQueuedCompletionStatus` loop dispatching by the `OVERLAPPED*` the
//! kernel hands back.
//!
//! Every module here is `cfg`-gated to `windows` so this crate still
//! compiles (to an empty crate) as an unconditional workspace member built
//! on other hosts, the same way `nio-facade::backend` picks its active
//! backend module internally rather than relying on the build failing on
//! the wrong platform.

#[cfg(windows)]
pub mod engine;
#[cfg(windows)]
pub mod error;
#[cfg(windows)]
pub mod ops;

#[cfg(windows)]
pub use engine::Engine;
#[cfg(windows)]
pub use error::{map_error, map_result};
