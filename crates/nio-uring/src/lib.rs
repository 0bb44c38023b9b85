//! Linux backend for the completion-based I/O façade: one `io_uring`
//! instance per process, a dedicated reaper thread, and the SQE-formatting
//! adapters each façade operation submits through.
//!
//! Grounded on the source repository's `Linux5/Module/Uring.{h,cpp}` and
//! `Linux5/Module/TCP.cpp`/`Block.cpp`: one ring, one submission spinlock,
//! one reaper thread blocking on `io_uring_wait_cqe`, opcodes tagged with
//! the awaiting cell's address as `user_data`.
//!
//! Every module here is `cfg`-gated to `target_os = "linux"` so this crate
//! still compiles (to an empty crate) as an unconditional workspace member
//! built on other hosts, the same way `nio-facade::backend` picks its
//! active backend module internally rather than relying on the build
//! failing on the wrong platform.

#[cfg(target_os = "linux")]
pub mod engine;
#[cfg(target_os = "linux")]
pub mod error;
#[cfg(target_os = "linux")]
pub mod ops;

#[cfg(target_os = "linux")]
pub use engine::Engine;
#[cfg(target_os = "linux")]
pub use error::{map_error, map_result};
