//! Platform-agnostic pieces of the completion-based I/O façade: the
//! portable `Status`/`IoResult` vocabulary, `Handle<R>`, the awaitable
//! `Cell`/`Handoff` pair, address types, and the ambient submission
//! spinlock/logging/config building blocks every backend reuses.
//!
//! This crate owns none of the kernel interaction — see `nio-uring` and
//! `nio-iocp` for the ring and port backends, and `nio-facade` for the
//! public `open_block`/`connect`/`acceptor_tcp` surface built on top of
//! whichever backend compiles for the target.

pub mod address;
pub mod cell;
pub mod config;
pub mod env;
pub mod handle;
pub mod log;
pub mod open_flags;
pub mod result;
pub mod setup_error;
pub mod spinlock;
pub mod status;

pub use address::{Address, Peer};
pub use cell::{Awaitable, Cell, Handoff};
pub use config::EngineConfig;
pub use handle::{Acceptor, Block, Handle, RawDescriptor, SocketTCP};
pub use open_flags::{Disposition, OpenFlags};
pub use result::IoResult;
pub use setup_error::SetupError;
pub use spinlock::{SpinLock, SpinLockGuard};
pub use status::Status;
