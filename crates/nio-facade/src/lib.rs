//! Operation Façade: the thin, per-operation adapters from §4.4 — the only
//! layer most callers touch. `open_block`/`connect`/`acceptor_tcp` marshal
//! portable arguments into a submission against whichever backend compiles
//! for the target (`nio-uring` on Linux, `nio-iocp` on Windows) and hand
//! back a handle whose methods return awaitables from the completion
//! engine.

mod acceptor;
mod backend;
mod block;
mod socket;
mod util;

pub use acceptor::{acceptor_tcp, Acceptor};
pub use block::{open_block, Block};
pub use socket::{connect, SocketTCP};
pub use util::{full_read, full_read_at, full_write, full_write_at};

pub use nio_core::{Address, Awaitable, IoResult, OpenFlags, Peer, SetupError, Status};
