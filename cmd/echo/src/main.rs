//! End-to-end demo of the façade: file echo (§8 scenario S1) followed by a
//! TCP echo server/client pair (§8 scenario S2) run in one process.
//!
//! The façade itself doesn't prescribe a task runtime (§1 — the cooperative
//! executor is an external collaborator); this binary supplies the smallest
//! one that can drive a `std::future::Future` to completion, since that's
//! all `Awaitable` requires.

use nio_facade::{acceptor_tcp, connect, open_block, Address, OpenFlags, Peer};
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread;

fn main() {
    println!("=== nio-facade echo demo ===\n");

    println!("-- file echo --");
    block_on(file_echo());

    println!("\n-- tcp echo --");
    block_on(tcp_echo());
}

async fn file_echo() {
    let path = "./tmp.kls.io";
    let payload = b"Hello World\n\0";

    let file = open_block(path, OpenFlags::WRITE | OpenFlags::CREAT)
        .await
        .expect("open for write");
    let written = file.write(payload, 0).await;
    println!("wrote {written}");
    let status = file.close().await;
    println!("closed: {status}");

    let file = open_block(path, OpenFlags::READ).await.expect("open for read");
    let mut buf = [0u8; 1000];
    let read = file.read(&mut buf, 0).await;
    println!("read {read}");
    assert_eq!(read.result(), Ok(payload.len() as i32));
    assert_eq!(&buf[..payload.len()], payload);
    let status = file.close().await;
    println!("closed: {status}");

    let _ = std::fs::remove_file(path);
}

async fn tcp_echo() {
    let payload = b"Hello World\n\0";
    let listen_peer = Peer::new(Address::unspecified_v4(), 30080);
    let acceptor = acceptor_tcp(listen_peer, 128).expect("bind/listen");

    let server = thread::spawn(move || {
        block_on(async {
            let (peer, socket) = acceptor.once().await.expect("accept");
            println!("server accepted {peer}");
            let mut buf = [0u8; 1000];
            let read = socket.read(&mut buf).await;
            println!("server read {read}");
            let n = read.result().expect("read ok") as usize;
            let wrote = socket.write(&buf[..n]).await;
            println!("server wrote {wrote}");
            let _ = socket.close().await;
            let _ = acceptor.close().await;
        });
    });

    // Give the acceptor a moment to start listening before the client dials.
    thread::sleep(std::time::Duration::from_millis(50));

    let client_peer = Peer::new(Address::loopback_v4(), 30080);
    let socket = connect(client_peer).await.expect("connect");
    let wrote = socket.write_full(payload).await;
    println!("client wrote {wrote}");
    let mut buf = [0u8; 1000];
    let read = socket.read_full(&mut buf[..payload.len()]).await;
    println!("client read {read}");
    assert_eq!(read.result(), Ok(payload.len() as i32));
    assert_eq!(&buf[..payload.len()], payload);
    let _ = socket.close().await;

    server.join().expect("server thread");
}

/// A minimal single-task executor: park the thread between polls, unpark it
/// from `Wake`. Enough to drive one `Awaitable` chain per thread; the
/// reaper thread runs independently and calls `wake()` from the engine's
/// own context (§5's "executor capture" — here, the executor is just this
/// thread's parking state).
struct ThreadWaker(thread::Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }
    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

fn block_on<F: Future>(fut: F) -> F::Output {
    let waker: Waker = Arc::new(ThreadWaker(thread::current())).into();
    let mut cx = Context::from_waker(&waker);
    let mut fut = Box::pin(fut);
    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(v) => return v,
            Poll::Pending => thread::park(),
        }
    }
}
