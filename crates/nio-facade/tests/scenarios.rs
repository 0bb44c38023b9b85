//! End-to-end scenarios from §8 of the design: real file and socket I/O
//! driven through the façade against whichever backend this target compiles
//! (io_uring on Linux, IOCP on Windows). Each test supplies its own minimal
//! thread-parking executor — the façade doesn't prescribe one (§1) — the
//! same shape as `cmd/echo`'s `block_on`.

use nio_facade::{acceptor_tcp, connect, open_block, Address, OpenFlags, Peer, Status};
use std::future::Future;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread;
use std::time::Duration;

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

/// Distinct ports per test so a parallel `cargo test` run doesn't collide on
/// the same listening address.
static NEXT_PORT: AtomicU16 = AtomicU16::new(31080);
fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

/// S1 — file echo: write a payload at offset 0, close, reopen for read,
/// read it back, close again.
#[test]
#[cfg(target_os = "linux")]
fn s1_file_echo() {
    block_on(async {
        let path = format!("./tmp.kls.io.s1.{}", std::process::id());
        let payload = b"Hello World\n\0";

        let file = open_block(&path, OpenFlags::WRITE | OpenFlags::CREAT)
            .await
            .expect("open for write");
        let written = file.write(payload, 0).await;
        assert_eq!(written.result(), Ok(payload.len() as i32));
        assert_eq!(file.close().await, Status::Ok);

        let file = open_block(&path, OpenFlags::READ).await.expect("open for read");
        let mut buf = [0u8; 1000];
        let read = file.read(&mut buf, 0).await;
        assert_eq!(read.result(), Ok(payload.len() as i32));
        assert_eq!(&buf[..payload.len()], payload);
        assert_eq!(file.close().await, Status::Ok);

        let _ = std::fs::remove_file(&path);
    });
}

/// S2 — TCP echo: a server `once()`s a connection, echoes back whatever it
/// reads, while a concurrently-connecting client writes a payload and reads
/// the echo.
#[test]
#[cfg(target_os = "linux")]
fn s2_tcp_echo() {
    let port = next_port();
    let payload = b"Hello World\n\0";
    let listen_peer = Peer::new(Address::unspecified_v4(), port);
    let acceptor = acceptor_tcp(listen_peer, 128).expect("bind/listen");

    let server = thread::spawn(move || {
        block_on(async {
            let (_peer, socket) = acceptor.once().await.expect("accept");
            let mut buf = [0u8; 1000];
            let read = socket.read(&mut buf).await;
            let n = read.result().expect("server read ok") as usize;
            let wrote = socket.write(&buf[..n]).await;
            assert_eq!(wrote.result(), Ok(n as i32));
            let _ = socket.close().await;
            let _ = acceptor.close().await;
        });
    });

    thread::sleep(Duration::from_millis(50));

    block_on(async {
        let client_peer = Peer::new(Address::loopback_v4(), port);
        let socket = connect(client_peer).await.expect("connect");
        let wrote = socket.write_full(payload).await;
        assert_eq!(wrote.result(), Ok(payload.len() as i32));
        let mut buf = [0u8; 1000];
        let read = socket.read_full(&mut buf[..payload.len()]).await;
        assert_eq!(read.result(), Ok(payload.len() as i32));
        assert_eq!(&buf[..payload.len()], payload);
        let _ = socket.close().await;
    });

    server.join().expect("server thread");
}

/// S3 — open exclusive collision: two concurrent `CREAT|EXCL` opens on the
/// same path, exactly one succeeds, the other resolves `AlreadyExists`.
#[test]
#[cfg(target_os = "linux")]
fn s3_open_exclusive_collision() {
    let path = Arc::new(format!("./tmp.kls.io.s3.{}", std::process::id()));
    let _ = std::fs::remove_file(path.as_str());

    let path_a = path.clone();
    let a = thread::spawn(move || {
        block_on(open_block(&path_a, OpenFlags::WRITE | OpenFlags::CREAT | OpenFlags::EXCL))
    });
    let path_b = path.clone();
    let b = thread::spawn(move || {
        block_on(open_block(&path_b, OpenFlags::WRITE | OpenFlags::CREAT | OpenFlags::EXCL))
    });

    let result_a = a.join().unwrap();
    let result_b = b.join().unwrap();

    let successes = [&result_a, &result_b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of two EXCL opens must succeed");

    let failure = if result_a.is_err() { result_a.err() } else { result_b.err() };
    match failure.expect("one open must have failed") {
        nio_facade::SetupError::OpenFailed(status) => assert_eq!(status, Status::AlreadyExists),
        other => panic!("expected OpenFailed(AlreadyExists), got {other}"),
    }

    let _ = std::fs::remove_file(path.as_str());
}

/// S5 — read EOF: a peer writes 5 bytes then closes; a full-read of 10
/// bytes collapses the short transfer into `Status::Eof`.
#[test]
#[cfg(target_os = "linux")]
fn s5_read_eof() {
    let port = next_port();
    let listen_peer = Peer::new(Address::unspecified_v4(), port);
    let acceptor = acceptor_tcp(listen_peer, 16).expect("bind/listen");

    let server = thread::spawn(move || {
        block_on(async {
            let (_peer, socket) = acceptor.once().await.expect("accept");
            let wrote = socket.write(b"abcde").await;
            assert_eq!(wrote.result(), Ok(5));
            let _ = socket.close().await;
            let _ = acceptor.close().await;
        });
    });

    thread::sleep(Duration::from_millis(50));

    block_on(async {
        let socket = connect(Peer::new(Address::loopback_v4(), port)).await.expect("connect");
        let mut buf = [0u8; 10];
        let result = socket.read_full(&mut buf).await;
        assert_eq!(result.result(), Err(Status::Eof));
        let _ = socket.close().await;
    });

    server.join().expect("server thread");
}

/// S6 — acceptor close cancels a pending accept: a task blocked in
/// `once()` resumes with a cancellation-class status once the acceptor is
/// closed out from under it, rather than hanging forever.
#[test]
#[cfg(target_os = "linux")]
fn s6_acceptor_close_cancels_pending_accept() {
    let port = next_port();
    let listen_peer = Peer::new(Address::unspecified_v4(), port);
    let acceptor = Arc::new(acceptor_tcp(listen_peer, 16).expect("bind/listen"));

    let accepting = acceptor.clone();
    let waiter = thread::spawn(move || block_on(accepting.once()));

    thread::sleep(Duration::from_millis(50));
    block_on(acceptor.close());

    let result = waiter.join().expect("accept task");
    match result {
        Err(status) => assert!(
            status.is_cancellation_class(),
            "expected a cancellation-class status, got {status}"
        ),
        Ok(_) => panic!("pending accept should not have succeeded after acceptor close"),
    }
}
