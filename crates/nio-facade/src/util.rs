//! Full-read / full-write utilities: drive repeated single-shot operations
//! until the requested count is satisfied, a zero-byte completion signals
//! end-of-stream, or an error surfaces. Grounded on `Linux5/Module/TCP.cpp`'s
//! `fullRead`/`fullWrite` helpers (mirrored by the port backend's own copy in
//! `NTOS/Module/TCP.cpp`) — both loop over the same single-shot op until
//! `n == requested`.

use nio_core::{IoResult, Status};
use std::future::Future;

/// Issues `op(&mut buf[done..])` until `buf` is fully populated, returning
/// `IOResult(OK, n)` only when `n == buf.len()`. A zero-byte completion
/// before that point means the peer is gone; this collapses to
/// `IOResult(EOF)` rather than the misleading partial count (§4.4, §8
/// property 3, scenario S5).
pub async fn full_read<F, Fut>(buf: &mut [u8], mut op: F) -> IoResult
where
    F: FnMut(&mut [u8]) -> Fut,
    Fut: Future<Output = IoResult>,
{
    if buf.is_empty() {
        return IoResult::ok(0);
    }
    let total = buf.len();
    let mut done = 0usize;
    while done < total {
        let result = op(&mut buf[done..]).await;
        match result.result() {
            Ok(0) => return IoResult::err(Status::Eof),
            Ok(n) => done += n as usize,
            Err(status) => return IoResult::err(status),
        }
    }
    IoResult::ok(done as i32)
}

/// Issues `op(&buf[done..])` until `buf` is fully transferred. A short write
/// simply resubmits the remainder (§8 scenario S4); a write that itself
/// resolves to zero bytes with no error is treated as end-of-stream, since
/// neither backend's write path reports zero-byte progress for any other
/// reason.
pub async fn full_write<F, Fut>(buf: &[u8], mut op: F) -> IoResult
where
    F: FnMut(&[u8]) -> Fut,
    Fut: Future<Output = IoResult>,
{
    if buf.is_empty() {
        return IoResult::ok(0);
    }
    let total = buf.len();
    let mut done = 0usize;
    while done < total {
        let result = op(&buf[done..]).await;
        match result.result() {
            Ok(0) => return IoResult::err(Status::Eof),
            Ok(n) => done += n as usize,
            Err(status) => return IoResult::err(status),
        }
    }
    IoResult::ok(done as i32)
}

/// The `Block` variant: each reissue needs the absolute file offset to
/// advance alongside the buffer position, unlike the socket forms above.
pub async fn full_read_at<F, Fut>(buf: &mut [u8], base_offset: u64, mut op: F) -> IoResult
where
    F: FnMut(&mut [u8], u64) -> Fut,
    Fut: Future<Output = IoResult>,
{
    if buf.is_empty() {
        return IoResult::ok(0);
    }
    let total = buf.len();
    let mut done = 0usize;
    while done < total {
        let result = op(&mut buf[done..], base_offset + done as u64).await;
        match result.result() {
            Ok(0) => return IoResult::err(Status::Eof),
            Ok(n) => done += n as usize,
            Err(status) => return IoResult::err(status),
        }
    }
    IoResult::ok(done as i32)
}

pub async fn full_write_at<F, Fut>(buf: &[u8], base_offset: u64, mut op: F) -> IoResult
where
    F: FnMut(&[u8], u64) -> Fut,
    Fut: Future<Output = IoResult>,
{
    if buf.is_empty() {
        return IoResult::ok(0);
    }
    let total = buf.len();
    let mut done = 0usize;
    while done < total {
        let result = op(&buf[done..], base_offset + done as u64).await;
        match result.result() {
            Ok(0) => return IoResult::err(Status::Eof),
            Ok(n) => done += n as usize,
            Err(status) => return IoResult::err(status),
        }
    }
    IoResult::ok(done as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    /// Every future here resolves on its first poll, so a minimal inline
    /// executor is enough — no need to pull in a runtime crate just for
    /// these unit tests.
    fn block_on<F: Future>(fut: F) -> F::Output {
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        let raw = RawWaker::new(std::ptr::null(), &VTABLE);
        let waker = unsafe { Waker::from_raw(raw) };
        let mut cx = Context::from_waker(&waker);
        let mut fut = Box::pin(fut);
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(v) => v,
            Poll::Pending => panic!("test future did not resolve synchronously"),
        }
    }

    #[test]
    fn full_write_resubmits_after_a_short_write() {
        let calls = RefCell::new(Vec::new());
        let buf = [0u8; 10];
        let result = block_on(full_write(&buf, |chunk| {
            calls.borrow_mut().push(chunk.len());
            let n = chunk.len().min(4);
            std::future::ready(IoResult::ok(n as i32))
        }));
        assert_eq!(result.result(), Ok(10));
        assert_eq!(*calls.borrow(), vec![10, 6, 2]);
    }

    #[test]
    fn full_read_collapses_partial_transfer_and_eof_into_eof() {
        let mut buf = [0u8; 10];
        let mut step = 0u32;
        let result = block_on(full_read(&mut buf, |_chunk| {
            step += 1;
            let n = if step == 1 { 5 } else { 0 };
            std::future::ready(IoResult::ok(n))
        }));
        assert_eq!(result.result(), Err(Status::Eof));
    }

    #[test]
    fn full_transfer_propagates_the_first_error() {
        let mut buf = [0u8; 10];
        let result = block_on(full_read(&mut buf, |_chunk| {
            std::future::ready(IoResult::err(Status::ConnectionReset))
        }));
        assert_eq!(result.result(), Err(Status::ConnectionReset));
    }

    #[test]
    fn empty_request_is_trivially_satisfied() {
        let mut buf: [u8; 0] = [];
        let result = block_on(full_read(&mut buf, |_chunk| std::future::ready(IoResult::ok(0))));
        assert_eq!(result.result(), Ok(0));
    }

    #[test]
    fn full_write_at_advances_the_offset_with_each_reissue() {
        let offsets = RefCell::new(Vec::new());
        let buf = [1u8; 9];
        let result = block_on(full_write_at(&buf, 100, |chunk, offset| {
            offsets.borrow_mut().push(offset);
            let n = chunk.len().min(3);
            std::future::ready(IoResult::ok(n as i32))
        }));
        assert_eq!(result.result(), Ok(9));
        assert_eq!(*offsets.borrow(), vec![100, 103, 106]);
    }
}
