//! `IoResult` — a packed (status, count) pair cheap enough to move by value.
//!
//! Mirrors the packed-`int32` representation this design is grounded on:
//! success stores the transferred count directly, failure stores the
//! negated `Status` discriminant. `Status::Ok == 0` is what makes the two
//! cases disjoint by sign.

use crate::status::Status;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoResult(i32);

impl IoResult {
    #[inline]
    pub const fn new(status: Status, count: i32) -> Self {
        // `status as i32` is not available in a const fn on stable without
        // a match, so encode the two cases explicitly.
        match status {
            Status::Ok => IoResult(count),
            other => IoResult(-(other as i32)),
        }
    }

    #[inline]
    pub const fn ok(count: i32) -> Self {
        IoResult(count)
    }

    #[inline]
    pub const fn err(status: Status) -> Self {
        Self::new(status, 0)
    }

    #[inline]
    pub const fn success(&self) -> bool {
        self.0 >= 0
    }

    #[inline]
    pub fn status(&self) -> Status {
        if self.success() {
            Status::Ok
        } else {
            Status::from_code(-self.0)
        }
    }

    /// The transferred count on success, unspecified (and not meaningful)
    /// on failure.
    #[inline]
    pub const fn raw(&self) -> i32 {
        self.0
    }

    pub fn result(&self) -> Result<i32, Status> {
        if self.success() {
            Ok(self.0)
        } else {
            Err(self.status())
        }
    }
}

impl From<Result<i32, Status>> for IoResult {
    fn from(r: Result<i32, Status>) -> Self {
        match r {
            Ok(n) => IoResult::ok(n),
            Err(s) => IoResult::err(s),
        }
    }
}

impl fmt::Display for IoResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.result() {
            Ok(n) => write!(f, "Ok({n})"),
            Err(s) => write!(f, "Err({s})"),
        }
    }
}

/// `map_result` from the error mapper contract: a raw signed return value
/// (non-negative byte count, or negative errno-shaped code) folds into an
/// `IoResult` via a backend-supplied `map_error`.
pub fn map_result(ret: i64, map_error: impl FnOnce(i32) -> Status) -> IoResult {
    if ret >= 0 {
        IoResult::ok(ret as i32)
    } else {
        IoResult::err(map_error(-ret as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_invariant() {
        let r = IoResult::ok(13);
        assert!(r.success());
        assert_eq!(r.result(), Ok(13));
    }

    #[test]
    fn failure_invariant() {
        let r = IoResult::err(Status::AlreadyExists);
        assert!(!r.success());
        assert_eq!(r.result(), Err(Status::AlreadyExists));
    }

    #[test]
    fn map_result_nonnegative_is_ok() {
        let r = map_result(13, Status::from_code);
        assert_eq!(r.result(), Ok(13));
    }

    #[test]
    fn map_result_negative_maps_through_error_mapper() {
        let r = map_result(-15, |_| Status::AlreadyExists);
        assert_eq!(r.result(), Err(Status::AlreadyExists));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// §8 property 1: `map_result` is total and sign-disjoint — every
        /// non-negative `ret` becomes `Ok(ret)`, every negative `ret` becomes
        /// `Err(map_error(-ret))`, and the two cases never overlap.
        #[test]
        fn map_result_is_total_and_sign_disjoint(
            ret in (i32::MIN as i64 + 1)..=(i32::MAX as i64),
        ) {
            let r = map_result(ret, Status::from_code);
            if ret >= 0 {
                prop_assert!(r.success());
                prop_assert_eq!(r.result(), Ok(ret as i32));
            } else {
                prop_assert!(!r.success());
                prop_assert_eq!(r.result(), Err(Status::from_code(-ret as i32)));
            }
        }
    }
}
