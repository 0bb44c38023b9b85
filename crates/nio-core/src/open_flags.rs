//! Portable `open_block` flags and the canonical disposition table (§4.4).

use crate::status::Status;

/// A minimal hand-rolled bitflags, kept in-house so this leaf crate stays
/// dependency-light (the rest of the workspace already reaches for real
/// crates where the corpus does — this one's a three-method wrapper, not
/// worth a dependency).
macro_rules! bitflags_lite {
    (
        $(#[$outer:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $flag:ident = $val:expr;)+
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($repr);

        impl $name {
            $(pub const $flag: $name = $name($val);)+

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn from_bits_truncate(bits: $repr) -> Self {
                $name(bits)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitflags_lite! {
    pub struct OpenFlags: u32 {
        const READ   = 0b0000_0001;
        const WRITE  = 0b0000_0010;
        const CREAT  = 0b0000_0100;
        const EXCL   = 0b0000_1000;
        const TRUNC  = 0b0001_0000;
        const EXLOCK = 0b0010_0000;
    }
}

/// A platform-neutral description of how the file should come into
/// existence. Linux ORs these straight into POSIX open(2) flags; Windows
/// turns this into a `dwCreationDisposition` passed to `CreateFileW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `CREAT` only: open if it exists, create if it doesn't.
    OpenAlways,
    /// `CREAT | EXCL` (with or without `TRUNC`): fail if it already exists.
    CreateNew,
    /// `CREAT | TRUNC` without `EXCL`: truncate if it exists, else create.
    OpenAlwaysTruncate,
    /// `TRUNC` without `CREAT`: the file must already exist.
    TruncateExisting,
    /// No creation flags at all: the file must already exist.
    OpenExisting,
}

impl OpenFlags {
    /// Resolve the portable flag combination into the canonical
    /// disposition table from the design notes, or `AccessDenied` if
    /// neither `READ` nor `WRITE` is set.
    pub fn disposition(self) -> Result<Disposition, Status> {
        if !self.intersects(OpenFlags::READ | OpenFlags::WRITE) {
            return Err(Status::AccessDenied);
        }
        let creat = self.contains(OpenFlags::CREAT);
        let excl = self.contains(OpenFlags::EXCL);
        let trunc = self.contains(OpenFlags::TRUNC);
        Ok(match (creat, excl, trunc) {
            (true, true, _) => Disposition::CreateNew,
            (true, false, true) => Disposition::OpenAlwaysTruncate,
            (true, false, false) => Disposition::OpenAlways,
            (false, _, true) => Disposition::TruncateExisting,
            (false, _, false) => Disposition::OpenExisting,
        })
    }

    pub fn wants_read(self) -> bool {
        self.contains(OpenFlags::READ)
    }

    pub fn wants_write(self) -> bool {
        self.contains(OpenFlags::WRITE)
    }

    pub fn exclusive_lock(self) -> bool {
        self.contains(OpenFlags::EXLOCK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neither_read_nor_write_is_eacces() {
        assert_eq!(OpenFlags::empty().disposition(), Err(Status::AccessDenied));
    }

    #[test]
    fn creat_only_is_open_always() {
        let f = OpenFlags::READ | OpenFlags::CREAT;
        assert_eq!(f.disposition(), Ok(Disposition::OpenAlways));
    }

    #[test]
    fn creat_excl_is_create_new() {
        let f = OpenFlags::READ | OpenFlags::CREAT | OpenFlags::EXCL;
        assert_eq!(f.disposition(), Ok(Disposition::CreateNew));
    }

    #[test]
    fn creat_trunc_excl_is_create_new() {
        let f = OpenFlags::READ | OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::TRUNC;
        assert_eq!(f.disposition(), Ok(Disposition::CreateNew));
    }

    #[test]
    fn creat_trunc_without_excl_is_open_always_truncate() {
        let f = OpenFlags::WRITE | OpenFlags::CREAT | OpenFlags::TRUNC;
        assert_eq!(f.disposition(), Ok(Disposition::OpenAlwaysTruncate));
    }

    #[test]
    fn trunc_without_creat_is_truncate_existing() {
        let f = OpenFlags::WRITE | OpenFlags::TRUNC;
        assert_eq!(f.disposition(), Ok(Disposition::TruncateExisting));
    }

    #[test]
    fn no_creation_flags_is_open_existing() {
        let f = OpenFlags::READ;
        assert_eq!(f.disposition(), Ok(Disposition::OpenExisting));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// §8 property 5: every flag combination produces the canonical
        /// disposition table of §4.4, checked as a closed-form law instead
        /// of enumerating cases by hand.
        #[test]
        fn disposition_matches_the_canonical_table(bits in 0u32..64) {
            let flags = OpenFlags::from_bits_truncate(bits);
            let result = flags.disposition();
            if !flags.intersects(OpenFlags::READ | OpenFlags::WRITE) {
                prop_assert_eq!(result, Err(Status::AccessDenied));
                return Ok(());
            }
            let creat = flags.contains(OpenFlags::CREAT);
            let excl = flags.contains(OpenFlags::EXCL);
            let trunc = flags.contains(OpenFlags::TRUNC);
            let expected = match (creat, excl, trunc) {
                (true, true, _) => Disposition::CreateNew,
                (true, false, true) => Disposition::OpenAlwaysTruncate,
                (true, false, false) => Disposition::OpenAlways,
                (false, _, true) => Disposition::TruncateExisting,
                (false, _, false) => Disposition::OpenExisting,
            };
            prop_assert_eq!(result, Ok(expected));
        }
    }
}
