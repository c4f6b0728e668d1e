// SPDX-License-Identifier: MPL-2.0

use int_to_c_enum::TryFromInt;

/// The error type which is returned from the APIs of this crate.
///
/// The discriminants are the stable numeric codes seen by userland;
/// success is not represented here (a successful call returns `Ok`).
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, TryFromInt)]
pub enum Error {
    InvalidArgument = 1,
    NotImplemented = 2,
    OutOfMemory = 3,
    DeviceError = 4,
    Timeout = 5,
    Busy = 6,
    NotFound = 7,
    AlreadyExists = 8,
    PermissionDenied = 9,
    InvalidState = 10,
    Unsupported = 11,
    UnsupportedArch = 12,
    NoArch = 13,
    Hardware = 14,
    Security = 15,
}

impl Error {
    /// The numeric code reported over the syscall boundary.
    pub const fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in 1..=15 {
            let err = Error::try_from(code).unwrap();
            assert_eq!(err.code(), code);
        }
        assert!(Error::try_from(0).is_err());
        assert!(Error::try_from(16).is_err());
    }
}
