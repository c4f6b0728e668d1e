// SPDX-License-Identifier: MPL-2.0

//! Capability types.
//!
//! A capability is an unforgeable handle conferring a bitmap of rights
//! over one kernel object. Nothing here is a pointer: capabilities name
//! objects and processes by identifier, and the pool in [`pool`] is the
//! only storage they ever live in.

pub mod pool;

use bitflags::bitflags;

pub use pool::CapPool;

/// Capability identifier. Zero never names a capability.
pub type CapId = u64;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
pub enum CapType {
    None = 0,
    Memory = 1,
    IpcPort = 2,
    Process = 3,
    Thread = 4,
    File = 5,
    Directory = 6,
    Device = 7,
    Socket = 8,
    Timer = 9,
    SecurityContext = 10,
    CryptoKey = 11,
    HardwareResource = 12,
}

bitflags! {
    /// Rights a capability can confer.
    pub struct CapRights: u64 {
        const READ        = 1 << 0;
        const WRITE       = 1 << 1;
        const EXEC        = 1 << 2;
        const GRANT       = 1 << 3;
        const REVOKE      = 1 << 4;
        const DELETE      = 1 << 5;
        const CREATE      = 1 << 6;
        const MODIFY      = 1 << 7;
        const TRAVERSE    = 1 << 8;
        const BIND        = 1 << 9;
        const LISTEN      = 1 << 10;
        const CONNECT     = 1 << 11;
        const DEBUG       = 1 << 12;
        const ADMIN       = 1 << 13;
        /// Undestroyable and never transferable by grant.
        const IMMORTAL    = 1 << 14;
        const DELEGATABLE = 1 << 15;
    }
}

/// Lifecycle of a capability slot. Empty slots read as `Revoked`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
pub enum CapState {
    Active = 0,
    Suspended = 1,
    Revoked = 2,
    Expired = 3,
}

/// Security levels, ordered from least to most restrictive.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, int_to_c_enum::TryFromInt)]
pub enum SecLevel {
    Public = 0,
    Restricted = 1,
    Confidential = 2,
    Secret = 3,
    TopSecret = 4,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn levels_order_by_restrictiveness() {
        assert!(SecLevel::Public < SecLevel::Restricted);
        assert!(SecLevel::Secret < SecLevel::TopSecret);
    }

    #[test]
    fn immortal_is_a_distinct_right() {
        let r = CapRights::READ | CapRights::IMMORTAL;
        assert!(r.contains(CapRights::IMMORTAL));
        assert!(!(r & !CapRights::IMMORTAL).contains(CapRights::IMMORTAL));
    }
}
