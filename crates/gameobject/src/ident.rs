//! Stable name hashing
//!
//! Identities, message ids and action ids are 64-bit FNV-1a hashes of their
//! names. The hash is part of the wire format (message headers carry it), so
//! it must be stable across processes and platforms.

use std::fmt;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A stable 64-bit hash of a name.
///
/// Scripts see hashes as plain Lua integers (the raw bits reinterpreted as
/// i64), so equality comparisons work on both sides of the boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameHash(pub u64);

impl NameHash {
    /// Hash a name
    pub fn of(name: &str) -> Self {
        let mut h = FNV_OFFSET;
        for b in name.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        NameHash(h)
    }

    /// The raw bits as a Lua-representable integer
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// Rebuild a hash from its Lua integer representation
    pub fn from_i64(v: i64) -> Self {
        NameHash(v as u64)
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash({:#018x})", self.0)
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
