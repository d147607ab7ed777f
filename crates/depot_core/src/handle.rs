//! Asset handles and handle allocation
//!
//! A handle is the registry key of an asset and the cross-reference written
//! into other assets' containers. It is compared by value only.

use core::fmt;
use core::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque, stable 64-bit identifier of an asset
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct AssetHandle(u64);

impl AssetHandle {
    /// The null handle. Never identifies a valid asset.
    pub const NULL: Self = Self(0);

    /// Create a handle from its raw value
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Check if this handle is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Get the raw value (as stored in containers)
    #[inline]
    pub const fn to_raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AssetHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<AssetHandle> for u64 {
    fn from(handle: AssetHandle) -> Self {
        handle.0
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "AssetHandle(null)")
        } else {
            write!(f, "AssetHandle({:#018x})", self.0)
        }
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl FromStr for AssetHandle {
    type Err = core::num::ParseIntError;

    /// Accepts decimal or `0x`-prefixed hexadecimal
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).map(Self),
            None => s.parse().map(Self),
        }
    }
}

/// Thread-safe handle generator
///
/// Handles are handed out in increasing order starting at 1. Ids discovered on
/// disk are reported through [`HandleAllocator::observe`] so that freshly
/// allocated handles never collide with them.
pub struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    /// Create a new allocator
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Generate the next unique handle
    pub fn allocate(&self) -> AssetHandle {
        AssetHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Record an externally assigned handle; later allocations skip past it
    pub fn observe(&self, handle: AssetHandle) {
        if !handle.is_null() {
            self.next
                .fetch_max(handle.0.saturating_add(1), Ordering::Relaxed);
        }
    }

    /// Peek at the handle the next call to `allocate` would return
    pub fn peek(&self) -> AssetHandle {
        AssetHandle(self.next.load(Ordering::Relaxed))
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandleAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleAllocator")
            .field("next", &self.peek())
            .finish()
    }
}
