//! Capability bitset and runtime capability discovery.
//!
//! A [`Capability`] names the operations a backend can perform. Backends may
//! report their own set; otherwise [`derive`] probes which optional operation
//! contracts the backend fulfils.

use crate::backend::Backend;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::Arc;

/// A set of filesystem operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capability(u32);

impl Capability {
    pub const EMPTY: Self = Self(0);
    pub const READ: Self = Self(1);
    pub const WRITE: Self = Self(1 << 1);
    pub const APPEND: Self = Self(1 << 2);
    pub const TRUNCATE: Self = Self(1 << 3);
    pub const CREATE: Self = Self(1 << 4);
    pub const MKDIR: Self = Self(1 << 5);
    pub const REMOVE: Self = Self(1 << 6);
    pub const RENAME: Self = Self(1 << 7);
    pub const STAT: Self = Self(1 << 8);

    /// Everything a deliberately non-mutating view may still do.
    pub const READ_ONLY: Self = Self(Self::READ.0 | Self::STAT.0);
    /// Every operation.
    pub const ALL: Self = Self(
        Self::READ.0
            | Self::WRITE.0
            | Self::APPEND.0
            | Self::TRUNCATE.0
            | Self::CREATE.0
            | Self::MKDIR.0
            | Self::REMOVE.0
            | Self::RENAME.0
            | Self::STAT.0,
    );

    /// Reporting order for [`to_strings()`](Self::to_strings).
    const TOKENS: [(Self, &'static str); 9] = [
        (Self::READ, "read"),
        (Self::WRITE, "write"),
        (Self::APPEND, "append"),
        (Self::TRUNCATE, "truncate"),
        (Self::CREATE, "create"),
        (Self::MKDIR, "mkdir"),
        (Self::REMOVE, "remove"),
        (Self::RENAME, "rename"),
        (Self::STAT, "stat"),
    ];

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Lowercase tokens for each member, in a stable order, for advertising
    /// permissions to external consumers.
    pub fn to_strings(self) -> Vec<&'static str> {
        Self::TOKENS.iter().filter(|(cap, _)| self.contains(*cap)).map(|(_, token)| *token).collect()
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_strings().join(","))
    }
}

impl BitOr for Capability {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capability {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Capability {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

type Probe = fn(&Arc<dyn Backend>) -> bool;

/// Fixed, ordered list of optional-contract probes. `READ` is not probed:
/// every backend supports traversal.
const PROBES: [(Capability, Probe); 6] = [
    (Capability::STAT, |b| Arc::clone(b).stat_fs().is_some()),
    (Capability::WRITE, |b| Arc::clone(b).writer_fs().is_some()),
    (Capability::REMOVE, |b| Arc::clone(b).remove_fs().is_some()),
    (Capability::RENAME, |b| Arc::clone(b).rename_fs().is_some()),
    (Capability::MKDIR, |b| Arc::clone(b).mkdir_fs().is_some()),
    (Capability::TRUNCATE, |b| Arc::clone(b).truncate_fs().is_some()),
];

/// Derive the capabilities of an arbitrary backend.
///
/// A self-reported set is used verbatim. Otherwise the result is
/// [`READ`](Capability::READ) plus one bit for every optional contract the
/// backend satisfies.
pub fn derive(backend: &Arc<dyn Backend>) -> Capability {
    if let Some(caps) = backend.capabilities() {
        return caps;
    }
    PROBES.iter().filter(|(_, probe)| probe(backend)).fold(Capability::READ, |caps, (cap, _)| caps | *cap)
}
