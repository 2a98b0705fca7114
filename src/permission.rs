/// Requested access mode for a page (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    /// The lock strength a given permission requires.
    pub fn to_lock_mode(self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// Lock strength held on a page (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    /// `READ_ONLY` is compatible with `READ_ONLY`; `READ_WRITE` is
    /// incompatible with anything else (spec.md §4.2).
    pub fn compatible_with(self, other: LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }

    /// Whether `self` satisfies a request for `requested` (i.e. `self`
    /// is at least as strong).
    pub fn satisfies(self, requested: LockMode) -> bool {
        match requested {
            LockMode::Shared => true,
            LockMode::Exclusive => self == LockMode::Exclusive,
        }
    }
}
