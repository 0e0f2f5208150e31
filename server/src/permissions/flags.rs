//! Account permissions using bitflags.
//!
//! Each permission is a distinct bit so a role's grants combine with `|` and
//! are checked with a single mask test.

use bitflags::bitflags;

bitflags! {
    /// Permissions represented as a 32-bit bitfield.
    ///
    /// Stored as INTEGER alongside the role row.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct Permission: u32 {
        /// Permission to comment on posts
        const COMMENT  = 1 << 0;
        /// Permission to write posts on one's own blog
        const WRITE    = 1 << 1;
        /// Permission to moderate other members' comments and posts
        const MODERATE = 1 << 2;
        /// Permission to administer accounts and roles
        const ADMIN    = 1 << 3;
    }
}

impl Permission {
    /// Every named permission, lowest bit first.
    pub const ALL: [Self; 4] = [Self::COMMENT, Self::WRITE, Self::MODERATE, Self::ADMIN];

    // === Database Conversion ===

    /// Create permissions from a stored INTEGER value.
    ///
    /// Unknown bits are dropped so rows written by a newer release still load.
    /// A value outside the `u32` range is corrupt and grants nothing.
    #[must_use]
    pub fn from_db(value: i64) -> Self {
        u32::try_from(value).map_or(Self::empty(), Self::from_bits_truncate)
    }

    /// Convert permissions to the stored INTEGER value.
    #[must_use]
    pub const fn to_db(self) -> i64 {
        self.bits() as i64
    }

    // === Names ===

    /// Parse a single permission from its bootstrap-table name.
    ///
    /// Matching is case-insensitive, so `"write"` and `"WRITE"` are the same.
    ///
    /// # Examples
    ///
    /// ```
    /// use inkwell_server::permissions::Permission;
    ///
    /// assert_eq!(Permission::parse("moderate"), Some(Permission::MODERATE));
    /// assert_eq!(Permission::parse("publish"), None);
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::from_name(&name.trim().to_ascii_uppercase())
    }

    /// Lower-case names of the flags set in this mask.
    #[must_use]
    pub fn names(self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect()
    }
}

impl From<i64> for Permission {
    fn from(value: i64) -> Self {
        Self::from_db(value)
    }
}
