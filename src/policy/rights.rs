//! Rights algebra: a 32-bit capability bitmask with name translation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// A named, orderable bit in the `Right` mask.
const NAMED_BITS: &[(Right, &str)] = &[
    (Right::VIEW, "View"),
    (Right::VIEW_DELETED, "ViewDeleted"),
    (Right::VIEW_HIDDEN, "ViewHidden"),
    (Right::CREATE, "Create"),
    (Right::CHANGE, "Change"),
    (Right::DELETE, "Delete"),
    (Right::RESTORE_DELETED, "RestoreDeleted"),
    (Right::COPY, "Copy"),
    (Right::DUPLICATE, "Duplicate"),
    (Right::MOVE, "Move"),
    (Right::MANAGE_ACCESS, "ManageAccess"),
];

/// A 32-bit mask of capabilities such as View, Change, Delete, Move,
/// ManageAccess. `FullAccess` sets every bit, including undefined ones, so
/// that an owner override or a grantor who already holds `FullAccess` is
/// never short-circuited by a future bit the dictionary hasn't named yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Right(pub u32);

impl Right {
    pub const NO_ACCESS: Right = Right(0);
    pub const VIEW: Right = Right(1 << 0);
    pub const VIEW_DELETED: Right = Right(1 << 1);
    pub const VIEW_HIDDEN: Right = Right(1 << 2);
    pub const CREATE: Right = Right(1 << 3);
    pub const CHANGE: Right = Right(1 << 4);
    pub const DELETE: Right = Right(1 << 5);
    pub const RESTORE_DELETED: Right = Right(1 << 6);
    pub const COPY: Right = Right(1 << 7);
    pub const DUPLICATE: Right = Right(1 << 8);
    pub const MOVE: Right = Right(1 << 9);
    pub const MANAGE_ACCESS: Right = Right(1 << 10);
    pub const FULL_ACCESS: Right = Right(u32::MAX);

    pub fn union(self, other: Right) -> Right {
        Right(self.0 | other.0)
    }

    pub fn intersect(self, other: Right) -> Right {
        Right(self.0 & other.0)
    }

    /// `has(r, rights) ≡ (r & rights) == rights`.
    pub fn has(self, rights: Right) -> bool {
        (self & rights) == rights
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Translate a single named bit to its dictionary name, `None` for
    /// undefined or composite masks.
    pub fn name(self) -> Option<&'static str> {
        NAMED_BITS.iter().find(|(bit, _)| *bit == self).map(|(_, n)| *n)
    }

    /// Translate a mask to a comma-joined list of the names it contains, in
    /// the dictionary's low-to-high order.
    pub fn to_names(self) -> String {
        NAMED_BITS
            .iter()
            .filter(|(bit, _)| self.has(*bit))
            .map(|(_, n)| *n)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Inverse of `to_names`: unknown names are ignored rather than
    /// rejected, so a dictionary addition never breaks an older caller.
    pub fn from_names(names: &str) -> Right {
        let mut r = Right::NO_ACCESS;
        for part in names.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((bit, _)) = NAMED_BITS.iter().find(|(_, n)| *n == part) {
                r |= *bit;
            }
        }
        r
    }
}

impl BitOr for Right {
    type Output = Right;
    fn bitor(self, rhs: Right) -> Right {
        self.union(rhs)
    }
}

impl BitOrAssign for Right {
    fn bitor_assign(&mut self, rhs: Right) {
        *self = self.union(rhs);
    }
}

impl BitAnd for Right {
    type Output = Right;
    fn bitand(self, rhs: Right) -> Right {
        self.intersect(rhs)
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "NoAccess")
        } else if *self == Right::FULL_ACCESS {
            write!(f, "FullAccess")
        } else {
            write!(f, "{}", self.to_names())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_access_contains_every_defined_bit() {
        for (bit, _) in NAMED_BITS {
            assert!(Right::FULL_ACCESS.has(*bit));
        }
    }

    #[test]
    fn full_access_contains_undefined_bits_too() {
        let undefined = Right(1 << 31);
        assert!(Right::FULL_ACCESS.has(undefined));
    }

    #[test]
    fn has_is_subset_containment() {
        let r = Right::VIEW | Right::CHANGE;
        assert!(r.has(Right::VIEW));
        assert!(r.has(Right::VIEW | Right::CHANGE));
        assert!(!r.has(Right::DELETE));
    }

    #[test]
    fn name_round_trips_through_comma_join() {
        let r = Right::VIEW | Right::CHANGE | Right::MOVE;
        let names = r.to_names();
        assert_eq!(names, "View,Change,Move");
        assert_eq!(Right::from_names(&names), r);
    }

    #[test]
    fn no_access_is_zero() {
        assert_eq!(Right::NO_ACCESS.0, 0);
        assert_eq!(Right::NO_ACCESS.to_names(), "");
    }
}
