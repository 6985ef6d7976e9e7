//! Core type definitions used throughout the codebase

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Unique identifier for players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

/// Arena handle for territories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerritoryId(pub u32);

/// Arena handle for units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl TerritoryId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl UnitId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Symmetric alliance table between players
///
/// Every player is allied with itself. Any pair not recorded as allied is
/// treated as enemies; the planner has no notion of true neutrality between
/// players (neutral map territories simply have no owner).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relations {
    allied_pairs: AHashSet<(PlayerId, PlayerId)>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ally(&mut self, a: PlayerId, b: PlayerId) {
        self.allied_pairs.insert(Self::ordered(a, b));
    }

    pub fn is_allied(&self, a: PlayerId, b: PlayerId) -> bool {
        a == b || self.allied_pairs.contains(&Self::ordered(a, b))
    }

    pub fn is_enemy(&self, a: PlayerId, b: PlayerId) -> bool {
        !self.is_allied(a, b)
    }

    fn ordered(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
        if a.0 <= b.0 {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relations_symmetric() {
        let mut relations = Relations::new();
        relations.ally(PlayerId(0), PlayerId(2));

        assert!(relations.is_allied(PlayerId(0), PlayerId(2)));
        assert!(relations.is_allied(PlayerId(2), PlayerId(0)));
        assert!(relations.is_enemy(PlayerId(0), PlayerId(1)));
    }

    #[test]
    fn test_self_allied() {
        let relations = Relations::new();
        assert!(relations.is_allied(PlayerId(3), PlayerId(3)));
    }

    #[test]
    fn test_id_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<TerritoryId, &str> = HashMap::new();
        map.insert(TerritoryId(1), "coast");
        assert_eq!(map.get(&TerritoryId(1)), Some(&"coast"));
    }
}
