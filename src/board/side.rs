//! Battle sides.

use serde::{Deserialize, Serialize};

/// One of the two parties to a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Attacker,
    Defender,
}

/// Both sides, attacker first.
pub const BOTH_SIDES: [Side; 2] = [Side::Attacker, Side::Defender];

impl Side {
    pub const fn opponent(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }

    pub const fn is_attacker(self) -> bool {
        matches!(self, Side::Attacker)
    }

    /// Lowercase name used in protocol output.
    pub const fn label(self) -> &'static str {
        match self {
            Side::Attacker => "attacker",
            Side::Defender => "defender",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_is_involutive() {
        for side in BOTH_SIDES {
            assert_eq!(side.opponent().opponent(), side);
            assert_ne!(side.opponent(), side);
        }
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Defender).unwrap(), "\"defender\"");
    }
}
