use serde::{Deserialize, Serialize};

/// What the player (and the solver) knows about a single square.
///
/// Terminal display states such as "exploded mine" or "wrongly flagged
/// square" are a front-end concern; they are derived from the grid, the mine
/// layout and the dead flag when a finished game is drawn.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerKnowledge {
    /// Nothing known yet.
    #[default]
    Unknown,
    /// Believed to hold a mine, either flagged by the player or deduced by
    /// the solver.
    MarkedAsMine,
    /// Opened; the payload is the mine count of the 8-neighborhood.
    Revealed(u8),
}

impl PlayerKnowledge {
    pub fn is_unknown(self) -> bool {
        self == PlayerKnowledge::Unknown
    }

    pub fn is_marked(self) -> bool {
        self == PlayerKnowledge::MarkedAsMine
    }

    /// The displayed neighbor-mine count, if the square has been opened.
    pub fn revealed_count(self) -> Option<u8> {
        match self {
            PlayerKnowledge::Revealed(n) => Some(n),
            _ => None,
        }
    }

    /// Covered means not yet opened: unknown or flagged.
    pub fn is_covered(self) -> bool {
        !matches!(self, PlayerKnowledge::Revealed(_))
    }
}
