use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generator::Generator;
use crate::grid::{Grid, Point};
use crate::knowledge::PlayerKnowledge;

/// Board generation parameters.
///
/// `sx`/`sy` is the starting square: the first square the player opens. It
/// is guaranteed to carry no mine, and neither is any of its 8 neighbors.
/// A negative start means "not chosen yet" (it is set by the first call to
/// [`Game::open_square`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameParams {
    pub width: i32,
    pub height: i32,
    pub mine_count: i32,
    /// Require a board solvable by deduction alone (no guessing).
    pub unique: bool,
    pub sx: i32,
    pub sy: i32,
    /// RNG seed; 0 draws a fresh seed from system entropy.
    pub seed: u32,
}

impl GameParams {
    pub fn new(width: i32, height: i32, mine_count: i32) -> Self {
        Self { width, height, mine_count, unique: true, sx: -1, sy: -1, seed: 0 }
    }

    /// Classic 9x9 board with 10 mines.
    pub fn beginner() -> Self {
        Self::new(9, 9, 10)
    }

    /// Classic 16x16 board with 40 mines.
    pub fn intermediate() -> Self {
        Self::new(16, 16, 40)
    }

    /// Classic 30x16 board with 99 mines.
    pub fn expert() -> Self {
        Self::new(30, 16, 99)
    }

    /// Number of squares in the safe starting zone: the 3x3 block centered
    /// on the start, clipped to the board.
    pub fn safe_zone_size(&self) -> i32 {
        let clip = |c: i32, max: i32| {
            let lo = (c - 1).max(0);
            let hi = (c + 1).min(max - 1);
            hi - lo + 1
        };
        clip(self.sx, self.width) * clip(self.sy, self.height)
    }

    /// Check the parameters against a concrete starting square.
    ///
    /// The mine count must leave the whole safe starting zone free, so the
    /// real bound is `width * height - safe_zone_size()`, not the naive
    /// `width * height`.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.width < 1 || self.height < 1 {
            return Err(ParamsError::EmptyBoard { width: self.width, height: self.height });
        }
        if self.sx < 0 || self.sx >= self.width || self.sy < 0 || self.sy >= self.height {
            return Err(ParamsError::StartOutOfBounds {
                sx: self.sx,
                sy: self.sy,
                width: self.width,
                height: self.height,
            });
        }
        let free = self.width * self.height - self.safe_zone_size();
        if self.mine_count < 0 || self.mine_count > free {
            return Err(ParamsError::MineCountOutOfRange {
                mine_count: self.mine_count,
                free,
            });
        }
        Ok(())
    }
}

impl Default for GameParams {
    fn default() -> Self {
        Self::beginner()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("board must be at least 1x1, got {width}x{height}")]
    EmptyBoard { width: i32, height: i32 },
    #[error("starting square ({sx}, {sy}) is outside the {width}x{height} board")]
    StartOutOfBounds { sx: i32, sy: i32, width: i32, height: i32 },
    #[error("{mine_count} mines do not fit in the {free} squares outside the safe starting zone")]
    MineCountOutOfRange { mine_count: i32, free: i32 },
}

/// The full state of one game.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub params: GameParams,
    /// The seed the board was actually generated with (resolved from
    /// `params.seed`, or drawn from entropy when that was 0).
    pub seed: u32,
    /// True iff the cell holds a mine. Empty until the board is generated.
    pub mines: Grid<bool>,
    /// The player's view of the board.
    pub grid: Grid<PlayerKnowledge>,
    pub dead: bool,
    pub won: bool,
    /// The square that ended the game, when `dead`.
    pub hit: Option<Point>,
}

/// Mines in the 8-neighborhood of `(x, y)`.
pub(crate) fn adjacent_mines(mines: &Grid<bool>, x: i32, y: i32) -> u8 {
    let mut n = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            if (dx != 0 || dy != 0) && mines.contains(x + dx, y + dy) && *mines.get(x + dx, y + dy)
            {
                n += 1;
            }
        }
    }
    n
}

/// One minesweeper game: a mine layout plus the player's knowledge grid.
///
/// The board is generated lazily by the first [`open_square`](Self::open_square)
/// call, so the clicked square can become the guaranteed-safe start.
#[derive(Debug, Clone)]
pub struct Game {
    data: GameData,
}

impl Game {
    pub fn new(params: GameParams) -> Self {
        Self { data: GameData { params, ..GameData::default() } }
    }

    /// Build a game from explicit state (used by the generator's solver
    /// runs and by tests).
    pub fn from_data(data: GameData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &GameData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut GameData {
        &mut self.data
    }

    pub fn into_data(self) -> GameData {
        self.data
    }

    pub fn params(&self) -> &GameParams {
        &self.data.params
    }

    pub fn grid(&self) -> &Grid<PlayerKnowledge> {
        &self.data.grid
    }

    pub fn mines(&self) -> &Grid<bool> {
        &self.data.mines
    }

    /// Whether a board has been generated yet.
    pub fn generated(&self) -> bool {
        !self.data.mines.is_empty()
    }

    pub fn dead(&self) -> bool {
        self.data.dead
    }

    pub fn won(&self) -> bool {
        self.data.won
    }

    pub fn finished(&self) -> bool {
        self.dead() || self.won()
    }

    /// The mine count displayed on square `(x, y)`: the number of mines in
    /// its 8-neighborhood, or `None` if the square itself is a mine.
    pub fn mine_lookup(&self, x: i32, y: i32) -> Option<u8> {
        if *self.data.mines.get(x, y) {
            return None;
        }
        Some(adjacent_mines(&self.data.mines, x, y))
    }

    /// Open a square.
    ///
    /// The first open generates the board with `(x, y)` as the safe start
    /// and records the resolved seed. Opening a mine loses the game;
    /// opening a zero-count square floods outward through its neighbors.
    /// When only mined squares remain covered, they are all flagged and the
    /// game is won.
    pub fn open_square(&mut self, x: i32, y: i32) {
        if !self.generated() {
            self.data.params.sx = x;
            self.data.params.sy = y;

            let mut generator = Generator::new();
            self.data.seed = if self.data.params.seed != 0 {
                self.data.params.seed
            } else {
                generator.draw_seed()
            };
            self.data.mines = generator.generate(&self.data.params);
            self.data.grid = Grid::new(
                self.data.params.width,
                self.data.params.height,
                PlayerKnowledge::Unknown,
            );
        }

        self.open_generated_square(x, y);
    }

    fn open_generated_square(&mut self, x: i32, y: i32) {
        debug_assert!(self.generated());

        if *self.data.mines.get(x, y) {
            self.data.dead = true;
            self.data.hit = Some(Point::new(x, y));
            return;
        }

        let count = adjacent_mines(&self.data.mines, x, y);
        self.data.grid.set(x, y, PlayerKnowledge::Revealed(count));

        // Zero-count squares reveal their whole neighborhood; the flood is
        // iterative over a worklist of zero squares.
        let mut todo = Vec::new();
        if count == 0 {
            todo.push(self.data.grid.idx(x, y));
        }
        while let Some(i) = todo.pop() {
            let p = self.data.grid.point_of(i);
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let (nx, ny) = (p.x + dx, p.y + dy);
                    if !self.data.grid.contains(nx, ny)
                        || !self.data.grid.get(nx, ny).is_unknown()
                    {
                        continue;
                    }
                    let n = adjacent_mines(&self.data.mines, nx, ny);
                    debug_assert!(!*self.data.mines.get(nx, ny));
                    self.data.grid.set(nx, ny, PlayerKnowledge::Revealed(n));
                    if n == 0 {
                        todo.push(self.data.grid.idx(nx, ny));
                    }
                }
            }
        }

        self.check_win();
    }

    fn check_win(&mut self) {
        if self.data.dead {
            return;
        }

        let covered = self.data.grid.iter().filter(|k| k.is_covered()).count();
        let mines = self.data.mines.iter().filter(|&&m| m).count();
        debug_assert!(covered >= mines);

        // All safe squares opened: flag the rest and win.
        if covered == mines {
            for i in 0..self.data.grid.len() {
                if self.data.grid.at(i).is_covered() {
                    self.data.grid.set_at(i, PlayerKnowledge::MarkedAsMine);
                }
            }
            self.data.won = true;
        }
    }

    /// Chord-open: if the flags around a revealed square account for its
    /// mine count, open every other covered neighbor. A wrong flag makes
    /// this open the mined square instead, losing the game.
    pub fn open_adjacent_squares(&mut self, x: i32, y: i32) {
        if !self.generated()
            || !self.data.grid.contains(x, y)
            || self.data.grid.get(x, y).is_marked()
        {
            return;
        }
        let Some(shown) = self.data.grid.get(x, y).revealed_count() else {
            return;
        };

        let mut flags = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if self.data.grid.contains(x + dx, y + dy)
                    && self.data.grid.get(x + dx, y + dy).is_marked()
                {
                    flags += 1;
                }
            }
        }
        if flags != i32::from(shown) {
            return;
        }

        // A mine behind an unflagged neighbor means a flag is wrong: open
        // just that square and lose.
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if self.data.mines.contains(nx, ny)
                    && !self.data.grid.get(nx, ny).is_marked()
                    && *self.data.mines.get(nx, ny)
                {
                    self.open_generated_square(nx, ny);
                    return;
                }
            }
        }

        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if self.data.grid.contains(nx, ny) && self.data.grid.get(nx, ny).is_unknown() {
                    self.open_generated_square(nx, ny);
                }
            }
        }
    }

    /// Toggle the mine flag on a covered square. Only `Unknown` and
    /// `MarkedAsMine` may flip into each other; returns whether a toggle
    /// happened.
    pub fn toggle_mark(&mut self, x: i32, y: i32) -> bool {
        if !self.data.grid.contains(x, y) {
            return false;
        }
        match *self.data.grid.get(x, y) {
            PlayerKnowledge::Unknown => {
                self.data.grid.set(x, y, PlayerKnowledge::MarkedAsMine);
                true
            }
            PlayerKnowledge::MarkedAsMine => {
                self.data.grid.set(x, y, PlayerKnowledge::Unknown);
                true
            }
            PlayerKnowledge::Revealed(_) => false,
        }
    }

    /// Number of opened squares.
    pub fn count_uncovered(&self) -> usize {
        self.data.grid.iter().filter(|k| !k.is_covered()).count()
    }

    /// Number of flagged squares.
    pub fn count_flags(&self) -> usize {
        self.data.grid.iter().filter(|k| k.is_marked()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handmade(width: i32, height: i32, mines: &[(i32, i32)], start: (i32, i32)) -> Game {
        let mut mine_grid = Grid::new(width, height, false);
        for &(x, y) in mines {
            mine_grid.set(x, y, true);
        }
        let mut params = GameParams::new(width, height, mines.len() as i32);
        params.sx = start.0;
        params.sy = start.1;
        Game::from_data(GameData {
            params,
            seed: 0,
            mines: mine_grid,
            grid: Grid::new(width, height, PlayerKnowledge::Unknown),
            dead: false,
            won: false,
            hit: None,
        })
    }

    #[test]
    fn zero_square_floods() {
        // Single mine in the far corner of a 4x4 board; opening (0,0)
        // reveals everything except the mine, which wins the game.
        let mut game = handmade(4, 4, &[(3, 3)], (0, 0));
        game.open_square(0, 0);
        assert!(game.won());
        assert_eq!(game.count_uncovered(), 15);
        assert!(game.grid().get(3, 3).is_marked());
        assert_eq!(game.grid().get(2, 2).revealed_count(), Some(1));
    }

    #[test]
    fn opening_a_mine_loses() {
        let mut game = handmade(4, 4, &[(3, 3)], (0, 0));
        game.open_square(3, 3);
        assert!(game.dead());
        assert_eq!(game.data().hit, Some(Point::new(3, 3)));
    }

    #[test]
    fn toggle_mark_only_on_covered_squares() {
        let mut game = handmade(4, 4, &[(3, 3)], (0, 0));
        assert!(game.toggle_mark(3, 3));
        assert!(game.grid().get(3, 3).is_marked());
        assert!(game.toggle_mark(3, 3));
        assert!(game.grid().get(3, 3).is_unknown());

        game.open_square(0, 0);
        assert!(!game.toggle_mark(1, 1)); // revealed
    }

    #[test]
    fn chord_opens_neighbors_when_flags_match() {
        // Mines at (0,0) and (2,0); the square (1,1) shows 2.
        let mut game = handmade(4, 4, &[(0, 0), (2, 0)], (1, 3));
        game.open_square(1, 1);
        assert_eq!(game.grid().get(1, 1).revealed_count(), Some(2));

        game.toggle_mark(0, 0);
        game.toggle_mark(2, 0);
        game.open_adjacent_squares(1, 1);
        assert!(!game.dead());
        assert_eq!(game.grid().get(1, 0).revealed_count(), Some(2));
        assert_eq!(game.grid().get(0, 1).revealed_count(), Some(1));
    }

    #[test]
    fn chord_with_wrong_flag_loses() {
        let mut game = handmade(4, 4, &[(0, 0), (2, 0)], (1, 3));
        game.open_square(1, 1);
        game.toggle_mark(0, 0);
        game.toggle_mark(1, 0); // wrong: the second mine is at (2,0)
        game.open_adjacent_squares(1, 1);
        assert!(game.dead());
        assert_eq!(game.data().hit, Some(Point::new(2, 0)));
    }

    #[test]
    fn mine_lookup_distinguishes_mines() {
        let game = handmade(3, 3, &[(2, 2)], (0, 0));
        assert_eq!(game.mine_lookup(2, 2), None);
        assert_eq!(game.mine_lookup(1, 1), Some(1));
        assert_eq!(game.mine_lookup(0, 0), Some(0));
    }

    #[test]
    fn validate_rejects_degenerate_boards() {
        let mut params = GameParams::new(3, 3, 1);
        params.sx = 1;
        params.sy = 1;
        // The safe zone covers the whole board: no room for any mine.
        assert_eq!(
            params.validate(),
            Err(ParamsError::MineCountOutOfRange { mine_count: 1, free: 0 })
        );

        let mut corner = GameParams::new(4, 4, 12);
        corner.sx = 0;
        corner.sy = 0;
        // Corner start reserves only 4 squares, so 12 mines fit exactly.
        assert_eq!(corner.validate(), Ok(()));

        corner.mine_count = 13;
        assert!(corner.validate().is_err());
    }

    #[test]
    fn presets_are_valid_everywhere() {
        for mut params in [
            GameParams::beginner(),
            GameParams::intermediate(),
            GameParams::expert(),
        ] {
            params.sx = 0;
            params.sy = 0;
            assert_eq!(params.validate(), Ok(()));
            params.sx = params.width / 2;
            params.sy = params.height / 2;
            assert_eq!(params.validate(), Ok(()));
        }
    }
}
