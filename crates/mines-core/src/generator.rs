//! Board generation.
//!
//! Mines are thrown down at random outside the safe starting zone, then the
//! solver (armed with a perturbator) is run against the candidate board. A
//! board is accepted only once a solver pass finishes without any
//! perturbation, which proves the returned layout is solvable by deduction
//! alone from the starting square.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::game::{Game, GameData, GameParams};
use crate::grid::Grid;
use crate::knowledge::PlayerKnowledge;
use crate::perturbator::Perturbator;
use crate::solver::Solver;

/// Generates mine grids, optionally guaranteed solvable without guessing.
///
/// The generator owns the RNG; all randomness of a run (placement, the
/// perturbator's shuffles, its set picks) draws from this one stream, which
/// makes generation fully reproducible for a fixed seed.
pub struct Generator {
    seed: u32,
    rng: SmallRng,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    pub fn new() -> Self {
        Self { seed: 0, rng: SmallRng::seed_from_u64(0) }
    }

    /// Draw a fresh seed from system entropy and remember it. Falls back to
    /// a process-wide counter if no entropy source is available.
    pub fn draw_seed(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        if getrandom::getrandom(&mut bytes).is_err() {
            use std::sync::atomic::{AtomicU32, Ordering};
            static COUNTER: AtomicU32 = AtomicU32::new(1);
            bytes = COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes();
        }
        // 0 is reserved for "no seed chosen yet".
        self.seed = u32::from_le_bytes(bytes).max(1);
        self.seed
    }

    /// Generate a mine grid for `params`.
    ///
    /// Mines never land within one square of the start. With
    /// `params.unique`, the result is additionally solvable from the start
    /// by pure deduction; the generator keeps retrying (and letting the
    /// perturbator rewrite near-misses) until such a board comes out.
    ///
    /// The parameters must be in range (see [`GameParams::validate`]).
    pub fn generate(&mut self, params: &GameParams) -> Grid<bool> {
        let seed = if params.seed != 0 {
            params.seed
        } else {
            if self.seed == 0 {
                self.draw_seed();
            }
            self.seed
        };
        self.rng = SmallRng::seed_from_u64(u64::from(seed));

        mine_gen(params, &mut self.rng)
    }
}

fn mine_gen(params: &GameParams, rng: &mut SmallRng) -> Grid<bool> {
    let (sx, sy) = (params.sx, params.sy);
    let mut ntries: u32 = 0;

    loop {
        ntries += 1;

        // Random placement, keeping the 3x3 block around the start clear.
        let mut mines = Grid::new(params.width, params.height, false);
        let mut positions: Vec<usize> = (0..mines.len())
            .filter(|&i| {
                let p = mines.point_of(i);
                (p.x - sx).abs() > 1 || (p.y - sy).abs() > 1
            })
            .collect();
        debug_assert!(positions.len() >= params.mine_count as usize);
        positions.shuffle(rng);
        positions.truncate(params.mine_count as usize);
        for i in positions {
            mines.set_at(i, true);
        }

        if !params.unique {
            return mines;
        }

        // Dry-run the solver against this layout. The perturbator may
        // rewrite the mines along the way; every rewrite costs another
        // verification pass over the rewritten board.
        let mut game = Game::from_data(GameData {
            params: *params,
            seed: params.seed,
            mines,
            grid: Grid::new(params.width, params.height, PlayerKnowledge::Unknown),
            dead: false,
            won: false,
            hit: None,
        });

        let mut perturbator = Perturbator::new(rng);
        let mut prev_perturbs: Option<u32> = None;

        let accepted = loop {
            game.data_mut().grid.fill(PlayerKnowledge::Unknown);
            let start_count = game.mine_lookup(sx, sy).unwrap_or_default();
            debug_assert_eq!(start_count, 0);
            game.data_mut()
                .grid
                .set(sx, sy, PlayerKnowledge::Revealed(start_count));

            perturbator.reset(ntries);
            let solved = Solver::with_perturbator(&mut perturbator).solve(&mut game);
            let used = perturbator.use_count();

            // Unsolvable, or the rewrites are not converging: start over
            // with a fresh random board.
            if !solved || prev_perturbs.is_some_and(|prev| used >= prev) {
                break false;
            }
            prev_perturbs = Some(used);

            // A pass with zero perturbations certifies the current layout.
            if used == 0 {
                break true;
            }
        };

        if accepted {
            return game.into_data().mines;
        }
    }
}
