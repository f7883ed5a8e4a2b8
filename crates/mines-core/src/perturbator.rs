//! Mine-swapping rescue for stuck solver runs.
//!
//! When the solver can no longer deduce anything, the generator does not
//! have to throw the board away: the perturbator moves mines into or out of
//! a target set of squares so that the solver's view of that set changes,
//! while every already-revealed number stays truthful and the safe starting
//! zone stays empty.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::game::{adjacent_mines, Game};
use crate::grid::Grid;
use crate::knowledge::PlayerKnowledge;
use crate::solver::{SetStore, SquareSet};

/// Generation attempts after which whole-board ("big") perturbations are
/// allowed. Enabling them from the start yields boards with mines clumped
/// into far corners, so the first attempts go without.
const BIG_PERTURB_AFTER: u32 = 100;

/// What happened to a single square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    ChangedToMine,
    Cleared,
}

impl Change {
    /// The mine-count delta this change applies to adjacent numbers.
    pub fn delta(self) -> i32 {
        match self {
            Change::ChangedToMine => 1,
            Change::Cleared => -1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Change::ChangedToMine => Change::Cleared,
            Change::Cleared => Change::ChangedToMine,
        }
    }
}

/// A single applied mine flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Perturbation {
    pub x: i32,
    pub y: i32,
    pub change: Change,
}

/// Candidate squares outside the target set, ordered by preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CandidateClass {
    /// Unknown square bordering at least one known square. Preferred:
    /// swapping a mine here tends to unblock the solver immediately.
    NearKnownSquare = 1,
    /// Unknown square with no known neighbor.
    InUnknownRegion = 2,
    /// Known square; last resort, as swapping here visibly changes the
    /// player's view.
    KnownSquare = 3,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    class: CandidateClass,
    x: i32,
    y: i32,
}

/// Rewrites mine layouts for the solver.
///
/// Holds a mutable borrow of the generator's RNG so every random draw of a
/// generation run comes from one deterministic stream.
#[derive(Debug)]
pub struct Perturbator<'r> {
    rng: &'r mut SmallRng,
    use_count: u32,
    allow_big_perturbs: bool,
}

impl<'r> Perturbator<'r> {
    pub fn new(rng: &'r mut SmallRng) -> Self {
        Self { rng, use_count: 0, allow_big_perturbs: false }
    }

    /// How many times `perturb`/`perturb_set` ran since the last reset,
    /// counting calls that changed nothing.
    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    /// Prepare for a fresh solver run. `ntries` is the generator's attempt
    /// counter; late attempts unlock big perturbations.
    pub fn reset(&mut self, ntries: u32) {
        self.use_count = 0;
        self.allow_big_perturbs = ntries > BIG_PERTURB_AFTER;
    }

    /// Perturb around a set picked at random from the store, or around all
    /// unknown squares when the store is empty.
    pub fn perturb(&mut self, game: &mut Game, ss: &SetStore) -> Vec<Perturbation> {
        let target = if ss.is_empty() {
            SquareSet::new(-1, -1, 0)
        } else {
            let i = self.rng.random_range(0..ss.len());
            ss.nth(i).unwrap_or_default()
        };
        self.perturb_set(game, target)
    }

    /// Perturb around an explicit target set. An empty `target` stands for
    /// every unknown square on the board and is only honored when big
    /// perturbations are enabled.
    pub fn perturb_set(&mut self, game: &mut Game, target: SquareSet) -> Vec<Perturbation> {
        self.use_count += 1;
        mine_perturb(game, target, self.rng, self.allow_big_perturbs)
    }
}

/// Mines and non-mines inside the target set.
fn count_full_and_empty(set: &SquareSet, mines: &Grid<bool>) -> (usize, usize) {
    let mut full = 0;
    let mut empty = 0;
    for p in set.squares() {
        debug_assert!(mines.contains(p.x, p.y));
        if *mines.get(p.x, p.y) {
            full += 1;
        } else {
            empty += 1;
        }
    }
    (full, empty)
}

/// Mines and non-mines among all unknown squares.
fn count_full_and_empty_unknown(
    grid: &Grid<PlayerKnowledge>,
    mines: &Grid<bool>,
) -> (usize, usize) {
    let mut full = 0;
    let mut empty = 0;
    for i in 0..grid.len() {
        if grid.at(i).is_unknown() {
            if *mines.at(i) {
                full += 1;
            } else {
                empty += 1;
            }
        }
    }
    (full, empty)
}

/// Squares usable for swapping: everything outside the target set and
/// outside the safe starting zone, grouped by preference class and shuffled
/// within each class.
fn build_candidate_list(
    game: &Game,
    target: &SquareSet,
    rng: &mut SmallRng,
) -> Vec<Candidate> {
    let grid = game.grid();
    let (sx, sy) = (game.params().sx, game.params().sy);
    let mut list = Vec::with_capacity(grid.len());

    for i in 0..grid.len() {
        let p = grid.point_of(i);

        // The generator promises no mines near the start; never offer
        // those squares for swapping.
        if (p.x - sx).abs() <= 1 && (p.y - sy).abs() <= 1 {
            continue;
        }

        // Target squares are what we swap *against*, not with.
        let in_target = if target.is_empty() {
            grid.at(i).is_unknown()
        } else {
            target.contains(p.x, p.y)
        };
        if in_target {
            continue;
        }

        let class = if !grid.at(i).is_unknown() {
            CandidateClass::KnownSquare
        } else {
            let near_known = (-1..=1).any(|dy| {
                (-1..=1).any(|dx| {
                    grid.contains(p.x + dx, p.y + dy)
                        && !grid.get(p.x + dx, p.y + dy).is_unknown()
                })
            });
            if near_known {
                CandidateClass::NearKnownSquare
            } else {
                CandidateClass::InUnknownRegion
            }
        };

        list.push(Candidate { class, x: p.x, y: p.y });
    }

    list.sort_by_key(|c| (c.class, c.y, c.x));
    for run in list.chunk_by_mut(|a, b| a.class == b.class) {
        run.shuffle(rng);
    }

    list
}

/// Pick `size` random non-mine squares inside the target set (or among all
/// unknown squares for an empty target); these become mines in the
/// partial-fill case.
fn build_fill_list(
    grid: &Grid<PlayerKnowledge>,
    mines: &Grid<bool>,
    target: &SquareSet,
    size: usize,
    rng: &mut SmallRng,
) -> Vec<usize> {
    debug_assert!(size != 0);
    let mut fill = Vec::new();

    if !target.is_empty() {
        for p in target.squares() {
            if !*mines.get(p.x, p.y) {
                fill.push(grid.idx(p.x, p.y));
            }
        }
    } else {
        for i in 0..grid.len() {
            if grid.at(i).is_unknown() && !*mines.at(i) {
                fill.push(i);
            }
        }
    }

    // The partial-fill case only arises when the outside ran out of mines
    // first, which leaves strictly more empties inside than requested.
    debug_assert!(fill.len() > size);
    fill.shuffle(rng);
    fill.truncate(size);
    fill
}

/// Apply the planned flips: update the mine grid, keep every revealed
/// number truthful, and reconcile changed squares that were themselves
/// known.
fn apply_changes(game: &mut Game, perturbations: &[Perturbation]) {
    let data = game.data_mut();

    for p in perturbations {
        // Clearing a square requires a mine there; adding one requires none.
        debug_assert_eq!(p.change == Change::Cleared, *data.mines.get(p.x, p.y));
        data.mines.set(p.x, p.y, p.change == Change::ChangedToMine);

        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (p.x + dx, p.y + dy);
                if !data.grid.contains(nx, ny) || data.grid.get(nx, ny).is_unknown() {
                    continue;
                }
                if dx == 0 && dy == 0 {
                    // The changed square itself was known. Something we try
                    // to avoid, but the last-resort candidate class makes
                    // it possible.
                    match p.change {
                        Change::ChangedToMine => {
                            data.grid.set(p.x, p.y, PlayerKnowledge::MarkedAsMine);
                        }
                        Change::Cleared => {
                            let n = adjacent_mines(&data.mines, p.x, p.y);
                            data.grid.set(p.x, p.y, PlayerKnowledge::Revealed(n));
                        }
                    }
                } else if let PlayerKnowledge::Revealed(n) = *data.grid.get(nx, ny) {
                    let adjusted = i32::from(n) + p.change.delta();
                    debug_assert!((0..=8).contains(&adjusted));
                    data.grid.set(nx, ny, PlayerKnowledge::Revealed(adjusted as u8));
                }
            }
        }
    }
}

/// The perturbation algorithm.
///
/// Counts mines and empties inside the target set, then walks the
/// preference-ordered candidate list looking for enough squares outside to
/// either drain the set of all its mines or fill it completely. If neither
/// is possible, settles for a partial fill: every available outside mine
/// moves into the set. Each flip outside the set is paired with an opposite
/// flip inside, so the total mine count never changes.
pub(crate) fn mine_perturb(
    game: &mut Game,
    target: SquareSet,
    rng: &mut SmallRng,
    allow_big_perturbs: bool,
) -> Vec<Perturbation> {
    if target.is_empty() && !allow_big_perturbs {
        return Vec::new();
    }

    let (nfull, nempty) = if !target.is_empty() {
        count_full_and_empty(&target, game.mines())
    } else {
        count_full_and_empty_unknown(game.grid(), game.mines())
    };

    let candidates = build_candidate_list(game, &target, rng);

    // Gather either `nfull` empty squares outside (to absorb the set's
    // mines) or `nempty` mines outside (to fill the set), whichever
    // completes first.
    let mut to_fill: Vec<Candidate> = Vec::new();
    let mut to_empty: Vec<Candidate> = Vec::new();
    for sq in &candidates {
        if *game.mines().get(sq.x, sq.y) {
            to_empty.push(*sq);
        } else {
            to_fill.push(*sq);
        }
        if to_fill.len() == nfull || to_empty.len() == nempty {
            break;
        }
    }

    let fill_list = if to_fill.len() != nfull && to_empty.len() != nempty {
        if to_empty.is_empty() {
            // No mine outside the set to trade with: nothing we can do.
            return Vec::new();
        }
        build_fill_list(game.grid(), game.mines(), &target, to_empty.len(), rng)
    } else {
        Vec::new()
    };

    // Decide the direction: drain the set if we found homes for all its
    // mines, otherwise move outside mines in (fully or partially).
    let (outside, change) = if to_fill.len() == nfull {
        (to_fill, Change::ChangedToMine)
    } else {
        (to_empty, Change::Cleared)
    };

    let mut ret: Vec<Perturbation> = outside
        .iter()
        .map(|sq| Perturbation { x: sq.x, y: sq.y, change })
        .collect();

    let inside_change = change.opposite();
    if !fill_list.is_empty() {
        debug_assert_eq!(inside_change, Change::ChangedToMine);
        for i in fill_list {
            let p = game.grid().point_of(i);
            ret.push(Perturbation { x: p.x, y: p.y, change: inside_change });
        }
    } else if !target.is_empty() {
        for p in target.squares() {
            let change_here = if *game.mines().get(p.x, p.y) {
                Change::Cleared
            } else {
                Change::ChangedToMine
            };
            if change_here == inside_change {
                ret.push(Perturbation { x: p.x, y: p.y, change: inside_change });
            }
        }
    } else {
        for i in 0..game.grid().len() {
            if !game.grid().at(i).is_unknown() {
                continue;
            }
            let p = game.grid().point_of(i);
            let change_here = if *game.mines().at(i) {
                Change::Cleared
            } else {
                Change::ChangedToMine
            };
            if change_here == inside_change {
                ret.push(Perturbation { x: p.x, y: p.y, change: inside_change });
            }
        }
    }

    // Every outside flip has exactly one inside counterpart.
    debug_assert_eq!(ret.len(), 2 * outside.len());
    debug_assert!(ret.iter().all(|p| {
        (p.x - game.params().sx).abs() > 1 || (p.y - game.params().sy).abs() > 1
    }));

    apply_changes(game, &ret);
    ret
}
