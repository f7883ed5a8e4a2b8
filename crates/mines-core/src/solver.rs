//! The deduction engine.
//!
//! The solver starts from whatever the grid already shows (for generation,
//! just the starting square) and works a queue of newly-known squares
//! against a store of localized set constraints. When local reasoning runs
//! dry it falls back to a global deduction over the total mine count, and
//! when that fails too it can ask a perturbator to rewrite the board under
//! it and keep going.

mod set_store;
mod square_set;

pub use set_store::{SetStore, SetStoreElement};
pub use square_set::SquareSet;

use std::collections::VecDeque;

use crate::game::Game;
use crate::knowledge::PlayerKnowledge;
use crate::perturbator::{Change, Perturbator};
use crate::solver::square_set::bit;

/// The global deduction enumerates disjoint unions of stored sets, which is
/// exponential in the store size; beyond this many sets it is skipped.
const GLOBAL_DEDUCTION_CAP: usize = 10;

/// Queue of grid indices whose squares just became known.
type SquareTodo = VecDeque<usize>;

/// A constraint solver over a [`Game`].
///
/// [`solve`](Self::solve) mutates the game's knowledge grid; with a
/// perturbator attached it may also rewrite the mine grid.
pub struct Solver<'p, 'r> {
    perturbator: Option<&'p mut Perturbator<'r>>,
}

impl Default for Solver<'_, '_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p, 'r> Solver<'p, 'r> {
    /// A solver that only deduces; it stops when stuck.
    pub fn new() -> Self {
        Self { perturbator: None }
    }

    /// A solver that may rewrite the board through `perturbator` when
    /// deduction alone cannot finish.
    pub fn with_perturbator(perturbator: &'p mut Perturbator<'r>) -> Self {
        Self { perturbator: Some(perturbator) }
    }

    /// Deduce as much as possible. Returns true iff every square ended up
    /// known (revealed or marked as a mine).
    pub fn solve(&mut self, game: &mut Game) -> bool {
        let n = game.mines().iter().filter(|&&m| m).count() as i32;

        let mut square_todo: SquareTodo = (0..game.grid().len())
            .filter(|&i| !game.grid().at(i).is_unknown())
            .collect();
        let mut ss = SetStore::new();

        loop {
            process_newly_known_squares(game, &mut square_todo, &mut ss);

            if let Some(elem) = ss.next_todo() {
                process_set(game, &elem, &mut square_todo, &mut ss);
                continue;
            }

            let squares_left = game.grid().iter().filter(|k| k.is_unknown()).count() as i32;
            let mines_left = n - game.grid().iter().filter(|k| k.is_marked()).count() as i32;

            if squares_left == 0 {
                debug_assert_eq!(mines_left, 0);
                break;
            }

            if attempt_global_deduction(game, squares_left, mines_left, &mut square_todo, &ss) {
                continue;
            }

            // Deduction is exhausted. With a perturbator we can rewrite the
            // board and keep solving; without one this is the end.
            match self.perturbator.as_deref_mut() {
                Some(perturbator) => {
                    if !apply_perturbations(game, perturbator, &mut square_todo, &mut ss) {
                        break;
                    }
                }
                None => break,
            }
        }

        game.grid().iter().all(|k| !k.is_unknown())
    }
}

/// Mark every unknown square of `set` as known: flagged when `mine`, else
/// revealed with its true count. Newly-known squares are queued.
fn mark_known_squares(game: &mut Game, square_todo: &mut SquareTodo, set: SquareSet, mine: bool) {
    for p in set.squares() {
        // A square can already be known if an earlier deduction in the same
        // batch covered it; it is not marked twice.
        if !game.grid().get(p.x, p.y).is_unknown() {
            continue;
        }

        if mine {
            game.data_mut().grid.set(p.x, p.y, PlayerKnowledge::MarkedAsMine);
        } else {
            let count = game.mine_lookup(p.x, p.y);
            debug_assert!(count.is_some(), "deduced a mine square as safe at {p:?}");
            let Some(count) = count else { continue };
            game.data_mut().grid.set(p.x, p.y, PlayerKnowledge::Revealed(count));
        }

        let idx = game.grid().idx(p.x, p.y);
        square_todo.push_back(idx);
    }
}

fn mark_known_square(game: &mut Game, square_todo: &mut SquareTodo, x: i32, y: i32, mine: bool) {
    mark_known_squares(game, square_todo, SquareSet::single(x, y), mine);
}

/// Drain the newly-known-square queue: derive the local constraint of each
/// freshly revealed square, and strip each known square out of every stored
/// set that contains it.
fn process_newly_known_squares(game: &mut Game, square_todo: &mut SquareTodo, ss: &mut SetStore) {
    while let Some(i) = square_todo.pop_front() {
        let p = game.grid().point_of(i);
        let knowledge = *game.grid().at(i);

        if let PlayerKnowledge::Revealed(count) = knowledge {
            // Constraint over the unknown part of the 8-neighborhood:
            // flagged neighbors already account for part of the count.
            let mut mines = i32::from(count);
            let mut mask = 0u16;

            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (p.x + dx, p.y + dy);
                    if !game.grid().contains(nx, ny) {
                        continue;
                    }
                    match game.grid().get(nx, ny) {
                        PlayerKnowledge::MarkedAsMine => mines -= 1,
                        PlayerKnowledge::Unknown => mask |= bit(dx + 1, dy + 1),
                        PlayerKnowledge::Revealed(_) => {}
                    }
                }
            }

            if mask != 0 {
                ss.add(p.x - 1, p.y - 1, mask, mines);
            }
        }

        // Every stored set containing this square loses it; the remainder
        // (if any) is re-filed, which also re-queues it.
        for key in ss.overlap(p.x, p.y, bit(0, 0)) {
            let Some(elem) = ss.find(key) else { continue };
            let elem = *elem;

            let new_set = elem.set.difference(&SquareSet::single(p.x, p.y));
            let new_mines = elem.mines - i32::from(knowledge.is_marked());

            ss.erase(&key);
            if !new_set.is_empty() {
                ss.add(new_set.x, new_set.y, new_set.mask, new_mines);
            }
        }
    }
}

/// Draw conclusions from one constraint: the trivial all-clear/all-mine
/// rule, then pairwise wing and subset rules against every overlapping set.
fn process_set(
    game: &mut Game,
    elem: &SetStoreElement,
    square_todo: &mut SquareTodo,
    ss: &mut SetStore,
) {
    let s = elem.set;

    if elem.mines == 0 || elem.mines == s.count() as i32 {
        // Every square in the set is determined. The set itself stays in
        // the store; it dissolves as its squares are processed.
        mark_known_squares(game, square_todo, s, elem.mines != 0);
        return;
    }

    for key in ss.overlap(s.x, s.y, s.mask) {
        let Some(other) = ss.find(key) else { continue };
        let other = *other;
        let s2 = other.set;

        let wing = s.difference(&s2);
        let wing2 = s2.difference(&s);
        let wc = wing.count() as i32;
        let wc2 = wing2.count() as i32;

        // If one set's surplus of mines over the other equals the size of
        // its wing, the wing is all mines and the other wing all clear.
        if wc == elem.mines - other.mines || wc2 == other.mines - elem.mines {
            mark_known_squares(game, square_todo, wing, wc == elem.mines - other.mines);
            mark_known_squares(game, square_todo, wing2, wc2 == other.mines - elem.mines);
            continue;
        }

        // Otherwise a containment still splits the larger set's count
        // between the smaller set and its complement.
        if wc == 0 && wc2 != 0 {
            debug_assert!(other.mines > elem.mines);
            ss.add(wing2.x, wing2.y, wing2.mask, other.mines - elem.mines);
        } else if wc2 == 0 && wc != 0 {
            debug_assert!(elem.mines > other.mines);
            ss.add(wing.x, wing.y, wing.mask, elem.mines - other.mines);
        }
    }
}

/// Deductions from the total mine count.
///
/// The cheap case marks every unknown square when no mines (or only mines)
/// remain. Otherwise the stored sets are searched for a disjoint union such
/// that the unknown squares outside it must be all clear or all mines.
fn attempt_global_deduction(
    game: &mut Game,
    squares_left: i32,
    mines_left: i32,
    square_todo: &mut SquareTodo,
    ss: &SetStore,
) -> bool {
    if mines_left == 0 || mines_left == squares_left {
        let mine = mines_left != 0;
        for i in 0..game.grid().len() {
            if game.grid().at(i).is_unknown() {
                let p = game.grid().point_of(i);
                mark_known_square(game, square_todo, p.x, p.y, mine);
            }
        }
        return true;
    }

    let sets: Vec<SetStoreElement> = ss.iter().copied().collect();
    if sets.len() > GLOBAL_DEDUCTION_CAP {
        return false;
    }

    let mut used = vec![false; sets.len()];
    if !find_deciding_union(&sets, 0, &mut used, mines_left, squares_left) {
        return false;
    }

    // The union's mine count is exact, so the leftover mines spread over
    // the squares outside it; the search guaranteed that leftover is
    // all-or-nothing.
    let union_mines: i32 = sets
        .iter()
        .zip(&used)
        .filter(|(_, &u)| u)
        .map(|(s, _)| s.mines)
        .sum();
    let mine = mines_left - union_mines != 0;

    for i in 0..game.grid().len() {
        if !game.grid().at(i).is_unknown() {
            continue;
        }
        let p = game.grid().point_of(i);
        let inside = sets
            .iter()
            .zip(&used)
            .any(|(s, &u)| u && s.set.contains(p.x, p.y));
        if !inside {
            mark_known_square(game, square_todo, p.x, p.y, mine);
        }
    }

    true
}

/// Backtracking search for a disjoint union of sets whose complement is
/// decided: with the union's mines subtracted, the squares outside it hold
/// either no mines or nothing but mines.
fn find_deciding_union(
    sets: &[SetStoreElement],
    idx: usize,
    used: &mut [bool],
    mines_left: i32,
    squares_left: i32,
) -> bool {
    if idx == sets.len() {
        return squares_left > 0 && (mines_left == 0 || mines_left == squares_left);
    }

    let disjoint = sets[..idx]
        .iter()
        .zip(used.iter())
        .all(|(s, &u)| !u || s.set.intersection(&sets[idx].set).is_empty());

    if disjoint {
        used[idx] = true;
        if find_deciding_union(
            sets,
            idx + 1,
            used,
            mines_left - sets[idx].mines,
            squares_left - sets[idx].set.count() as i32,
        ) {
            return true;
        }
        used[idx] = false;
    }

    find_deciding_union(sets, idx + 1, used, mines_left, squares_left)
}

/// Let the perturbator rewrite the board, then fold the changes back into
/// the solver state: re-queue squares that switched from mine to clear, and
/// patch the mine count of every stored set a change touched.
fn apply_perturbations(
    game: &mut Game,
    perturbator: &mut Perturbator<'_>,
    square_todo: &mut SquareTodo,
    ss: &mut SetStore,
) -> bool {
    let perturbations = perturbator.perturb(game, ss);
    if perturbations.is_empty() {
        return false;
    }

    for p in &perturbations {
        if p.change == Change::Cleared && !game.grid().get(p.x, p.y).is_unknown() {
            // A known mine became a known clear square; its neighborhood
            // constraint must be recomputed.
            let idx = game.grid().idx(p.x, p.y);
            square_todo.push_back(idx);
        }

        for key in ss.overlap(p.x, p.y, bit(0, 0)) {
            ss.adjust_mines(&key, p.change.delta());
            ss.add_todo(&key);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{adjacent_mines, GameData, GameParams};
    use crate::grid::Grid;

    /// A game with the given mines; every square outside `unknown` is
    /// pre-revealed with its true count.
    fn partially_revealed(
        width: i32,
        height: i32,
        mines: &[(i32, i32)],
        unknown: &[(i32, i32)],
        start: (i32, i32),
    ) -> Game {
        let mut mine_grid = Grid::new(width, height, false);
        for &(x, y) in mines {
            mine_grid.set(x, y, true);
        }

        let mut grid = Grid::new(width, height, PlayerKnowledge::Unknown);
        for y in 0..height {
            for x in 0..width {
                if unknown.contains(&(x, y)) {
                    continue;
                }
                let n = adjacent_mines(&mine_grid, x, y);
                debug_assert!(!*mine_grid.get(x, y));
                grid.set(x, y, PlayerKnowledge::Revealed(n));
            }
        }

        let mut params = GameParams::new(width, height, mines.len() as i32);
        params.sx = start.0;
        params.sy = start.1;
        Game::from_data(GameData {
            params,
            seed: 0,
            mines: mine_grid,
            grid,
            dead: false,
            won: false,
            hit: None,
        })
    }

    fn assert_sound(game: &Game) {
        for i in 0..game.grid().len() {
            let p = game.grid().point_of(i);
            match *game.grid().at(i) {
                PlayerKnowledge::MarkedAsMine => assert!(*game.mines().at(i), "at {p:?}"),
                PlayerKnowledge::Revealed(n) => {
                    assert!(!*game.mines().at(i), "at {p:?}");
                    assert_eq!(n, adjacent_mines(game.mines(), p.x, p.y), "at {p:?}");
                }
                PlayerKnowledge::Unknown => panic!("unsolved square at {p:?}"),
            }
        }
    }

    #[test]
    fn trivial_rule_resolves_saturated_sets() {
        // One unknown neighbor, count 1: must be the mine.
        let game = &mut partially_revealed(3, 3, &[(2, 2)], &[(2, 2)], (0, 0));
        assert!(Solver::new().solve(game));
        assert!(game.grid().get(2, 2).is_marked());
    }

    #[test]
    fn subset_rule_clears_the_difference() {
        // The 1 at (2,2) gives {(1,2),(3,2),(2,3)} = 1, the 1 at (3,3)
        // gives its subset {(3,2),(2,3)} = 1. The subset absorbs the whole
        // count, so the difference square (1,2) is clear; the follow-up
        // deductions then pin the mine.
        let mut mine_grid = Grid::new(5, 5, false);
        mine_grid.set(3, 2, true);
        let mut grid = Grid::new(5, 5, PlayerKnowledge::Unknown);
        grid.set(2, 2, PlayerKnowledge::Revealed(1));
        grid.set(3, 3, PlayerKnowledge::Revealed(1));
        let mut params = GameParams::new(5, 5, 1);
        params.sx = 0;
        params.sy = 0;
        let game = &mut Game::from_data(GameData {
            params,
            seed: 0,
            mines: mine_grid,
            grid,
            dead: false,
            won: false,
            hit: None,
        });

        let mut ss = SetStore::new();
        let mut square_todo = SquareTodo::new();
        ss.add(1, 1, bit(0, 1) | bit(2, 1) | bit(1, 2), 1);
        ss.add(2, 2, bit(1, 0) | bit(0, 1), 1);

        while let Some(elem) = ss.next_todo() {
            process_set(game, &elem, &mut square_todo, &mut ss);
            process_newly_known_squares(game, &mut square_todo, &mut ss);
        }

        assert_eq!(game.grid().get(1, 2).revealed_count(), Some(0));
        assert!(game.grid().get(3, 2).is_marked());
    }

    #[test]
    fn wing_rule_splits_overlapping_sets() {
        // {(0,1),(1,1)} = 1 against {(0,1),(1,1),(2,1)} = 2: the wing
        // {(2,1)} carries exactly the surplus mine, which unravels the
        // whole bottom row.
        let game = &mut partially_revealed(
            3,
            2,
            &[(0, 1), (2, 1)],
            &[(0, 1), (1, 1), (2, 1)],
            (0, 0),
        );
        assert!(Solver::new().solve(game));
        assert_sound(game);
    }

    #[test]
    fn solver_without_perturbator_reports_stuck_boards() {
        // Counts 1,1,1,1,1 over a fully covered bottom row: mines at
        // (0,1)+(3,1) and at (1,1)+(4,1) both fit, so no deduction can
        // finish the board.
        let game = &mut partially_revealed(
            5,
            2,
            &[(0, 1), (3, 1)],
            &[(0, 1), (1, 1), (2, 1), (3, 1), (4, 1)],
            (0, 0),
        );
        assert!(!Solver::new().solve(game));
        assert!(game.grid().iter().any(|k| k.is_unknown()));
    }

    #[test]
    fn cornered_mines_are_all_flagged() {
        // All four corners hold mines and everything else is revealed; the
        // solver must flag exactly the corners.
        let corners = [(0, 0), (4, 0), (0, 4), (4, 4)];
        let game = &mut partially_revealed(5, 5, &corners, &corners, (2, 2));
        assert!(Solver::new().solve(game));
        for (x, y) in corners {
            assert!(game.grid().get(x, y).is_marked());
        }
    }

    #[test]
    fn empty_mine_budget_clears_everything() {
        // No mines at all and nothing revealed: the global rule alone
        // clears the whole board.
        let all: Vec<(i32, i32)> = (0..4).flat_map(|y| (0..4).map(move |x| (x, y))).collect();
        let game = &mut partially_revealed(4, 4, &[], &all, (0, 0));
        assert!(Solver::new().solve(game));
        assert_sound(game);
    }

    #[test]
    fn perturbator_rescues_a_stuck_board() {
        use rand::{rngs::SmallRng, SeedableRng};

        // Same shape of ambiguity as above, moved one row away from the
        // start: counts 1,1,1,1,1 over the covered bottom row. With a
        // perturbator the solver may rewrite the mines and must finish,
        // keeping every revealed number truthful and the mine total fixed.
        let game = &mut partially_revealed(
            5,
            3,
            &[(0, 2), (3, 2)],
            &[(0, 2), (1, 2), (2, 2), (3, 2), (4, 2)],
            (2, 0),
        );
        let total = game.mines().iter().filter(|&&m| m).count();

        let mut rng = SmallRng::seed_from_u64(7);
        let mut perturbator = Perturbator::new(&mut rng);
        perturbator.reset(1);

        assert!(Solver::with_perturbator(&mut perturbator).solve(game));
        assert!(perturbator.use_count() > 0);
        assert_eq!(game.mines().iter().filter(|&&m| m).count(), total);
        assert_sound(game);

        // The starting 3x3 stays mine-free through every rewrite.
        for dy in -1..=1 {
            for dx in -1..=1 {
                if game.mines().contains(2 + dx, dy) {
                    assert!(!*game.mines().get(2 + dx, dy));
                }
            }
        }
    }

    #[test]
    fn deciding_union_search_accounts_for_set_mines() {
        let mut ss = SetStore::new();
        ss.add(0, 0, 0b11, 1); // two squares, one mine
        let sets: Vec<SetStoreElement> = ss.iter().copied().collect();

        // Four unknown squares, one mine total: the union {A,B} absorbs the
        // budget, so the two outside squares are decided (all clear).
        let mut used = vec![false; sets.len()];
        assert!(find_deciding_union(&sets, 0, &mut used, 1, 4));
        assert!(used[0]);

        // Two mines total: neither including nor excluding the set decides
        // the outside squares.
        let mut used = vec![false; sets.len()];
        assert!(!find_deciding_union(&sets, 0, &mut used, 2, 4));
    }
}
