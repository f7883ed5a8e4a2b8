//! Minesweeper engine with a no-guessing guarantee.
//!
//! The crate revolves around three pieces:
//!
//! - [`Solver`]: a constraint propagator that deduces safe and mined
//!   squares from the revealed numbers, backed by a store of localized
//!   square-set constraints and a global deduction over the total mine
//!   count.
//! - [`Perturbator`]: when the solver is stuck mid-generation, it swaps
//!   mines around the blocking squares without invalidating anything
//!   already revealed.
//! - [`Generator`]: places mines at random, then drives solver and
//!   perturbator until it holds a board the solver finishes with zero
//!   perturbations — that board is solvable by deduction alone from the
//!   starting square, which is itself guaranteed mine-free together with
//!   its whole 3x3 neighborhood.
//!
//! [`Game`] wraps a generated board with the usual play operations
//! (open, chord, flag); the board is generated lazily on the first open so
//! the clicked square becomes the safe start.

pub mod game;
pub mod generator;
pub mod grid;
pub mod knowledge;
pub mod perturbator;
pub mod solver;

pub use game::{Game, GameData, GameParams, ParamsError};
pub use generator::Generator;
pub use grid::{Grid, Point};
pub use knowledge::PlayerKnowledge;
pub use perturbator::{Change, Perturbation, Perturbator};
pub use solver::{SetStore, Solver, SquareSet};
