//! Bounded revised-simplex tableau engine.
//!
//! This crate is the numerical core of a verification solver for networks
//! with piecewise-linear activations. It maintains a system of linear
//! equalities `A * x = b` together with per-variable bounds, and drives it
//! through bounded-simplex pivot steps that move infeasible basic variables
//! toward feasibility. The outer search loop (case splitting over activation
//! phases) repeatedly invokes, snapshots and restores it.
//!
//! ## Architecture
//!
//! - [`tableau::Tableau`]: state vectors, assignment and cost engines, the
//!   pivot machinery, dynamic growth and snapshot/restore.
//! - [`factorization::BasisFactorization`]: the abstract basis carrier
//!   (FTRAN/BTRAN solves, eta updates); [`factorization::EtaFactorization`]
//!   is the provided dense implementation.
//! - [`watcher::VariableWatcher`]: observer protocol for value and bound
//!   changes, consumed by the outer solver's constraint objects.
//!
//! Entry selection is deliberately external: the engine exposes the set of
//! eligible entering variables and accepts a choice, so pricing strategies
//! live outside this crate.
//!
//! ## References
//!
//! - Katz et al.: "Reluplex: An Efficient SMT Solver for Verifying Deep
//!   Neural Networks" (CAV 2017)
//! - Chvátal: "Linear Programming" (1983), bounded-variable simplex

pub mod config;
pub mod equation;
pub mod error;
pub mod factorization;
pub mod float;
pub mod row;
pub mod state;
pub mod stats;
pub mod tableau;
pub mod watcher;

pub use config::TableauConfig;
pub use equation::{Addend, Equation};
pub use error::TableauError;
pub use factorization::{BasisFactorization, EtaFactorization};
pub use row::{RowEntry, TableauRow};
pub use state::TableauState;
pub use stats::TableauStats;
pub use tableau::{BasicStatus, Tableau};
pub use watcher::{TableauAccess, VariableWatcher};

/// Variable identifier (shared across the engine).
pub type VarId = usize;
