#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Variational coordinate-ascent updates for linear regression with a
//! mixture-of-normals ("multiple slab") spike-and-slab prior on the effects.
//!
//! The crate is the inner kernel of a fitting procedure. An outer driver owns the
//! hyperparameters, decides which variables to revisit, and checks convergence; it
//! calls [`CoordinateAscent::sweep`] once per outer iteration.

pub mod component;
pub mod matrix;
pub mod prior;
pub mod schedule;
pub mod settings;
pub mod state;
pub mod stats;
pub mod update;

pub use matrix::{DesignColumns, MatrixError};
pub use prior::{MixturePrior, PriorError};
pub use schedule::{Schedule, ScheduleError};
pub use settings::{SettingsError, UpdateSettings};
pub use state::PosteriorState;
pub use stats::SufficientStatistics;
pub use update::{CoordinateAscent, SweepSummary, UpdateError, update, update_with_log_weights};
