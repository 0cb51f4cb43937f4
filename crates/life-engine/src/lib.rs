//! Game of Life evolution engine.
//!
//! [`step`] holds the pure transition rule; [`driver`] advances a grid until
//! it settles, repeats, or exhausts its attempt budget, handing every
//! generation to a [`GenerationSink`].

pub mod grid;
pub mod step;
pub mod driver;
pub mod validation;
pub mod patterns;

pub use grid::{Fingerprint, Grid};
pub use step::{advance, next_state};
pub use driver::{Cycle, Discard, EvolutionDriver, Generation, GenerationSink, RunReport};
pub use validation::parse_state;
