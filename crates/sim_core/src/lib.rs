//! # sim_core: Numerical Foundation for the Monte Carlo Risk Engine
//!
//! ## Layer 1 (Foundation) Role
//!
//! sim_core is the bottom layer of the workspace, providing:
//! - Seeded random number generation and batch sub-seed derivation (`rng`)
//! - The closed set of probability families with validation, sampling and
//!   quantile functions (`distributions`)
//! - Correlation resolution, estimation, PSD repair, Cholesky factorisation
//!   and copulas (`correlation`)
//! - Shared value types: the column-per-variable [`types::SampleMatrix`] and
//!   the error types (`types`)
//!
//! ## Determinism
//!
//! Nothing in this crate touches a process-wide generator. Every sampling
//! routine takes the generator as an argument, so identical
//! `(family, parameters, generator state)` inputs always produce identical
//! sequences.
//!
//! ## Usage Example
//!
//! ```rust
//! use sim_core::distributions::Distribution;
//! use sim_core::rng::SimRng;
//!
//! let dist = Distribution::Normal { mean: 100.0, std_dev: 15.0 };
//! dist.validate().unwrap();
//!
//! let mut rng = SimRng::from_seed(42);
//! let samples = dist.sample(1_000, &mut rng).unwrap();
//! assert_eq!(samples.len(), 1_000);
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod correlation;
pub mod distributions;
pub mod rng;
pub mod types;
