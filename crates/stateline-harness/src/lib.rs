//! Property-testing substrate for Stateline.
//!
//! Provides the three primitives the engine is built on: a splittable
//! [`Seed`] so every generation step is reproducible from a single `u64`,
//! a lazy rose [`Tree`] carrying a value together with its shrinks, and a
//! generator monad [`Gen`] producing such trees. [`quick_check`] runs a
//! [`Property`] over ramping sizes and descends the shrink tree greedily
//! on failure.

pub mod gen;
pub mod property;
pub mod seed;
pub mod tree;

pub use gen::Gen;
pub use property::{for_all, quick_check, CheckOutcome, Config, Failure, Property, TestResult};
pub use seed::{Seed, Size};
pub use tree::Tree;
