//! Test fixtures for Stepwise development.
//!
//! Provides a one-resource content pack, a [`FixtureState`] implementing
//! [`SimulationState`](stepwise_engine::SimulationState), the handlers and
//! system that act on it, and [`build_runtime`] to wire them together.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    build_runtime, collect, default_runtime, fixture_content, forage, purchase, CollectHandler,
    FixtureState, ForageHandler, GeneratorState, ProductionSystem, PurchaseHandler, ResourceState,
    FIXTURE_DIGEST_HASH, GOLD, MINE,
};
