//! Core co-location building blocks: run parameters, the acquisition
//! compatibility policy, footprint geometry, per-pair evaluation and merging,
//! and the orchestrator that drives them over candidate sets.
pub mod engine;
pub mod geometry;
pub mod merge;
pub mod orchestrator;
pub mod params;
pub mod policy;
