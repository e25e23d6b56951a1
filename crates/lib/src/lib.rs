//! warpfox-lib: Core types and logic for warpfox
//!
//! This crate provides the resumable build pipeline behind the `warpfox` CLI:
//! - `Manifest`: the declarative description of the package being built
//! - `PipelineState`: persisted completion flags and resolved parameters
//! - `Pipeline`: the ordered Acquire → Extract → Bootstrap → Build stage runner
//! - adapters for fetching, unpacking and driving the external `mach` toolchain

pub mod config;
pub mod consts;
pub mod driver;
pub mod extract;
pub mod fetch;
pub mod manifest;
pub mod mozconfig;
pub mod orchestrator;
pub mod paths;
pub mod pipeline;
pub mod state;
pub mod util;
pub mod workdir_lock;
