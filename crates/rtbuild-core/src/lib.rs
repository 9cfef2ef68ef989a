//! Cross-compilation build driver library for managed runtime toolchains.
//!
//! This crate turns a target selection plus a set of installed SDK/NDK/
//! toolchain locations into concrete external build-system invocations
//! (`configure`, `make`, `cmake`, MSBuild). The heart of it is per-platform
//! environment resolution: a deterministic mapping from
//! `(options, product, target)` to tool paths and flag lists, rendered into
//! the exact command-line syntax the downstream build system expects.
//!
//! ## Layout
//!
//! - [`options`] - immutable option records built once from CLI input
//! - [`env`] - the resolved environment type and its rendering
//! - [`step`] - external command invocations and their executor
//! - [`runtime`] - the shared runtime build template
//! - [`android`], [`desktop`], [`ios`], [`wasm`] - platform drivers
//! - [`bcl`], [`llvm`], [`refassemblies`] - auxiliary component drivers
//! - [`orchestrator`] - target expansion and the sequential run loop
//!
//! Execution is single-threaded and synchronous; parallelism is delegated
//! to the underlying `make` through the job count option.

pub mod android;
pub mod bcl;
pub mod desktop;
pub mod env;
pub mod error;
pub mod fsutil;
pub mod ios;
pub mod llvm;
pub mod msbuild;
pub mod options;
pub mod orchestrator;
pub mod refassemblies;
pub mod runtime;
pub mod step;
pub mod wasm;

pub use env::{ResolvedEnvironment, Tool, ToolCommand};
pub use error::{BuildError, Result};
pub use options::{
    AndroidOpts, BaseOpts, BclOpts, Configuration, DesktopOpts, IosOpts, RuntimeOpts,
};
pub use step::BuildStep;
