//! relcast CI - build matrix and release pipeline
//!
//! Provides:
//! - Builtin and file-configured build targets
//! - A command runner with timeouts for toolchain and pack steps
//! - The parallel build matrix with fail-fast-on-join semantics
//! - The end-to-end `ReleasePipeline`

pub mod matrix;
pub mod pipeline;
pub mod runner;
pub mod target;

// Re-export key types
pub use matrix::{build_with_toolchain, builder_fn, run_all, toolchain_builder, BuilderFn};
pub use pipeline::{PipelineReport, ReleasePipeline};
pub use runner::{CommandResult, CommandRunner, RunnerError};
pub use target::{default_pack_command, default_targets, load_targets, BuiltinTarget};
