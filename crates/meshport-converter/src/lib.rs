//! # Meshport Converter
//!
//! Turns uploaded STEP solids into web-ready meshes.
//!
//! A [`ConversionPipeline`] runs one job at a time through a configured
//! chain of [`ConversionStage`]s inside a private scratch [`Workspace`]:
//!
//! - `step_to_stl` / `step_to_obj` tessellate with a FreeCAD command-line
//!   process driven by a generated script.
//! - `obj_to_glb` re-encodes OBJ+MTL as binary glTF in-process.

pub mod chain;
pub mod error;
pub mod executor;
pub mod glb;
pub mod material;
pub mod metrics;
pub mod obj;
pub mod pipeline;
pub mod scripting;
pub mod stages;
pub mod workspace;

pub use chain::ChainRegistry;
pub use error::ConversionError;
pub use executor::{ToolExecutor, ToolOutput};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::{ConversionPipeline, PipelineSettings};
pub use stages::{ConversionStage, StageIo, StageRegistry};
pub use workspace::Workspace;
