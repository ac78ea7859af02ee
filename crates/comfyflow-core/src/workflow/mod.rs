//! Workflow graph construction for comfyflow.
//!
//! This module turns a resolved model into a literal ComfyUI graph:
//! the graph arena and its wire format, generation parameters and their
//! per-model defaults, source image sizing, the builders for each pipeline,
//! and the router that picks one of them.

pub mod builders;
pub mod built;
pub mod graph;
pub mod params;
pub mod prompt;
pub mod resize;
pub mod router;

pub use builders::{BuildContext, BuilderFn, DEFAULT_FILENAME_PREFIX, FluxComponents};
pub use built::{BuiltWorkflow, InputTarget, ParamName, ParameterBindings};
pub use graph::{GraphError, Input, Link, Node, NodeId, NodeMeta, WorkflowGraph};
pub use params::{GenerationParams, ModelDefaults, SamplingParams};
pub use prompt::{SplitPrompt, is_style_adjective, normalize_style_term, split_prompt};
pub use resize::{SizeLimits, TargetDimensions, target_dimensions};
pub use router::{Route, WorkflowRouter};
