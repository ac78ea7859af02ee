//! Command argument definitions shared between main.rs and the commands.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Model filename to look up
    pub identifier: String,

    /// Match the filename ignoring case
    #[arg(long)]
    pub case_insensitive: bool,

    /// Require this variant (e.g. dev, sd35)
    #[arg(long)]
    pub variant: Option<String>,

    /// Require this family (FLUX, SD3, SDXL, SD1)
    #[arg(long)]
    pub family: Option<String>,

    /// Require this priority (1-10)
    #[arg(long)]
    pub priority: Option<u8>,

    /// Require this recommended precision (default, fp8_e4m3fn, fp8_e4m3fn_fast, fp8_e5m2)
    #[arg(long)]
    pub precision: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Model id (flux-dev, comfyui/stable-diffusion-xl, ...) or filename
    pub model: String,

    /// Positive prompt
    #[arg(short, long)]
    pub prompt: String,

    /// Negative prompt
    #[arg(long)]
    pub negative_prompt: Option<String>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long)]
    pub steps: Option<u32>,

    /// Sampling seed (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub cfg: Option<f64>,

    #[arg(long)]
    pub sampler: Option<String>,

    #[arg(long)]
    pub scheduler: Option<String>,

    /// Source or reference image, as known to the server
    #[arg(long)]
    pub image: Option<String>,

    /// Denoising strength for image-to-image (0.0-1.0)
    #[arg(long)]
    pub strength: Option<f64>,

    /// JSON inventory listing to build against instead of the server
    #[arg(long)]
    pub inventory: Option<PathBuf>,

    /// Override a bound parameter after building (name=value, repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub overrides: Vec<String>,

    /// Write the graph to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include output node ids and parameter bindings
    #[arg(long)]
    pub bindings: bool,
}
