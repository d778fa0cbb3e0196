//! Default text-to-video workflow for a single scene.
//!
//! Produces a fixed seven-node graph: checkpoint loader, positive and
//! negative prompt encoders, an empty latent batch holding one latent per
//! frame, a sampler, a VAE decoder, and an animated WEBP save node. Callers
//! that need a different topology submit their own [`ProcessingGraph`]
//! instead.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::graph::{GraphNode, ProcessingGraph};
use crate::naming::scene_filename_prefix;
use crate::resolution::parse_resolution;
use crate::scene::Scene;

// ---------------------------------------------------------------------------
// Model and sampler settings
// ---------------------------------------------------------------------------

/// Checkpoint loaded by every generated workflow.
pub const DEFAULT_CHECKPOINT: &str = "SDXL/sd_xl_base_1.0_0.9vae.safetensors";

/// Negative prompt applied to every scene.
pub const NEGATIVE_PROMPT: &str = "blurry, low quality, distorted, ugly";

pub const SAMPLER_STEPS: u32 = 20;
pub const SAMPLER_CFG: f64 = 7.0;
pub const SAMPLER_NAME: &str = "euler";
pub const SCHEDULER: &str = "normal";
pub const DENOISE: f64 = 1.0;

/// Per-scene seed spacing; scene `i` samples with seed `i * SEED_STRIDE`.
pub const SEED_STRIDE: u64 = 1000;

/// WEBP quality of the saved animation.
pub const OUTPUT_QUALITY: u32 = 80;

// ---------------------------------------------------------------------------
// Node ids
// ---------------------------------------------------------------------------

const NODE_CHECKPOINT: &str = "1";
const NODE_POSITIVE: &str = "2";
const NODE_NEGATIVE: &str = "3";
const NODE_LATENT: &str = "4";
const NODE_SAMPLER: &str = "5";
const NODE_DECODE: &str = "6";
/// Id of the save node in generated workflows.
pub const NODE_SAVE: &str = "7";

// Checkpoint loader output slots.
const SLOT_MODEL: u32 = 0;
const SLOT_CLIP: u32 = 1;
const SLOT_VAE: u32 = 2;

/// Deterministic sampler seed for a scene.
pub fn scene_seed(index: usize) -> u64 {
    index as u64 * SEED_STRIDE
}

/// Number of frames rendered for a clip of `duration_secs` at `fps`.
pub fn frame_count(fps: u32, duration_secs: f64) -> u32 {
    (f64::from(fps) * duration_secs).round().max(0.0) as u32
}

/// Positive prompt text for a scene.
pub fn scene_prompt(style: &str, scene: &Scene) -> String {
    format!("{style} video scene: {}", scene.text)
}

/// Build the default workflow for `scene`.
///
/// Fails with [`CoreError::InvalidFormat`] when `resolution` is not
/// `<width>x<height>` or when `fps * duration_secs` rounds to zero frames.
pub fn build_scene_workflow(
    scene: &Scene,
    style: &str,
    resolution: &str,
    fps: u32,
    duration_secs: f64,
) -> Result<ProcessingGraph, CoreError> {
    let size = parse_resolution(resolution)?;
    let frames = frame_count(fps, duration_secs);
    if frames == 0 {
        return Err(CoreError::InvalidFormat(format!(
            "{fps} fps for {duration_secs}s yields no frames"
        )));
    }

    let mut nodes = BTreeMap::new();

    nodes.insert(
        NODE_CHECKPOINT.to_string(),
        GraphNode::new("CheckpointLoaderSimple").with_input("ckpt_name", DEFAULT_CHECKPOINT),
    );
    nodes.insert(
        NODE_POSITIVE.to_string(),
        GraphNode::new("CLIPTextEncode")
            .with_input("text", scene_prompt(style, scene))
            .with_link("clip", NODE_CHECKPOINT, SLOT_CLIP),
    );
    nodes.insert(
        NODE_NEGATIVE.to_string(),
        GraphNode::new("CLIPTextEncode")
            .with_input("text", NEGATIVE_PROMPT)
            .with_link("clip", NODE_CHECKPOINT, SLOT_CLIP),
    );
    nodes.insert(
        NODE_LATENT.to_string(),
        GraphNode::new("EmptyLatentImage")
            .with_input("width", size.width)
            .with_input("height", size.height)
            .with_input("batch_size", frames),
    );
    nodes.insert(
        NODE_SAMPLER.to_string(),
        GraphNode::new("KSampler")
            .with_input("seed", scene_seed(scene.index))
            .with_input("steps", SAMPLER_STEPS)
            .with_input("cfg", SAMPLER_CFG)
            .with_input("sampler_name", SAMPLER_NAME)
            .with_input("scheduler", SCHEDULER)
            .with_input("denoise", DENOISE)
            .with_link("model", NODE_CHECKPOINT, SLOT_MODEL)
            .with_link("positive", NODE_POSITIVE, 0)
            .with_link("negative", NODE_NEGATIVE, 0)
            .with_link("latent_image", NODE_LATENT, 0),
    );
    nodes.insert(
        NODE_DECODE.to_string(),
        GraphNode::new("VAEDecode")
            .with_link("samples", NODE_SAMPLER, 0)
            .with_link("vae", NODE_CHECKPOINT, SLOT_VAE),
    );
    nodes.insert(
        NODE_SAVE.to_string(),
        GraphNode::new("SaveAnimatedWEBP")
            .with_input("filename_prefix", scene_filename_prefix(scene.index))
            .with_input("fps", fps)
            .with_input("lossless", false)
            .with_input("quality", OUTPUT_QUALITY)
            .with_input("method", "default")
            .with_link("images", NODE_DECODE, 0),
    );

    ProcessingGraph::new(nodes)
}
