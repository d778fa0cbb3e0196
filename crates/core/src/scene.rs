//! Script-to-scene segmentation.
//!
//! A script is split into non-blank lines, its spoken duration is
//! estimated from the word count, and the lines are grouped into as many
//! contiguous scenes as the requested clip density calls for.

use serde::Serialize;

/// Fixed narration rate used to estimate spoken duration.
pub const WORDS_PER_MINUTE: f64 = 150.0;

/// One segment of the input script, rendered as exactly one engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scene {
    /// Lines of the segment joined by single spaces. May be empty.
    pub text: String,
    /// 0-based position among the scenes of the same job.
    pub index: usize,
    /// Number of scenes produced for the job.
    pub total: usize,
}

/// Estimated narration length of `script` in minutes.
pub fn estimate_duration_minutes(script: &str) -> f64 {
    let words = script.split_whitespace().count();
    words as f64 / WORDS_PER_MINUTE
}

/// Number of scenes a script of `duration_minutes` should produce.
///
/// Always at least 1.
pub fn target_scene_count(duration_minutes: f64, clips_per_minute: u32) -> usize {
    let raw = (duration_minutes * f64::from(clips_per_minute)).floor();
    if raw < 1.0 {
        1
    } else {
        raw as usize
    }
}

/// Split `script` into an ordered list of scenes.
///
/// Lines are grouped into chunks of `max(1, lines / target)` and the
/// resulting list is truncated to the target scene count, so trailing
/// lines beyond the last kept chunk are not rendered. A blank script
/// yields a single scene with empty text.
pub fn segment(script: &str, clips_per_minute: u32) -> Vec<Scene> {
    let lines: Vec<&str> = script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        return vec![Scene {
            text: String::new(),
            index: 0,
            total: 1,
        }];
    }

    let target = target_scene_count(estimate_duration_minutes(script), clips_per_minute);
    let lines_per_scene = (lines.len() / target).max(1);

    let texts: Vec<String> = lines
        .chunks(lines_per_scene)
        .take(target)
        .map(|chunk| chunk.join(" "))
        .collect();

    let total = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Scene { text, index, total })
        .collect()
}
