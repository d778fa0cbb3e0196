//! Output filename prefixes.
//!
//! The engine names saved artifacts `<prefix>_<counter>_.<ext>`; the prefix
//! is all this service controls, and it is also what the disk fallback
//! scans for.

/// Prefix used when a caller-supplied workflow declares none.
pub const DEFAULT_FALLBACK_PREFIX: &str = "motion_api_fast_broll";

/// Filename prefix for the clip rendered from scene `index`.
///
/// ```
/// use motion_core::naming::scene_filename_prefix;
///
/// assert_eq!(scene_filename_prefix(0), "motion_scene_000");
/// assert_eq!(scene_filename_prefix(42), "motion_scene_042");
/// assert_eq!(scene_filename_prefix(1234), "motion_scene_1234");
/// ```
pub fn scene_filename_prefix(index: usize) -> String {
    format!("motion_scene_{index:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_three_digits() {
        assert_eq!(scene_filename_prefix(7), "motion_scene_007");
    }

    #[test]
    fn distinct_indices_give_distinct_prefixes() {
        assert_ne!(scene_filename_prefix(1), scene_filename_prefix(10));
    }
}
