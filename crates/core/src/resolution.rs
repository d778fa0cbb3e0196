//! Parsing of `<width>x<height>` resolution strings.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum dimension (width or height) accepted.
const MAX_DIMENSION: u32 = 7680;

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*x\s*(\d+)\s*$").expect("valid regex"));

/// Parse a resolution such as `"1920x1080"`.
pub fn parse_resolution(value: &str) -> Result<Resolution, CoreError> {
    let invalid = || {
        CoreError::InvalidFormat(format!(
            "resolution must look like '<width>x<height>', got '{value}'"
        ))
    };

    let caps = RESOLUTION_RE.captures(value).ok_or_else(invalid)?;
    let width: u32 = caps[1].parse().map_err(|_| invalid())?;
    let height: u32 = caps[2].parse().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(CoreError::InvalidFormat(
            "resolution width and height must be greater than 0".to_string(),
        ));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CoreError::InvalidFormat(format!(
            "resolution must not exceed {MAX_DIMENSION}px (got {width}x{height})"
        )));
    }

    Ok(Resolution { width, height })
}
