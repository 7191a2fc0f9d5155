//! DejaVu Sans faces compiled into the binary.
//!
//! Charts and PDFs draw with these instead of system fonts, so the output
//! does not depend on what the host has installed.
use crate::error::{FormError, Result};
use ab_glyph::{Font, FontRef};
use std::collections::BTreeSet;

pub const SANS: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
pub const SANS_BOLD: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Characters of `text` that either bundled face cannot draw.
pub fn missing_glyphs(text: &str) -> Result<BTreeSet<char>> {
    let faces = [SANS, SANS_BOLD]
        .into_iter()
        .map(FontRef::try_from_slice)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(FormError::render)?;
    Ok(text
        .chars()
        .filter(|ch| !ch.is_control())
        .filter(|ch| faces.iter().any(|face| face.glyph_id(*ch).0 == 0))
        .collect())
}
