use std::fmt::Write as _;

use crate::sanitize::SanitizedRow;

pub const DEFAULT_SPACER_HEIGHT: u32 = 40;

fn spacer(out: &mut String, height: u32) {
    write!(
        out,
        r#"<div style="height:{height}px" aria-hidden="true" class="import-spacer"></div>"#
    )
    .ok();
}

/// Assemble the item body: long description, then each non-empty embed code
/// preceded by a spacer. Empty sources leave no trace in the output.
pub fn build_body(row: &SanitizedRow, spacer_height: u32) -> String {
    let mut sections = Vec::with_capacity(3);
    if !row.long_description.is_empty() {
        sections.push(row.long_description.clone());
    }
    for embed in [&row.embed_code_1, &row.embed_code_2] {
        if embed.is_empty() {
            continue;
        }
        let mut section = String::new();
        spacer(&mut section, spacer_height);
        section.push('\n');
        section.push_str(embed);
        sections.push(section);
    }
    sections.join("\n")
}
