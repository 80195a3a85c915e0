// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Assembly of the comparison request sent to the model

use crate::gemini::Part;

/// Extracted content of one sheet, in the form it is sent
pub struct SheetInput<'a> {
    pub text: &'a str,
    pub images: Vec<Part>,
}

/// Lay out preamble, both sheets and the analysis request as an ordered list of parts
pub fn build_comparison_prompt(
    preamble: &str,
    first: SheetInput<'_>,
    second: SheetInput<'_>,
    analysis_request: &str,
) -> Vec<Part> {
    let mut parts = Vec::with_capacity(first.images.len() + second.images.len() + 6);

    parts.push(Part::text(preamble));

    parts.push(Part::text("\n--- Spec Sheet 1 Text ---"));
    parts.push(Part::text(first.text));
    parts.extend(first.images);

    parts.push(Part::text("\n--- Spec Sheet 2 Text ---"));
    parts.push(Part::text(second.text));
    parts.extend(second.images);

    parts.push(Part::text(analysis_request));
    parts
}
