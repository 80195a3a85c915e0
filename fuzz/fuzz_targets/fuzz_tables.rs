// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use comparator::tables::{comparison_table, dedupe_narrative, extract_part_numbers, render_table, split_segments, Segment};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let segments = split_segments(text);
    for segment in &segments {
        if let Segment::Table(table) = segment {
            let _ = render_table(table);
        }
    }
    let _ = dedupe_narrative(segments, 0.8, 3);
    let _ = comparison_table(text);
    let _ = extract_part_numbers(text);
});
