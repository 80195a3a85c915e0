// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Markdown table recovery from model responses
//!
//! Model output is free text with no guaranteed structure. Everything here is
//! best effort: malformed input yields fewer tables, never an error.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

/// A table recovered from markdown pipe syntax
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkdownTable {
    pub headers: Vec<String>,
    /// Body rows, each exactly `headers.len()` cells wide
    pub rows: Vec<Vec<String>>,
}

impl MarkdownTable {
    pub fn columns(&self) -> usize {
        self.headers.len()
    }
}

/// A run of a response: either free text or a table, in source order
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Prose(String),
    Table(MarkdownTable),
}

fn delimiter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?\s*$").expect("delimiter pattern is valid")
    })
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(```|~~~)[\w-]*\s*$").expect("fence pattern is valid"))
}

fn part_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)MFG\.?\s*P\s*/\s*N\s*\**\s*[:=]?\s*\**\s*([A-Za-z0-9][A-Za-z0-9\-_./#+]*)")
            .expect("part number pattern is valid")
    })
}

fn is_delimiter(line: &str) -> bool {
    line.contains('|') && line.contains('-') && delimiter_regex().is_match(line)
}

fn is_fence(line: &str) -> bool {
    fence_regex().is_match(line)
}

/// Split a pipe row into cleaned cells, honouring `\|` escapes
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = if trimmed.ends_with('|') && !trimmed.ends_with("\\|") {
        &trimmed[..trimmed.len() - 1]
    } else {
        trimmed
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(clean_cell(&std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    cells.push(clean_cell(&current));
    cells
}

fn clean_cell(raw: &str) -> String {
    raw.replace("<br>", " ")
        .replace("<br/>", " ")
        .replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Try to read a table whose header row is `lines[start]`, returning it with the number of lines used
fn table_at(lines: &[&str], start: usize) -> Option<(MarkdownTable, usize)> {
    let header = lines.get(start)?;
    let delimiter = lines.get(start + 1)?;

    if !header.contains('|') || is_delimiter(header) || !is_delimiter(delimiter) {
        return None;
    }

    let headers = split_cells(header);
    if headers.iter().all(|h| h.is_empty()) {
        return None;
    }
    let width = headers.len();

    let mut rows = Vec::new();
    let mut end = start + 2;
    while let Some(line) = lines.get(end) {
        if line.trim().is_empty() || !line.contains('|') {
            break;
        }
        end += 1;
        if is_delimiter(line) {
            continue;
        }
        let mut cells = split_cells(line);
        cells.resize(width, String::new());
        if cells.iter().any(|c| !c.is_empty()) {
            rows.push(cells);
        }
    }

    Some((MarkdownTable { headers, rows }, end - start))
}

/// Split a response into prose blocks and tables, preserving order
///
/// Code fences that wrap nothing but a table are dropped with it.
pub fn split_segments(text: &str) -> Vec<Segment> {
    let lines: Vec<&str> = text.lines().collect();
    let mut segments = Vec::new();
    let mut prose: Vec<&str> = Vec::new();

    let flush = |prose: &mut Vec<&str>, segments: &mut Vec<Segment>| {
        let block = prose.join("\n");
        let block = block.trim_matches('\n');
        if !block.trim().is_empty() {
            segments.push(Segment::Prose(block.to_string()));
        }
        prose.clear();
    };

    let mut i = 0;
    while i < lines.len() {
        if let Some((table, consumed)) = table_at(&lines, i) {
            let fenced = prose.last().is_some_and(|l| is_fence(l));
            if fenced {
                prose.pop();
            }
            flush(&mut prose, &mut segments);
            segments.push(Segment::Table(table));
            i += consumed;
            if fenced && lines.get(i).is_some_and(|l| is_fence(l)) {
                i += 1;
            }
            continue;
        }
        prose.push(lines[i]);
        i += 1;
    }
    flush(&mut prose, &mut segments);

    segments
}

/// All tables in a response, in order
pub fn parse_tables(text: &str) -> Vec<MarkdownTable> {
    split_segments(text)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Table(t) => Some(t),
            Segment::Prose(_) => None,
        })
        .collect()
}

/// The table most likely to be the side-by-side comparison
///
/// Tables with at least three columns win over narrower ones, then the one
/// with most rows; earlier tables win ties.
pub fn comparison_table(text: &str) -> Option<MarkdownTable> {
    parse_tables(text)
        .into_iter()
        .filter(|t| !t.rows.is_empty())
        .reduce(|best, t| {
            let score = |t: &MarkdownTable| (t.columns() >= 3, t.rows.len());
            if score(&t) > score(&best) {
                t
            } else {
                best
            }
        })
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "and" | "for" | "with" | "from" | "this" | "that" | "are" | "was" | "were"
            | "a" | "an" | "is" | "of" | "or" | "to" | "in" | "vs" | "versus" | "while" | "both"
    )
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !is_stop_word(t))
        .map(String::from)
        .collect()
}

/// Whether a prose line only restates one row of the given tables
///
/// The line counts as redundant when it has at least `min_tokens` content
/// words and at least `threshold` of them occur in the cells of a single row.
/// Header words do not count, so a line that only names the columns is kept.
pub fn is_redundant(line: &str, tables: &[MarkdownTable], threshold: f64, min_tokens: usize) -> bool {
    let line_tokens = tokens(line);
    if line_tokens.is_empty() || line_tokens.len() < min_tokens {
        return false;
    }

    tables.iter().flat_map(|table| &table.rows).any(|row| {
        let row_tokens: HashSet<String> = row.iter().flat_map(|c| tokens(c)).collect();
        let hits = line_tokens.iter().filter(|t| row_tokens.contains(*t)).count();
        hits as f64 / line_tokens.len() as f64 >= threshold
    })
}

/// Remove prose lines that repeat table rows, dropping prose blocks left empty
pub fn dedupe_narrative(segments: Vec<Segment>, threshold: f64, min_tokens: usize) -> Vec<Segment> {
    let tables: Vec<MarkdownTable> = segments
        .iter()
        .filter_map(|s| match s {
            Segment::Table(t) => Some(t.clone()),
            Segment::Prose(_) => None,
        })
        .collect();

    if tables.is_empty() {
        return segments;
    }

    segments
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Prose(block) => {
                let kept: Vec<&str> = block
                    .lines()
                    .filter(|line| !is_redundant(line, &tables, threshold, min_tokens))
                    .collect();
                let kept = kept.join("\n");
                if kept.trim().is_empty() {
                    None
                } else {
                    Some(Segment::Prose(kept))
                }
            }
            table => Some(table),
        })
        .collect()
}

/// Manufacturer part numbers mentioned as `MFG P/N` in prose or in a table row
pub fn extract_part_numbers(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |value: &str| {
        let value = value.trim().trim_end_matches(['.', ',', ';']);
        if !value.is_empty() && !value.eq_ignore_ascii_case("n/a") && !found.iter().any(|f| f == value) {
            found.push(value.to_string());
        }
    };

    for segment in split_segments(text) {
        match segment {
            Segment::Prose(block) => {
                for caps in part_number_regex().captures_iter(&block) {
                    if let Some(m) = caps.get(1) {
                        push(m.as_str());
                    }
                }
            }
            Segment::Table(table) => {
                for row in &table.rows {
                    let is_pn_row = row.first().is_some_and(|c| {
                        let key = c.to_lowercase().replace([' ', '.'], "");
                        key.starts_with("mfgp/n") || key == "partnumber" || key == "mfgpartnumber"
                    });
                    if is_pn_row {
                        row.iter().skip(1).for_each(|c| push(c.as_str()));
                    }
                }
            }
        }
    }

    found
}

/// Render a table as an aligned plain-text grid
pub fn render_table(table: &MarkdownTable) -> String {
    let width = table.columns();
    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate().take(width) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&format_row(&table.headers));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &table.rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "\
**1. Component Type**
Both parts are adjustable linear voltage regulators.

| Parameter | Spec Sheet 1 | Spec Sheet 2 |
|:----------|:------------:|-------------:|
| **MFG P/N** | LM317T | LM1117-ADJ |
| Output Voltage | 1.25V - 37V | 1.25V - 13.8V |
| Dropout | 2V | 1.2V |
| Package | TO-220 | SOT-223 |

- Output Voltage: 1.25V - 37V vs 1.25V - 13.8V
- The LM1117 has a much lower dropout, which matters for 3.3V rails.

**Pin compatibility:** Not pin-to-pin compatible (different packages).
";

    #[test]
    fn test_parse_basic_table() {
        let tables = parse_tables(RESPONSE);
        assert_eq!(tables.len(), 1);

        let table = &tables[0];
        assert_eq!(table.headers, vec!["Parameter", "Spec Sheet 1", "Spec Sheet 2"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0], vec!["MFG P/N", "LM317T", "LM1117-ADJ"]);
        assert_eq!(table.rows[3][2], "SOT-223");
    }

    #[test]
    fn test_rows_padded_and_truncated() {
        let text = "a | b | c\n---|---|---\n1 | 2\n1 | 2 | 3 | 4\n";
        let tables = parse_tables(text);
        assert_eq!(tables[0].rows, vec![vec!["1", "2", ""], vec!["1", "2", "3"]]);
    }

    #[test]
    fn test_escaped_pipe_in_cell() {
        let text = "| Pin | Function |\n|---|---|\n| 1 | IN \\| EN |\n";
        let tables = parse_tables(text);
        assert_eq!(tables[0].rows[0], vec!["1", "IN | EN"]);
    }

    #[test]
    fn test_no_table_without_delimiter() {
        assert!(parse_tables("a | b\nc | d\n").is_empty());
        assert!(parse_tables("").is_empty());
        assert!(parse_tables("just text\n---\nmore").is_empty());
    }

    #[test]
    fn test_segments_keep_order() {
        let segments = split_segments(RESPONSE);
        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[0], Segment::Prose(p) if p.contains("Component Type")));
        assert!(matches!(&segments[1], Segment::Table(_)));
        assert!(matches!(&segments[2], Segment::Prose(p) if p.contains("Pin compatibility")));
    }

    #[test]
    fn test_fenced_table_drops_fences() {
        let text = "Intro\n```markdown\n| A | B |\n|---|---|\n| 1 | 2 |\n```\nOutro";
        let segments = split_segments(text);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Prose("Intro".to_string()));
        assert_eq!(segments[2], Segment::Prose("Outro".to_string()));
    }

    #[test]
    fn test_redundant_line_detection() {
        let tables = parse_tables(RESPONSE);
        assert!(is_redundant("- Output Voltage: 1.25V - 37V vs 1.25V - 13.8V", &tables, 0.8, 3));
        assert!(!is_redundant(
            "- The LM1117 has a much lower dropout, which matters for 3.3V rails.",
            &tables,
            0.8,
            3
        ));
        // Too short to judge
        assert!(!is_redundant("Dropout", &tables, 0.8, 3));
    }

    #[test]
    fn test_header_words_do_not_make_a_line_redundant() {
        let tables = parse_tables("| Parameter | Spec Sheet 1 | Spec Sheet 2 |\n|---|---|---|\n| Dropout | 2V | 1.2V |\n");
        assert!(!is_redundant("Dropout: Spec Sheet 2 is better", &tables, 0.8, 3));
        assert!(is_redundant("Dropout: 2V vs 1.2V", &tables, 0.8, 3));

        let kept = dedupe_narrative(
            vec![Segment::Table(tables[0].clone()), Segment::Prose("Dropout: Spec Sheet 2 is better".into())],
            0.8,
            3,
        );
        assert_eq!(kept[1], Segment::Prose("Dropout: Spec Sheet 2 is better".into()));
    }

    #[test]
    fn test_dedupe_narrative() {
        let segments = dedupe_narrative(split_segments(RESPONSE), 0.8, 3);
        let prose: Vec<&String> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Prose(p) => Some(p),
                Segment::Table(_) => None,
            })
            .collect();

        assert!(!prose.iter().any(|p| p.contains("- Output Voltage:")));
        assert!(prose.iter().any(|p| p.contains("much lower dropout")));
        assert_eq!(segments.iter().filter(|s| matches!(s, Segment::Table(_))).count(), 1);
    }

    #[test]
    fn test_dedupe_without_tables_is_identity() {
        let segments = split_segments("Output Voltage 5V 3.3V");
        assert_eq!(dedupe_narrative(segments.clone(), 0.8, 3), segments);
    }

    #[test]
    fn test_comparison_table_prefers_wide_tables() {
        let text = "\
| Pin | Name |\n|---|---|\n| 1 | ADJ |\n| 2 | OUT |\n| 3 | IN |\n\n\
| Parameter | A | B |\n|---|---|---|\n| Vout | 5V | 3.3V |\n";
        let table = comparison_table(text).unwrap();
        assert_eq!(table.headers, vec!["Parameter", "A", "B"]);
        assert!(comparison_table("no tables here").is_none());
    }

    #[test]
    fn test_extract_part_numbers() {
        let text = "Sheet 1 **MFG P/N:** LM317T.\nMfg. P/N = TPS7A4901\n\n\
| Field | S1 | S2 |\n|---|---|---|\n| MFG P/N | LM317T | LM1117-ADJ |\n";
        assert_eq!(extract_part_numbers(text), vec!["LM317T", "TPS7A4901", "LM1117-ADJ"]);
    }

    #[test]
    fn test_render_table_alignment() {
        let table = MarkdownTable {
            headers: vec!["Parameter".into(), "A".into()],
            rows: vec![vec!["Vout".into(), "5V".into()]],
        };
        let rendered = render_table(&table);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Parameter | A");
        assert_eq!(lines[1], "----------+---");
        assert_eq!(lines[2], "Vout      | 5V");
    }

    #[test]
    fn test_hostile_input_does_not_panic() {
        for text in ["|", "||\n||", "|-|\n|-|", "| a |\n| - |\n|", "\u{1F600}|é\n-|-\nß|\\", "\\|\n---|"] {
            let _ = split_segments(text);
            let _ = extract_part_numbers(text);
            if let Some(t) = comparison_table(text) {
                let _ = render_table(&t);
            }
        }
    }
}
