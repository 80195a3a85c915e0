// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Comparator Tables - pull markdown tables out of a saved AI response

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use comparator::tables::{comparison_table, extract_part_numbers, parse_tables, render_table};

#[derive(Parser, Debug)]
#[command(name = "comparator-tables")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Print the markdown tables found in an AI response")]
struct Cli {
    /// Response file (stdin when omitted or `-`)
    file: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Only print the table chosen as the comparison table
    #[arg(long)]
    comparison: bool,

    /// Also list detected manufacturer part numbers
    #[arg(long)]
    part_numbers: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let text = match cli.file.as_deref() {
        Some(path) if path != std::path::Path::new("-") => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        _ => std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?,
    };

    let tables = if cli.comparison {
        comparison_table(&text).into_iter().collect()
    } else {
        parse_tables(&text)
    };

    if cli.format == "json" {
        let mut output = serde_json::json!({ "tables": tables });
        if cli.part_numbers {
            output["part_numbers"] = serde_json::json!(extract_part_numbers(&text));
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if tables.is_empty() {
        eprintln!("No tables found.");
    }
    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", render_table(table));
    }

    if cli.part_numbers {
        let part_numbers = extract_part_numbers(&text);
        println!();
        if part_numbers.is_empty() {
            println!("MFG P/N: none detected");
        } else {
            println!("MFG P/N: {}", part_numbers.join(", "));
        }
    }

    Ok(())
}
