//! Text rendering for step results.
//!
//! Each step's result is turned into a `Block`, which knows how to write
//! itself as plain text to any `std::io::Write` sink.

use std::io::{self, Write};

/// Rendered payload of one report section.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Single informational line.
    Info(String),

    /// One line per item, with a placeholder when there are none.
    Lines(Vec<String>),

    /// Column-aligned table.
    Table {
        /// Column headers.
        headers: Vec<String>,
        /// Row data (each row is a vector of cell values).
        rows: Vec<Vec<String>>,
    },

    /// Pretty-printed JSON.
    Json(serde_json::Value),
}

impl Block {
    /// Creates an info line.
    pub fn info(msg: impl Into<String>) -> Self {
        Self::Info(msg.into())
    }

    /// Creates a table block.
    pub fn table(headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self::Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    /// Writes the block as text.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Self::Info(msg) => writeln!(out, "{msg}"),
            Self::Lines(lines) if lines.is_empty() => writeln!(out, "(none)"),
            Self::Lines(lines) => {
                for line in lines {
                    writeln!(out, "  {line}")?;
                }
                Ok(())
            }
            Self::Table { rows, .. } if rows.is_empty() => writeln!(out, "(none)"),
            Self::Table { headers, rows } => write_table(out, headers, rows),
            Self::Json(value) => {
                let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
                writeln!(out, "{text}")
            }
        }
    }
}

/// Writes a report section: blank line, heading, body.
pub fn write_section<W: Write + ?Sized>(
    out: &mut W,
    heading: &str,
    block: &Block,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{heading}")?;
    block.write_to(out)
}

fn write_table<W: Write + ?Sized>(
    out: &mut W,
    headers: &[String],
    rows: &[Vec<String>],
) -> io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "  {}", format_row(headers))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "  {}", rule.join("-+-"))?;
    for row in rows {
        writeln!(out, "  {}", format_row(row))?;
    }
    Ok(())
}
