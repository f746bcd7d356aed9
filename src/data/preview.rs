//! Plain-text previews of a table
//!
//! The layout mirrors a dataframe printout: a left-aligned row index followed by
//! right-aligned columns separated by two spaces. Newlines, carriage returns and
//! tabs inside headers or cells are written as `\n`, `\r` and `\t` so every
//! row stays on one line.

use std::borrow::Cow;

use crate::data::table::Table;

const COLUMN_GAP: &str = "  ";

/// Render at most `row_limit` leading rows of `table`
///
/// Pure: the same table and limit always produce the same text.
pub fn render_preview(table: &Table, row_limit: usize) -> String {
    let shown = &table.rows()[..row_limit.min(table.len())];
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| escape(c).into_owned())
        .collect();

    if shown.is_empty() {
        return format!(
            "Empty DataFrame\nColumns: [{}]\nIndex: []",
            columns.join(", ")
        );
    }

    let index: Vec<String> = (0..shown.len()).map(|i| i.to_string()).collect();
    let index_width = index.iter().map(|s| width(s)).max().unwrap_or(0);

    let cells: Vec<Vec<String>> = shown
        .iter()
        .map(|row| row.iter().map(|v| escape(&v.to_string()).into_owned()).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(col, name)| {
            cells
                .iter()
                .map(|row| width(&row[col]))
                .chain(std::iter::once(width(name)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(shown.len() + 1);

    let mut header = " ".repeat(index_width);
    for (name, w) in columns.iter().zip(&widths) {
        header.push_str(COLUMN_GAP);
        header.push_str(&pad_left(name, *w));
    }
    lines.push(header);

    for (label, row) in index.iter().zip(&cells) {
        let mut line = pad_right(label, index_width);
        for (value, w) in row.iter().zip(&widths) {
            line.push_str(COLUMN_GAP);
            line.push_str(&pad_left(value, *w));
        }
        lines.push(line);
    }

    lines.join("\n")
}

fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['\n', '\r', '\t']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad_left(s: &str, w: usize) -> String {
    format!("{}{}", " ".repeat(w.saturating_sub(width(s))), s)
}

fn pad_right(s: &str, w: usize) -> String {
    format!("{}{}", s, " ".repeat(w.saturating_sub(width(s))))
}
