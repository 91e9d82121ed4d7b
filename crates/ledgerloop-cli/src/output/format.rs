use std::cmp;

use serde_json::Value;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    pub name: &'a str,
    pub align: Align,
    /// Cells longer than this are cut and end in `…`.
    pub max_width: usize,
}

impl<'a> Column<'a> {
    pub const fn left(name: &'a str, max_width: usize) -> Self {
        Self {
            name,
            align: Align::Left,
            max_width,
        }
    }

    pub const fn right(name: &'a str) -> Self {
        Self {
            name,
            align: Align::Right,
            max_width: 12,
        }
    }
}

const INDENT: &str = "  ";
const COLUMN_GAP: &str = "  ";

pub fn key_value_rows(entries: &[(&str, String)], indent: usize) -> Vec<String> {
    let label_width = entries
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    let padding = " ".repeat(indent);

    entries
        .iter()
        .map(|(label, value)| format!("{padding}{label:<label_width$}  {value}"))
        .collect()
}

pub fn render_table(columns: &[Column<'_>], rows: &[Vec<String>]) -> Vec<String> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    truncate(row.get(index).map(String::as_str).unwrap_or(""), column.max_width)
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .fold(column.name.chars().count(), cmp::max)
        })
        .collect();

    let header: Vec<String> = columns.iter().map(|column| column.name.to_string()).collect();
    let mut output = vec![format_row(columns, &header, &widths)];
    output.extend(cells.iter().map(|row| format_row(columns, row, &widths)));
    output
}

fn format_row(columns: &[Column<'_>], cells: &[String], widths: &[usize]) -> String {
    let pieces: Vec<String> = columns
        .iter()
        .zip(cells.iter().zip(widths))
        .map(|(column, (value, width))| {
            let pad = width.saturating_sub(value.chars().count());
            match column.align {
                Align::Left => format!("{value}{}", " ".repeat(pad)),
                Align::Right => format!("{}{value}", " ".repeat(pad)),
            }
        })
        .collect();
    format!("{INDENT}{}", pieces.join(COLUMN_GAP)).trim_end().to_string()
}

fn truncate(value: &str, max_width: usize) -> String {
    if max_width == 0 || value.chars().count() <= max_width {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_width.saturating_sub(1)).collect();
    format!("{kept}…")
}

pub fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn confidence(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map(|number| format!("{number:.2}"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn joined(value: &Value, key: &str, separator: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                .collect::<Vec<String>>()
                .join(separator)
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Column, confidence, joined, key_value_rows, render_table, text};

    #[test]
    fn key_value_rows_align_labels() {
        let rows = key_value_rows(
            &[
                ("Approved:", "2".to_string()),
                ("Still pending:", "0".to_string()),
            ],
            2,
        );

        assert_eq!(rows[0], "  Approved:       2");
        assert_eq!(rows[1], "  Still pending:  0");
    }

    #[test]
    fn table_aligns_columns_and_truncates_long_cells() {
        let columns = [Column::left("Value", 8), Column::right("Conf")];
        let rows = vec![
            vec!["Kraken".to_string(), "0.92".to_string()],
            vec!["Landlord Holdings LLC".to_string(), "0.5".to_string()],
        ];

        let rendered = render_table(&columns, &rows);
        assert_eq!(rendered[0], "  Value     Conf");
        assert_eq!(rendered[1], "  Kraken    0.92");
        assert_eq!(rendered[2], "  Landlor…   0.5");
    }

    #[test]
    fn value_helpers_render_missing_fields_as_dashes() {
        let row = json!({"name": "x", "count": 3, "none": null, "score": 0.456, "tags": ["a", "b"]});
        assert_eq!(text(&row, "name"), "x");
        assert_eq!(text(&row, "count"), "3");
        assert_eq!(text(&row, "none"), "-");
        assert_eq!(text(&row, "absent"), "-");
        assert_eq!(confidence(&row, "score"), "0.46");
        assert_eq!(confidence(&row, "none"), "-");
        assert_eq!(joined(&row, "tags", " "), "a b");
    }
}
