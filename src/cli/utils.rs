use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format. Object `data` is
/// merged into the JSON envelope.
pub fn output_success(
    output_format: OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print rows as a fixed-width table in text mode, or as `{key: rows}` in JSON.
pub fn output_table(
    output_format: OutputFormat,
    key: &str,
    headers: &[&str],
    rows: Vec<Vec<String>>,
    json_rows: Value,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ key: json_rows }))?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No {} found", key);
                return Ok(());
            }
            let widths: Vec<usize> = headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    rows.iter()
                        .filter_map(|r| r.get(i))
                        .map(|c| c.chars().count())
                        .chain(std::iter::once(h.len()))
                        .max()
                        .unwrap_or(0)
                })
                .collect();

            println!("{}", format_row(headers.iter().map(|h| h.to_string()), &widths));
            println!("{}", "-".repeat(widths.iter().sum::<usize>() + widths.len() * 2));
            for row in rows {
                println!("{}", format_row(row.into_iter(), &widths));
            }
        }
    }
    Ok(())
}

fn format_row(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_column_width() {
        let row = format_row(vec!["admin".to_string(), "15".to_string()].into_iter(), &[8, 3]);
        assert_eq!(row, "admin     15");
    }
}
