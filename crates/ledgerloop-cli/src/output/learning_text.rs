use std::io;

use serde_json::Value;

use super::format::{Column, confidence, joined, key_value_rows, render_table, text};

fn rows_of<'a>(data: &'a Value, key: &str, command: &str) -> io::Result<&'a Vec<Value>> {
    data.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other(format!("{command} output requires {key}")))
}

fn suggestion_table(rows: &[Value]) -> Vec<String> {
    let columns = [
        Column::left("Suggestion", 30),
        Column::left("Field", 11),
        Column::left("Keywords", 28),
        Column::left("Value", 24),
        Column::right("Seen"),
        Column::left("Status", 8),
        Column::right("Conf"),
    ];
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                text(row, "suggestion_id"),
                text(row, "pattern_type"),
                joined(row, "keywords", " "),
                text(row, "target_value"),
                text(row, "occurrence_count"),
                text(row, "status"),
                confidence(row, "confidence"),
            ]
        })
        .collect();
    render_table(&columns, &cells)
}

pub fn render_correction_record(data: &Value) -> io::Result<String> {
    let event = data
        .get("event")
        .ok_or_else(|| io::Error::other("correction output requires event"))?;
    let mut lines = vec!["Correction recorded.".to_string(), String::new()];
    lines.extend(key_value_rows(
        &[
            ("Event:", text(event, "event_id")),
            ("Transaction:", text(event, "transaction_ref")),
            ("Field:", text(event, "field")),
            ("Old value:", text(event, "old_value")),
            ("New value:", text(event, "new_value")),
        ],
        2,
    ));

    if data.get("noop").and_then(Value::as_bool).unwrap_or(false) {
        lines.push(String::new());
        lines.push("The value did not change, so this correction does not count toward learning.".to_string());
        return Ok(lines.join("\n"));
    }

    if let Some(suggestion) = data.get("suggestion")
        && suggestion.is_object()
    {
        lines.push(String::new());
        lines.push("This correction completed a pattern suggestion:".to_string());
        lines.extend(suggestion_table(std::slice::from_ref(suggestion)));
        lines.push(String::new());
        lines.push("Run `ledgerloop suggestions validate` to review it.".to_string());
    }
    Ok(lines.join("\n"))
}

pub fn render_suggestions_scan(data: &Value) -> io::Result<String> {
    let rows = rows_of(data, "pending", "suggestions scan")?;
    let threshold = text(data, "aggregation_threshold");
    if rows.is_empty() {
        return Ok(format!(
            "No correction group has reached {threshold} occurrences yet."
        ));
    }
    let mut lines = vec![
        format!("Pending suggestions (threshold {threshold}):"),
        String::new(),
    ];
    lines.extend(suggestion_table(rows));
    Ok(lines.join("\n"))
}

pub fn render_suggestions_list(data: &Value) -> io::Result<String> {
    let rows = rows_of(data, "suggestions", "suggestions list")?;
    if rows.is_empty() {
        return Ok("No suggestions found.".to_string());
    }
    let mut lines = vec!["Suggestions:".to_string(), String::new()];
    lines.extend(suggestion_table(rows));
    Ok(lines.join("\n"))
}

pub fn render_suggestions_validate(data: &Value) -> io::Result<String> {
    let mut lines = vec!["Validation run complete.".to_string(), String::new()];
    lines.extend(key_value_rows(
        &[
            ("Processed:", text(data, "processed")),
            ("Approved:", text(data, "approved")),
            ("Rejected:", text(data, "rejected")),
            ("Deferred:", text(data, "deferred")),
            ("Still pending:", text(data, "still_pending")),
        ],
        2,
    ));

    let created = joined(data, "pattern_ids", ", ");
    if !created.is_empty() {
        lines.push(String::new());
        lines.push(format!("New patterns: {created}"));
    }
    if data.get("deferred").and_then(Value::as_u64).unwrap_or(0) > 0 {
        lines.push(String::new());
        lines.push(
            "Deferred suggestions stay pending; `ledgerloop suggestions list --status pending` shows the last error."
                .to_string(),
        );
    }
    Ok(lines.join("\n"))
}

pub fn render_patterns_list(data: &Value) -> io::Result<String> {
    let rows = rows_of(data, "patterns", "patterns list")?;
    if rows.is_empty() {
        return Ok("No patterns yet. Approved suggestions and seeds show up here.".to_string());
    }
    let columns = [
        Column::left("Pattern", 30),
        Column::left("Match", 34),
        Column::left("Field", 11),
        Column::left("Value", 24),
        Column::right("Conf"),
        Column::right("Used"),
        Column::left("Active", 6),
    ];
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let expression = row.get("expression").cloned().unwrap_or(Value::Null);
            let shown = match expression.get("kind").and_then(Value::as_str) {
                Some("exact") => format!("= \"{}\"", text(&expression, "text")),
                _ => joined(&expression, "keywords", " "),
            };
            vec![
                text(row, "pattern_id"),
                shown,
                text(row, "target_field"),
                text(row, "target_value"),
                confidence(row, "confidence"),
                text(row, "usage_count"),
                if row.get("is_active").and_then(Value::as_bool).unwrap_or(false) {
                    "yes".to_string()
                } else {
                    "no".to_string()
                },
            ]
        })
        .collect();
    let mut lines = vec!["Patterns:".to_string(), String::new()];
    lines.extend(render_table(&columns, &cells));
    Ok(lines.join("\n"))
}

pub fn render_patterns_seed(data: &Value) -> io::Result<String> {
    let mut lines = vec![format!("Seeded patterns from {}.", text(data, "path")), String::new()];
    lines.extend(key_value_rows(
        &[
            ("Created:", text(data, "created")),
            ("Already present:", text(data, "existing")),
        ],
        2,
    ));
    Ok(lines.join("\n"))
}

pub fn render_patterns_deactivate(data: &Value) -> io::Result<String> {
    Ok(format!(
        "Pattern {} deactivated. It no longer classifies transactions.",
        text(data, "pattern_id")
    ))
}

pub fn render_classify(data: &Value) -> io::Result<String> {
    let rows = rows_of(data, "results", "classify")?;
    let transaction_id = text(data, "transaction_id");
    if rows.is_empty() {
        return Ok(format!(
            "No classification found for {transaction_id}. No pattern matched and no similar transaction agreed."
        ));
    }
    let columns = [
        Column::left("Field", 11),
        Column::left("Value", 28),
        Column::right("Conf"),
        Column::left("Tier", 6),
        Column::left("Source", 40),
    ];
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let source = row.get("source").cloned().unwrap_or(Value::Null);
            let origin = match source.get("kind").and_then(Value::as_str) {
                Some("pattern") => format!("pattern {}", text(&source, "pattern_id")),
                _ => format!("similar {}", text(&source, "transaction_id")),
            };
            vec![
                text(row, "field"),
                text(row, "value"),
                confidence(row, "confidence"),
                text(row, "tier"),
                origin,
            ]
        })
        .collect();
    let mut lines = vec![format!("Classification for {transaction_id}:"), String::new()];
    lines.extend(render_table(&columns, &cells));
    Ok(lines.join("\n"))
}

pub fn render_similar(data: &Value) -> io::Result<String> {
    let rows = rows_of(data, "matches", "similar")?;
    let transaction_id = text(data, "transaction_id");
    if rows.is_empty() {
        return Ok(format!(
            "No similar transactions at or above confidence {}.",
            confidence(data, "min_confidence")
        ));
    }
    let columns = [
        Column::left("Transaction", 24),
        Column::left("Description", 36),
        Column::right("Conf"),
        Column::left("Tier", 6),
        Column::left("Matched", 32),
    ];
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let transaction = row.get("transaction").cloned().unwrap_or(Value::Null);
            vec![
                text(&transaction, "id"),
                text(&transaction, "description"),
                confidence(row, "confidence"),
                text(row, "tier"),
                joined(row, "matched_fields", ", "),
            ]
        })
        .collect();
    let mut lines = vec![format!("Transactions similar to {transaction_id}:"), String::new()];
    lines.extend(render_table(&columns, &cells));
    Ok(lines.join("\n"))
}

pub fn render_settings_show(data: &Value) -> io::Result<String> {
    let rows = rows_of(data, "settings", "settings show")?;
    let columns = [
        Column::left("Setting", 28),
        Column::left("Value", 48),
        Column::left("Source", 8),
    ];
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let value = match row.get("value") {
                Some(Value::Array(items)) if items.is_empty() => "(none)".to_string(),
                Some(Value::Array(_)) => joined(row, "value", ", "),
                _ => text(row, "value"),
            };
            let source = if row.get("is_default").and_then(Value::as_bool).unwrap_or(true) {
                "default"
            } else {
                "tenant"
            };
            vec![text(row, "key"), value, source.to_string()]
        })
        .collect();
    let mut lines = vec![
        format!("Settings for {}:", text(data, "tenant_id")),
        String::new(),
    ];
    lines.extend(render_table(&columns, &cells));
    Ok(lines.join("\n"))
}

pub fn render_settings_set(data: &Value) -> io::Result<String> {
    let value = match data.get("value") {
        Some(Value::Array(_)) => joined(data, "value", ", "),
        _ => text(data, "value"),
    };
    Ok(format!(
        "Updated {} for {}: {value}",
        text(data, "key"),
        text(data, "tenant_id")
    ))
}

pub fn render_notifications_list(data: &Value) -> io::Result<String> {
    let rows = rows_of(data, "notifications", "notifications list")?;
    if rows.is_empty() {
        return Ok("No notifications.".to_string());
    }
    let mut lines = vec!["Notifications:".to_string()];
    for row in rows {
        lines.push(String::new());
        lines.push(format!(
            "  [{}] {}  ({})",
            text(row, "priority"),
            text(row, "title"),
            text(row, "created_at")
        ));
        lines.push(format!("    {}", text(row, "message")));
    }
    Ok(lines.join("\n"))
}
