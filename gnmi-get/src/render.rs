//! Text rendering of gNMI GetResponse messages.

use std::io::Write;

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::de::IgnoredAny;

use gnmi_lib::gnmi::typed_value::Value;
use gnmi_lib::gnmi::{GetResponse, Path, TypedValue};
use gnmi_lib::{GnmiError, Result, TextFormat, path_to_xpath};

const JSON_INDENT: &str = "    ";

/// Write the response in text format, then every update of every notification.
///
/// Returns the number of updates rendered. A response without notifications,
/// or whose notifications carry no updates, is an error once the raw dump has
/// been written.
pub fn render_response(out: &mut impl Write, response: &GetResponse) -> Result<usize> {
    writeln!(out, "Get Response:")?;
    writeln!(out, "{}", response.to_text_format()?)?;
    writeln!(out)?;

    if response.notification.is_empty() {
        return Err(GnmiError::EmptyResponse("GetResponse has no notifications"));
    }

    let mut rendered = 0;
    for (n, notification) in response.notification.iter().enumerate() {
        if notification.timestamp > 0 {
            let at = Utc
                .timestamp_nanos(notification.timestamp)
                .to_rfc3339_opts(SecondsFormat::Nanos, true);
            writeln!(out, "Notification {} timestamp: {}", n, at)?;
        }

        for (u, update) in notification.update.iter().enumerate() {
            let xpath = joined_xpath(notification.prefix.as_ref(), update.path.as_ref());
            writeln!(out, "Notification {}, update {}: {}", n, u, xpath)?;
            render_value(out, update.val.as_ref())?;
            writeln!(out)?;
            rendered += 1;
        }
    }

    if rendered == 0 {
        return Err(GnmiError::EmptyResponse(
            "GetResponse notifications carry no updates",
        ));
    }
    Ok(rendered)
}

/// Re-indent a JSON document with four spaces.
///
/// The document is validated first, then re-laid out token by token: member
/// order, duplicate members and number spellings are kept exactly as sent.
pub fn pretty_json(raw: &[u8]) -> Result<String> {
    serde_json::from_slice::<IgnoredAny>(raw)?;

    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len() * 2);
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut opened = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            continue;
        }

        // `{}` and `[]` stay on one line.
        if opened {
            opened = false;
            if c == '}' || c == ']' {
                depth -= 1;
                out.push(c);
                continue;
            }
            newline(&mut out, depth);
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' | '[' => {
                out.push(c);
                depth += 1;
                opened = true;
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                newline(&mut out, depth);
                out.push(c);
            }
            ',' => {
                out.push(c);
                newline(&mut out, depth);
            }
            ':' => out.push_str(": "),
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(JSON_INDENT);
    }
}

fn joined_xpath(prefix: Option<&Path>, path: Option<&Path>) -> String {
    let elem = prefix
        .into_iter()
        .chain(path)
        .flat_map(|p| p.elem.iter().cloned())
        .collect();

    path_to_xpath(&Path {
        elem,
        ..Default::default()
    })
}

fn render_value(out: &mut impl Write, value: Option<&TypedValue>) -> Result<()> {
    match value.and_then(|v| v.value.as_ref()) {
        None => writeln!(out, "Value: <none>")?,
        Some(Value::JsonIetfVal(raw)) => render_json(out, "JSON_IETF", raw)?,
        Some(Value::JsonVal(raw)) => render_json(out, "JSON", raw)?,
        Some(Value::StringVal(s)) => writeln!(out, "Value: {}", s)?,
        Some(Value::AsciiVal(s)) => writeln!(out, "Value: {}", s)?,
        Some(Value::IntVal(i)) => writeln!(out, "Value: {}", i)?,
        Some(Value::UintVal(u)) => writeln!(out, "Value: {}", u)?,
        Some(Value::BoolVal(b)) => writeln!(out, "Value: {}", b)?,
        Some(Value::DoubleVal(d)) => writeln!(out, "Value: {}", d)?,
        Some(other) => writeln!(out, "Value: {:?}", other)?,
    }
    Ok(())
}

fn render_json(out: &mut impl Write, kind: &str, raw: &[u8]) -> Result<()> {
    writeln!(out, "{} value:", kind)?;
    writeln!(out, "{}", String::from_utf8_lossy(raw))?;
    writeln!(out, "Indented:")?;
    writeln!(out, "{}", pretty_json(raw)?)?;
    Ok(())
}
