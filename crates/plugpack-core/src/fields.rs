use anyhow::{bail, Result};

/// Quotes one field for a line-oriented record so embedded spaces survive
/// a round-trip through [`split_fields`].
pub fn quote_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Splits a line into whitespace-separated fields, honoring double quotes
/// and backslash escapes inside them.
pub fn split_fields(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_field = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        if quoted {
            match ch {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => bail!("unterminated escape sequence"),
                },
                '"' => quoted = false,
                other => current.push(other),
            }
        } else if ch == '"' {
            quoted = true;
            in_field = true;
        } else if ch.is_whitespace() {
            if in_field {
                fields.push(std::mem::take(&mut current));
                in_field = false;
            }
        } else {
            in_field = true;
            current.push(ch);
        }
    }

    if quoted {
        bail!("unterminated quoted field");
    }
    if in_field {
        fields.push(current);
    }

    Ok(fields)
}
