//! Tabular data read from CSV and rendered as JSON records or an HTML table.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// A header row plus data rows. Every data row has exactly `headers.len()`
/// cells; missing cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Parse CSV text. The first record is the header row.
    pub fn from_csv(text: &str) -> Self {
        let mut records = parse_csv(text).into_iter();
        let headers = dedupe_headers(records.next().unwrap_or_default());
        let width = headers.len();

        let rows = records
            .filter(|r| !(r.len() == 1 && r[0].is_empty()))
            .map(|mut r| {
                r.resize(width, String::new());
                r.into_iter()
                    .map(|cell| if cell.is_empty() { None } else { Some(cell) })
                    .collect()
            })
            .collect();

        Self { headers, rows }
    }

    /// Pretty-printed JSON array with one object per row, keys in column
    /// order.
    pub fn to_records_json(&self) -> serde_json::Result<String> {
        let records: Vec<Record<'_>> = self
            .rows
            .iter()
            .map(|row| Record {
                headers: &self.headers,
                cells: row,
            })
            .collect();
        serde_json::to_string_pretty(&records)
    }

    pub fn to_html(&self) -> String {
        let mut out = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n");
        out.push_str("    <tr style=\"text-align: right;\">\n");
        for h in &self.headers {
            out.push_str(&format!("      <th>{}</th>\n", escape_html(h)));
        }
        out.push_str("    </tr>\n  </thead>\n  <tbody>\n");
        for row in &self.rows {
            out.push_str("    <tr>\n");
            for cell in row {
                let text = cell.as_deref().map(escape_html).unwrap_or_default();
                out.push_str(&format!("      <td>{text}</td>\n"));
            }
            out.push_str("    </tr>\n");
        }
        out.push_str("  </tbody>\n</table>\n");
        out
    }
}

struct Record<'a> {
    headers: &'a [String],
    cells: &'a [Option<String>],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (key, cell) in self.headers.iter().zip(self.cells) {
            map.serialize_entry(key, &cell_value(cell.as_deref()))?;
        }
        map.end()
    }
}

/// Numbers become JSON numbers, empty cells become `null`.
fn cell_value(cell: Option<&str>) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match trimmed {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Blank headers become `Unnamed: {i}`; repeats get a `.{n}` suffix.
fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, h) in raw.into_iter().enumerate() {
        let base = if h.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            h
        };
        let mut name = base.clone();
        let mut n = 1;
        while out.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        out.push(name);
    }
    out
}

/// Minimal RFC 4180 reader: quoted fields, doubled quotes, embedded
/// newlines, CRLF or LF line endings.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
