use super::geometry::{magic_version, parse_token};
use crate::domain::{XcheckError, XcheckResult};
use std::collections::BTreeMap;

pub(super) const RESULT_MAGIC: &str = "D6OARLZ!";
pub(super) const REQUIRED_HEADER_KEYS: [&str; 4] = ["TYPE", "SPACE_TYPE", "TIME_UNIT", "QUANTITY"];

#[derive(Debug)]
pub(super) struct ParsedHeader {
    pub(super) version: Option<u8>,
    pub(super) entries: BTreeMap<String, String>,
    pub(super) indices: Vec<usize>,
    pub(super) body_start: usize,
}

#[derive(Debug)]
pub(super) struct ParsedBody {
    pub(super) time_points: Vec<f64>,
    pub(super) values: Vec<Vec<f64>>,
}

pub(super) fn parse_header(lines: &[&str], origin: &str) -> XcheckResult<ParsedHeader> {
    let mut version = None;
    let mut entries = BTreeMap::new();
    let mut seen_content = false;

    for (index, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if !seen_content {
            seen_content = true;
            if line.starts_with(RESULT_MAGIC) {
                version = Some(magic_version(line, RESULT_MAGIC).ok_or_else(|| {
                    XcheckError::parse(
                        "PARSE.STRUCTURED_MAGIC",
                        format!("{}: unsupported result file version '{}'", origin, line),
                    )
                })?);
                continue;
            }
        }

        // lines without a key/value pair are comments
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let keyword = key.trim_matches(|c: char| c == ' ' || c == '#' || c == '\t');

        if keyword.starts_with("INDICES") {
            let indices = value
                .split_whitespace()
                .map(|token| parse_token::<usize>(token, origin, index + 1))
                .collect::<XcheckResult<Vec<_>>>()?;
            return Ok(ParsedHeader {
                version,
                entries,
                indices,
                body_start: index + 1,
            });
        }

        entries.insert(keyword.to_string(), value.trim().to_string());
    }

    Err(XcheckError::parse(
        "PARSE.STRUCTURED_HEADER",
        format!("{}: missing data or incomplete header, no INDICES line", origin),
    ))
}

pub(super) fn require_keys(entries: &BTreeMap<String, String>, origin: &str) -> XcheckResult<()> {
    match REQUIRED_HEADER_KEYS
        .iter()
        .find(|key| !entries.contains_key(**key))
    {
        Some(missing) => Err(XcheckError::parse(
            "PARSE.STRUCTURED_HEADER",
            format!("{}: missing required header key {}", origin, missing),
        )),
        None => Ok(()),
    }
}

/// Keeps the last dot-separated segment of each `|`-separated quantity name.
pub(super) fn quantity_names(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(|quantity| {
            quantity
                .rsplit('.')
                .next()
                .unwrap_or(quantity)
                .trim()
                .to_string()
        })
        .collect()
}

pub(super) fn parse_body(
    lines: &[&str],
    body_start: usize,
    row_width: usize,
    origin: &str,
) -> XcheckResult<ParsedBody> {
    let mut time_points = Vec::new();
    let mut values = Vec::new();

    for (offset, raw) in lines.iter().enumerate().skip(body_start) {
        let line_number = offset + 1;
        let mut tokens = raw.split_whitespace();
        let Some(time_token) = tokens.next() else {
            continue;
        };

        let time = parse_token::<f64>(time_token, origin, line_number)?;
        let row = tokens
            .map(|token| parse_token::<f64>(token, origin, line_number))
            .collect::<XcheckResult<Vec<_>>>()?;
        if row.len() != row_width {
            return Err(XcheckError::parse(
                "PARSE.STRUCTURED_ROW",
                format!(
                    "{}: sample at line {} has {} values, expected {}",
                    origin,
                    line_number,
                    row.len(),
                    row_width
                ),
            ));
        }

        time_points.push(time);
        values.push(row);
    }

    if values.is_empty() {
        return Err(XcheckError::parse(
            "PARSE.STRUCTURED_ROW",
            format!("{}: no samples after header", origin),
        ));
    }

    Ok(ParsedBody {
        time_points,
        values,
    })
}

pub(super) fn seconds_per_unit(unit: &str) -> Option<f64> {
    match unit {
        "s" => Some(1.0),
        "min" => Some(60.0),
        "h" => Some(3600.0),
        "d" => Some(86_400.0),
        "a" => Some(365.0 * 86_400.0),
        _ => None,
    }
}
