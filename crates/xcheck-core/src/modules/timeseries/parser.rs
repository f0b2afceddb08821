use super::model::DelimiterFormat;
use crate::domain::{XcheckError, XcheckResult};
use csv::{ReaderBuilder, StringRecord, Trim};

#[derive(Debug)]
pub(super) struct ParsedTable {
    pub(super) format: DelimiterFormat,
    pub(super) captions: Vec<String>,
    pub(super) columns: Vec<Vec<f64>>,
    pub(super) rows: Vec<Vec<String>>,
}

pub(super) fn parse_table(
    source: &str,
    origin: &str,
    instance_prefix: Option<&str>,
) -> XcheckResult<ParsedTable> {
    let mut content_lines = source.lines().filter(|line| !line.trim().is_empty());
    let Some(caption_line) = content_lines.next() else {
        return Err(missing_data(origin));
    };
    if content_lines.next().is_none() {
        return Err(missing_data(origin));
    }

    let format = DelimiterFormat::detect(caption_line);
    let mut reader = ReaderBuilder::new()
        .delimiter(format.delimiter())
        .quoting(format == DelimiterFormat::Comma)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source.as_bytes());

    let header = reader.headers().map_err(|source| {
        XcheckError::parse(
            "PARSE.TIMESERIES_CAPTIONS",
            format!("{}: failed to read caption line: {}", origin, source),
        )
    })?;
    let mut raw_captions = record_tokens(header);
    drop_trailing_empty(&mut raw_captions, 1);
    let captions = raw_captions
        .iter()
        .map(|caption| normalize_caption(caption, instance_prefix))
        .collect::<Vec<_>>();

    let mut columns = vec![Vec::new(); captions.len()];
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| {
            XcheckError::parse(
                "PARSE.TIMESERIES_ROW",
                format!("{}: malformed row: {}", origin, source),
            )
        })?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or_default();

        let mut tokens = record_tokens(&record);
        drop_trailing_empty(&mut tokens, captions.len());
        if tokens.len() != captions.len() {
            return Err(XcheckError::parse(
                "PARSE.TIMESERIES_ROW",
                format!(
                    "{}: row at line {} has {} values, expected {}",
                    origin,
                    line,
                    tokens.len(),
                    captions.len()
                ),
            ));
        }

        for (column, token) in columns.iter_mut().zip(&tokens) {
            let value = token.parse::<f64>().map_err(|_| {
                XcheckError::parse(
                    "PARSE.TIMESERIES_VALUE",
                    format!(
                        "{}: row at line {} has non-numeric value '{}'",
                        origin, line, token
                    ),
                )
            })?;
            column.push(value);
        }
        rows.push(tokens);
    }

    Ok(ParsedTable {
        format,
        captions,
        columns,
        rows,
    })
}

/// Strips quotes, a bracketed unit suffix and the simulator instance prefix.
///
/// The unit is cut at the first `[` when a matching last `]` follows it, so
/// `T [deg [C]]` becomes `T`.
pub(super) fn normalize_caption(raw: &str, instance_prefix: Option<&str>) -> String {
    let mut caption = raw.trim().trim_matches('"').trim();

    if let (Some(open), Some(close)) = (caption.find('['), caption.rfind(']'))
        && close > open
    {
        caption = caption[..open].trim_end();
    }

    if let Some(prefix) = instance_prefix
        && let Some(rest) = caption
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
        && !rest.is_empty()
    {
        caption = rest;
    }

    caption.to_string()
}

fn record_tokens(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

// Trailing delimiters produce empty tokens past the last real column.
fn drop_trailing_empty(tokens: &mut Vec<String>, keep: usize) {
    while tokens.len() > keep && tokens.last().is_some_and(|token| token.is_empty()) {
        tokens.pop();
    }
}

fn missing_data(origin: &str) -> XcheckError {
    XcheckError::parse(
        "PARSE.TIMESERIES_MISSING_DATA",
        format!("{}: missing data, expected a caption line and at least one row", origin),
    )
}

#[cfg(test)]
mod tests {
    use super::{normalize_caption, parse_table};
    use crate::modules::timeseries::DelimiterFormat;

    #[test]
    fn normalizes_units_quotes_and_instance_prefix() {
        assert_eq!(normalize_caption("Time [s]", Some("slave1")), "Time");
        assert_eq!(normalize_caption("slave1.h [m]", Some("slave1")), "h");
        assert_eq!(normalize_caption("\"v\"", Some("slave1")), "v");
        assert_eq!(normalize_caption("T [deg [C]]", None), "T");
        assert_eq!(normalize_caption("slave1.h", None), "slave1.h");
        assert_eq!(normalize_caption("slave10.h", Some("slave1")), "slave10.h");
        assert_eq!(normalize_caption("x]y[", None), "x]y[");
    }

    #[test]
    fn parses_tab_separated_rows_with_trailing_delimiters() {
        let table = parse_table(
            "Time [s]\tslave1.h [m]\t\n0\t1.5\t\n1\t2.5\t\n",
            "values.csv",
            Some("slave1"),
        )
        .expect("tab table should parse");

        assert_eq!(table.format, DelimiterFormat::Tab);
        assert_eq!(table.captions, vec!["Time", "h"]);
        assert_eq!(table.columns, vec![vec![0.0, 1.0], vec![1.5, 2.5]]);
        assert_eq!(table.rows[1], vec!["1", "2.5"]);
    }

    #[test]
    fn parses_comma_separated_rows_with_quoted_captions() {
        let table = parse_table(
            "\"time\", \"h\",\"v\"\n0.0,1.0,nan\n0.5,0.9,-1.0\n",
            "ref.csv",
            None,
        )
        .expect("comma table should parse");

        assert_eq!(table.format, DelimiterFormat::Comma);
        assert_eq!(table.captions, vec!["time", "h", "v"]);
        assert!(table.columns[2][0].is_nan());
        assert_eq!(table.columns[2][1], -1.0);
    }

    #[test]
    fn row_with_wrong_token_count_names_file_and_line() {
        let error = parse_table("time,h\n0,1\n1\n", "ref.csv", None)
            .expect_err("short row should fail");
        assert_eq!(error.placeholder(), "PARSE.TIMESERIES_ROW");
        assert!(error.message().contains("ref.csv"));
        assert!(error.message().contains("line 3"));
    }

    #[test]
    fn non_numeric_token_is_a_parse_error() {
        let error = parse_table("time\th\n0\tabc\n", "values.csv", None)
            .expect_err("non-numeric token should fail");
        assert_eq!(error.placeholder(), "PARSE.TIMESERIES_VALUE");
        assert!(error.message().contains("'abc'"));
    }

    #[test]
    fn caption_line_alone_is_missing_data() {
        let error = parse_table("time\th\n\n", "values.csv", None)
            .expect_err("file without rows should fail");
        assert_eq!(error.placeholder(), "PARSE.TIMESERIES_MISSING_DATA");
    }
}
