//! Delimiter-ambiguous tabular time series (`values.csv`, `<model>_ref.csv`).

mod model;
mod parser;

pub use model::{DelimiterFormat, TimeSeries};

use super::synonyms::SynonymTable;
use crate::common::constants::TIME_COLUMN_SIGNIFICANT_DIGITS;
use crate::domain::{XcheckError, XcheckResult};
use crate::numerics::format_significant;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TimeSeriesFile {
    origin: PathBuf,
    format: DelimiterFormat,
    series: TimeSeries,
    rows: Vec<Vec<String>>,
}

impl TimeSeriesFile {
    pub fn read(path: impl AsRef<Path>, instance_prefix: Option<&str>) -> XcheckResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            XcheckError::parse(
                "PARSE.TIMESERIES_READ",
                format!("failed to read time series '{}': {}", path.display(), source),
            )
        })?;
        Self::parse_str(&source, path, instance_prefix)
    }

    pub fn parse_str(
        source: &str,
        origin: impl Into<PathBuf>,
        instance_prefix: Option<&str>,
    ) -> XcheckResult<Self> {
        let origin = origin.into();
        let table = parser::parse_table(source, &origin.display().to_string(), instance_prefix)?;
        let series = TimeSeries::new(table.captions, table.columns).map_err(|error| {
            XcheckError::parse(
                error.placeholder(),
                format!("{}: {}", origin.display(), error.message()),
            )
        })?;

        Ok(Self {
            origin,
            format: table.format,
            series,
            rows: table.rows,
        })
    }

    /// Wraps an in-memory series; value tokens are rendered with full precision.
    pub fn from_series(series: TimeSeries, origin: impl Into<PathBuf>) -> Self {
        let rows = (0..series.sample_count())
            .map(|sample| {
                (0..series.captions().len())
                    .map(|column| {
                        series
                            .column(column)
                            .map(|values| values[sample].to_string())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        Self {
            origin: origin.into(),
            format: DelimiterFormat::Comma,
            series,
            rows,
        }
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn format(&self) -> DelimiterFormat {
        self.format
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn captions(&self) -> &[String] {
        self.series.captions()
    }

    pub fn column_index(&self, caption: &str) -> Option<usize> {
        self.series.column_index(caption)
    }

    /// Renders the selected columns as comma-separated text.
    ///
    /// `captions[0]` names the time column, which is always written. Every other
    /// caption must exist in this file directly or resolve through `synonyms`.
    pub fn render(&self, captions: &[String], synonyms: &SynonymTable) -> XcheckResult<String> {
        let mut selected = vec![0usize];
        for caption in captions.iter().skip(1) {
            let index = self
                .column_index(caption)
                .or_else(|| {
                    synonyms
                        .resolve(caption)
                        .and_then(|canonical| self.column_index(canonical))
                })
                .ok_or_else(|| {
                    XcheckError::resolution(
                        "RESOLUTION.EXPORT_CAPTION",
                        format!(
                            "{}: no column or synonym for '{}'",
                            self.origin.display(),
                            caption
                        ),
                    )
                })?;
            selected.push(index);
        }

        let time_caption = captions
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| self.captions()[0].as_str());
        let header = std::iter::once(time_caption)
            .chain(captions.iter().skip(1).map(String::as_str))
            .map(|caption| format!("\"{}\"", caption))
            .collect::<Vec<_>>()
            .join(",");

        let mut lines = vec![header];
        for (row, time) in self.rows.iter().zip(self.series.time()) {
            let mut tokens = vec![format_significant(*time, TIME_COLUMN_SIGNIFICANT_DIGITS)];
            tokens.extend(selected.iter().skip(1).map(|index| row[*index].clone()));
            lines.push(tokens.join(","));
        }

        let mut rendered = lines.join("\n");
        rendered.push('\n');
        Ok(rendered)
    }

    pub fn write(
        &self,
        path: impl AsRef<Path>,
        captions: &[String],
        synonyms: &SynonymTable,
    ) -> XcheckResult<()> {
        let path = path.as_ref();
        let rendered = self.render(captions, synonyms)?;
        fs::write(path, rendered).map_err(|source| {
            XcheckError::config(
                "CONFIG.EXPORT_WRITE",
                format!("failed to write time series '{}': {}", path.display(), source),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{TimeSeries, TimeSeriesFile};
    use crate::domain::XcheckErrorCategory;
    use crate::modules::synonyms::SynonymTable;
    use std::fs;
    use tempfile::TempDir;

    const COMPUTED: &str = "Time [s]\tslave1.h [m]\tslave1.v [m/s]\n\
                            0\t1.0\t0.0\n\
                            0.123456789\t0.95\t-0.5\n\
                            1\t0.5\t-1.0\n";

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn reads_file_from_disk() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("values.csv");
        fs::write(&path, COMPUTED).expect("values should be written");

        let file = TimeSeriesFile::read(&path, Some("slave1")).expect("values should parse");
        assert_eq!(file.captions(), &owned(&["Time", "h", "v"])[..]);
        assert_eq!(file.series().time(), &[0.0, 0.123456789, 1.0]);
        assert_eq!(file.column_index("v"), Some(2));
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = TimeSeriesFile::read(temp.path().join("values.csv"), None)
            .expect_err("missing file should fail");
        assert_eq!(error.category(), XcheckErrorCategory::ParseError);
        assert_eq!(error.placeholder(), "PARSE.TIMESERIES_READ");
    }

    #[test]
    fn render_reduces_time_precision_and_keeps_value_tokens() {
        let file = TimeSeriesFile::parse_str(COMPUTED, "values.csv", Some("slave1"))
            .expect("values should parse");

        let rendered = file
            .render(&owned(&["time", "v", "h"]), &SynonymTable::default())
            .expect("render should succeed");

        assert_eq!(
            rendered,
            "\"time\",\"v\",\"h\"\n0,0.0,1.0\n0.123457,-0.5,0.95\n1,-1.0,0.5\n"
        );
    }

    #[test]
    fn render_resolves_reference_captions_through_synonyms() {
        let file = TimeSeriesFile::parse_str(COMPUTED, "values.csv", Some("slave1"))
            .expect("values should parse");
        let mut synonyms = SynonymTable::default();
        synonyms.insert("h", "height");

        let rendered = file
            .render(&owned(&["time", "height"]), &synonyms)
            .expect("synonym should resolve");
        assert!(rendered.starts_with("\"time\",\"height\"\n0,1.0\n"));
    }

    #[test]
    fn render_fails_for_unresolvable_caption() {
        let file = TimeSeriesFile::parse_str(COMPUTED, "values.csv", Some("slave1"))
            .expect("values should parse");

        let error = file
            .render(&owned(&["time", "temperature"]), &SynonymTable::default())
            .expect_err("unknown caption should fail");
        assert_eq!(error.category(), XcheckErrorCategory::ResolutionError);
        assert!(error.message().contains("'temperature'"));
    }

    #[test]
    fn write_then_read_reproduces_values() {
        let temp = TempDir::new().expect("tempdir should be created");
        let source = "time\tx\ty\n0\t1.25\t-3\n0.5\t1.5\t-2.75\n2\t1e-7\t4\n";
        let file =
            TimeSeriesFile::parse_str(source, "values.csv", None).expect("values should parse");

        let out = temp.path().join("model_out.csv");
        file.write(&out, file.captions(), &SynonymTable::default())
            .expect("write should succeed");
        let reread = TimeSeriesFile::read(&out, None).expect("written file should parse");

        assert_eq!(reread.series(), file.series());
    }

    #[test]
    fn unwritable_export_target_is_a_config_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let file = TimeSeriesFile::parse_str(COMPUTED, "values.csv", Some("slave1"))
            .expect("values should parse");
        let target = temp.path().join("model_out.csv");
        fs::create_dir(&target).expect("blocking directory should be created");

        let error = file
            .write(&target, file.captions(), &SynonymTable::default())
            .expect_err("writing onto a directory should fail");
        assert_eq!(error.category(), XcheckErrorCategory::ConfigError);
        assert_eq!(error.placeholder(), "CONFIG.EXPORT_WRITE");
    }

    #[test]
    fn from_series_renders_full_precision_values() {
        let series = TimeSeries::new(owned(&["Time", "T"]), vec![vec![0.0, 60.0], vec![20.5, 21.0]])
            .expect("series should build");
        let file = TimeSeriesFile::from_series(series, "result.d6o");

        let rendered = file
            .render(&owned(&["Time", "T"]), &SynonymTable::default())
            .expect("render should succeed");
        assert_eq!(rendered, "\"Time\",\"T\"\n0,20.5\n60,21\n");
    }
}
