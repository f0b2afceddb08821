//! Section-based result files: a `KEY = value` header closed by an `INDICES`
//! line, followed by whitespace-separated samples (time first).

mod geometry;
mod parser;

pub use geometry::{
    Axis, GeometryModel, GeometryStore, GridElement, ProfileCut, ProfileDirection,
};

use super::timeseries::TimeSeries;
use crate::domain::{XcheckError, XcheckResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResultFile {
    origin: PathBuf,
    version: Option<u8>,
    header: BTreeMap<String, String>,
    quantities: Vec<String>,
    indices: Vec<usize>,
    time_points: Vec<f64>,
    values: Vec<Vec<f64>>,
    profile: Option<ProfileCut>,
}

impl StructuredResultFile {
    pub fn read(path: impl AsRef<Path>, geometry: &mut GeometryStore) -> XcheckResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            XcheckError::parse(
                "PARSE.STRUCTURED_READ",
                format!("failed to read result file '{}': {}", path.display(), source),
            )
        })?;
        Self::parse_str(&source, path, geometry)
    }

    /// Parses `source`; a `GEO_FILE` reference is resolved against the parent
    /// directory of `origin`.
    pub fn parse_str(
        source: &str,
        origin: impl Into<PathBuf>,
        geometry: &mut GeometryStore,
    ) -> XcheckResult<Self> {
        let origin = origin.into();
        let label = origin.display().to_string();
        let lines = source.lines().collect::<Vec<_>>();

        let header = parser::parse_header(&lines, &label)?;
        parser::require_keys(&header.entries, &label)?;
        let quantities = header
            .entries
            .get("QUANTITY")
            .map(String::as_str)
            .map(parser::quantity_names)
            .unwrap_or_default();

        let output_type = header_entry(&header.entries, "TYPE");
        let space_type = header_entry(&header.entries, "SPACE_TYPE");
        let multiple_indices = header.indices.len() > 1;
        if multiple_indices && space_type == "SINGLE" && output_type == "FLUX" {
            return Err(XcheckError::parse(
                "PARSE.STRUCTURED_FLUX",
                format!(
                    "{}: flux outputs with SPACE_TYPE = SINGLE are only supported for a single side, found {} indices",
                    label,
                    header.indices.len()
                ),
            ));
        }

        let profile = if multiple_indices && space_type == "SINGLE" && output_type == "FIELD" {
            let geo_name = header.entries.get("GEO_FILE").ok_or_else(|| {
                XcheckError::parse(
                    "PARSE.STRUCTURED_HEADER",
                    format!("{}: missing GEO_FILE for field profile output", label),
                )
            })?;
            let geo_path = origin
                .parent()
                .map(|dir| dir.join(geo_name))
                .unwrap_or_else(|| PathBuf::from(geo_name));
            let model = geometry.get_or_load(&geo_path)?;
            Some(model.profile_cut(&header.indices)?)
        } else {
            None
        };

        let row_width = header.indices.len().max(quantities.len());
        let body = parser::parse_body(&lines, header.body_start, row_width, &label)?;

        Ok(Self {
            origin,
            version: header.version,
            header: header.entries,
            quantities,
            indices: header.indices,
            time_points: body.time_points,
            values: body.values,
            profile,
        })
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.header.get(key).map(String::as_str)
    }

    pub fn output_type(&self) -> &str {
        header_entry(&self.header, "TYPE")
    }

    pub fn space_type(&self) -> &str {
        header_entry(&self.header, "SPACE_TYPE")
    }

    pub fn time_unit(&self) -> &str {
        header_entry(&self.header, "TIME_UNIT")
    }

    pub fn quantities(&self) -> &[String] {
        &self.quantities
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn profile(&self) -> Option<&ProfileCut> {
        self.profile.as_ref()
    }

    pub fn time_points(&self) -> &[f64] {
        &self.time_points
    }

    pub fn sample_count(&self) -> usize {
        self.values.len()
    }

    pub fn time_points_in_seconds(&self) -> XcheckResult<Vec<f64>> {
        let factor = parser::seconds_per_unit(self.time_unit()).ok_or_else(|| {
            XcheckError::parse(
                "PARSE.STRUCTURED_TIME_UNIT",
                format!(
                    "{}: unknown time unit '{}'",
                    self.origin.display(),
                    self.time_unit()
                ),
            )
        })?;
        Ok(self.time_points.iter().map(|time| time * factor).collect())
    }

    /// Values recorded at exactly `time` (in the file's own time unit).
    pub fn values_at_time(&self, time: f64) -> XcheckResult<&[f64]> {
        self.time_points
            .iter()
            .position(|candidate| *candidate == time)
            .map(|index| self.values[index].as_slice())
            .ok_or_else(|| {
                XcheckError::parse(
                    "PARSE.STRUCTURED_TIME",
                    format!(
                        "{}: time {} does not match any output time point",
                        self.origin.display(),
                        time
                    ),
                )
            })
    }

    pub fn values_at_index(&self, sample: usize) -> XcheckResult<&[f64]> {
        self.values.get(sample).map(Vec::as_slice).ok_or_else(|| {
            XcheckError::parse(
                "PARSE.STRUCTURED_INDEX",
                format!(
                    "{}: sample index {} out of range ({} samples)",
                    self.origin.display(),
                    sample,
                    self.values.len()
                ),
            )
        })
    }

    /// One value column across all samples.
    pub fn column(&self, column: usize) -> XcheckResult<Vec<f64>> {
        self.values
            .iter()
            .map(|row| {
                row.get(column).copied().ok_or_else(|| {
                    XcheckError::parse(
                        "PARSE.STRUCTURED_INDEX",
                        format!(
                            "{}: column {} out of range ({} columns)",
                            self.origin.display(),
                            column,
                            row.len()
                        ),
                    )
                })
            })
            .collect()
    }

    /// Exposes the samples as a time series with times converted to seconds.
    ///
    /// Columns are named after the quantities when there is one per column, or
    /// `quantity[index]` when a single quantity spans several indices.
    pub fn to_time_series(&self) -> XcheckResult<TimeSeries> {
        let width = self.values.first().map(Vec::len).unwrap_or_default();
        let value_captions = if self.quantities.len() == width {
            self.quantities.clone()
        } else if self.quantities.len() == 1 {
            self.indices
                .iter()
                .map(|index| format!("{}[{}]", self.quantities[0], index))
                .collect()
        } else {
            return Err(XcheckError::parse(
                "PARSE.STRUCTURED_QUANTITY",
                format!(
                    "{}: cannot name {} columns from {} quantities",
                    self.origin.display(),
                    width,
                    self.quantities.len()
                ),
            ));
        };

        let mut captions = vec!["Time".to_string()];
        captions.extend(value_captions);
        let mut columns = vec![self.time_points_in_seconds()?];
        for column in 0..width {
            columns.push(self.column(column)?);
        }

        TimeSeries::new(captions, columns).map_err(|error| {
            XcheckError::parse(
                error.placeholder(),
                format!("{}: {}", self.origin.display(), error.message()),
            )
        })
    }
}

fn header_entry<'a>(entries: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    entries.get(key).map(String::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{GeometryStore, ProfileDirection, StructuredResultFile};
    use crate::domain::XcheckErrorCategory;
    use std::fs;
    use tempfile::TempDir;

    const MEAN_OUTPUT: &str = "D6OARLZ! 006.000\n\
        TYPE          = REFERENCE\n\
        PROJECT_FILE  = wall.d6p\n\
        SPACE_TYPE    = MEAN\n\
        TIME_UNIT     = h\n\
        QUANTITY      = Model.T | Model.RH\n\
        INDICES       = 0\n\
        \n\
        0    20.0   0.5\n\
        1    20.5   0.55\n\
        2    21.0   0.6\n";

    const GEOMETRY: &str = "D6GARLZ! 006.000\n\
        TABLE  GRID\n\
        0.1 0.2 0.3\n\
        0.5\n\
        1\n\
        TABLE  ELEMENT_GEOMETRY\n\
        0  0.05  0.25  0  0  1\n\
        1  0.2   0.25  1  0  1\n\
        2  0.45  0.25  2  0  1\n";

    fn field_output(geo_line: &str) -> String {
        format!(
            "D6OARLZ! 007.000\n\
             TYPE       = FIELD\n\
             SPACE_TYPE = SINGLE\n\
             TIME_UNIT  = min\n\
             QUANTITY   = Wall.T\n\
             {}\n\
             INDICES    = 0 1 2\n\
             0   10 11 12\n\
             30  13 14 15\n",
            geo_line
        )
    }

    #[test]
    fn parses_mean_output_and_exposes_access_operations() {
        let mut store = GeometryStore::new();
        let file = StructuredResultFile::parse_str(MEAN_OUTPUT, "T.d6o", &mut store)
            .expect("mean output should parse");

        assert_eq!(file.version(), Some(6));
        assert_eq!(file.output_type(), "REFERENCE");
        assert_eq!(file.header_value("PROJECT_FILE"), Some("wall.d6p"));
        assert_eq!(file.quantities(), &["T".to_string(), "RH".to_string()]);
        assert_eq!(file.sample_count(), 3);
        assert_eq!(file.values_at_time(1.0).expect("time 1 exists"), &[20.5, 0.55]);
        assert_eq!(file.values_at_index(2).expect("index 2 exists"), &[21.0, 0.6]);
        assert_eq!(file.column(1).expect("column 1 exists"), vec![0.5, 0.55, 0.6]);
        assert!(file.profile().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn access_errors_are_reported() {
        let mut store = GeometryStore::new();
        let file = StructuredResultFile::parse_str(MEAN_OUTPUT, "T.d6o", &mut store)
            .expect("mean output should parse");

        let error = file.values_at_time(1.5).expect_err("inexact time should fail");
        assert_eq!(error.category(), XcheckErrorCategory::ParseError);
        assert_eq!(error.placeholder(), "PARSE.STRUCTURED_TIME");
        assert!(file.values_at_index(3).is_err());
        assert!(file.column(2).is_err());
    }

    #[test]
    fn converts_to_time_series_in_seconds() {
        let mut store = GeometryStore::new();
        let file = StructuredResultFile::parse_str(MEAN_OUTPUT, "T.d6o", &mut store)
            .expect("mean output should parse");

        let series = file.to_time_series().expect("series should build");
        assert_eq!(series.captions(), &["Time", "T", "RH"]);
        assert_eq!(series.time(), &[0.0, 3600.0, 7200.0]);
        assert_eq!(series.column_by_caption("RH"), Some(&[0.5, 0.55, 0.6][..]));
    }

    #[test]
    fn field_profile_resolves_geometry_beside_result_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(temp.path().join("wall.g6a"), GEOMETRY).expect("geometry should be written");
        let path = temp.path().join("T_profile.d6o");
        fs::write(&path, field_output("GEO_FILE   = wall.g6a")).expect("output should be written");

        let mut store = GeometryStore::new();
        let file = StructuredResultFile::read(&path, &mut store).expect("field output should parse");
        let profile = file.profile().expect("profile should be derived");

        assert_eq!(profile.direction, ProfileDirection::X);
        assert_eq!(profile.coordinates, vec![0.05, 0.2, 0.45]);
        assert_eq!(profile.steps, vec![0.1, 0.2, 0.3]);
        assert_eq!(store.len(), 1);

        let series = file.to_time_series().expect("series should build");
        assert_eq!(series.captions(), &["Time", "T[0]", "T[1]", "T[2]"]);
        assert_eq!(series.time(), &[0.0, 1800.0]);

        StructuredResultFile::read(&path, &mut store).expect("second read should parse");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn field_profile_without_geometry_reference_fails() {
        let mut store = GeometryStore::new();
        let error = StructuredResultFile::parse_str(&field_output(""), "T.d6o", &mut store)
            .expect_err("missing GEO_FILE should fail");
        assert!(error.message().contains("GEO_FILE"));
    }

    #[test]
    fn multi_side_flux_output_is_rejected() {
        let source = field_output("").replace("FIELD", "FLUX");
        let mut store = GeometryStore::new();
        let error = StructuredResultFile::parse_str(&source, "Q.d6o", &mut store)
            .expect_err("multi-side flux should fail");
        assert_eq!(error.placeholder(), "PARSE.STRUCTURED_FLUX");
    }

    #[test]
    fn missing_required_key_and_unknown_unit_fail() {
        let mut store = GeometryStore::new();
        let source = MEAN_OUTPUT.replace("QUANTITY      = Model.T | Model.RH\n", "");
        let error = StructuredResultFile::parse_str(&source, "T.d6o", &mut store)
            .expect_err("missing QUANTITY should fail");
        assert!(error.message().contains("QUANTITY"));

        let source = MEAN_OUTPUT.replace("= h", "= fortnight");
        let file = StructuredResultFile::parse_str(&source, "T.d6o", &mut store)
            .expect("unit is only checked on conversion");
        let error = file
            .time_points_in_seconds()
            .expect_err("unknown unit should fail");
        assert_eq!(error.placeholder(), "PARSE.STRUCTURED_TIME_UNIT");
    }
}
