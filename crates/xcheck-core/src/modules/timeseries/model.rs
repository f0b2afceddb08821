use crate::domain::{XcheckError, XcheckResult};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterFormat {
    Tab,
    Comma,
}

impl DelimiterFormat {
    pub const fn delimiter(self) -> u8 {
        match self {
            Self::Tab => b'\t',
            Self::Comma => b',',
        }
    }

    /// A caption line that splits into more than one tab token is tab-separated;
    /// everything else is read as comma/quote-delimited.
    pub fn detect(caption_line: &str) -> Self {
        if caption_line.trim().split('\t').count() > 1 {
            Self::Tab
        } else {
            Self::Comma
        }
    }
}

/// Named columns over a shared time axis. Column 0 is always time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    captions: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl TimeSeries {
    pub fn new(captions: Vec<String>, columns: Vec<Vec<f64>>) -> XcheckResult<Self> {
        if captions.is_empty() {
            return Err(XcheckError::parse(
                "PARSE.TIMESERIES_CAPTIONS",
                "time series has no columns",
            ));
        }
        if captions.len() != columns.len() {
            return Err(XcheckError::parse(
                "PARSE.TIMESERIES_CAPTIONS",
                format!(
                    "time series has {} captions but {} columns",
                    captions.len(),
                    columns.len()
                ),
            ));
        }

        let mut seen = BTreeSet::new();
        for caption in &captions {
            if !seen.insert(caption.as_str()) {
                return Err(XcheckError::parse(
                    "PARSE.TIMESERIES_CAPTIONS",
                    format!("duplicate caption '{}'", caption),
                ));
            }
        }

        let sample_count = columns[0].len();
        if let Some((index, column)) = columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.len() != sample_count)
        {
            return Err(XcheckError::parse(
                "PARSE.TIMESERIES_CAPTIONS",
                format!(
                    "column '{}' has {} samples, expected {}",
                    captions[index],
                    column.len(),
                    sample_count
                ),
            ));
        }

        let time = &columns[0];
        if let Some(position) = time.iter().position(|value| !value.is_finite()) {
            return Err(XcheckError::parse(
                "PARSE.TIMESERIES_TIME",
                format!("time value at sample {} is not finite", position + 1),
            ));
        }
        if let Some(position) = time.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(XcheckError::parse(
                "PARSE.TIMESERIES_TIME",
                format!(
                    "time decreases from {} to {} at sample {}",
                    time[position],
                    time[position + 1],
                    position + 2
                ),
            ));
        }

        Ok(Self { captions, columns })
    }

    pub fn captions(&self) -> &[String] {
        &self.captions
    }

    pub fn variable_captions(&self) -> impl Iterator<Item = &str> {
        self.captions.iter().skip(1).map(String::as_str)
    }

    pub fn time(&self) -> &[f64] {
        &self.columns[0]
    }

    pub fn sample_count(&self) -> usize {
        self.columns[0].len()
    }

    pub fn column_index(&self, caption: &str) -> Option<usize> {
        self.captions.iter().position(|candidate| candidate == caption)
    }

    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn column_by_caption(&self, caption: &str) -> Option<&[f64]> {
        self.column_index(caption)
            .and_then(|index| self.column(index))
    }

    /// NaN marks a missing sample.
    pub fn is_missing(value: f64) -> bool {
        value.is_nan()
    }
}
