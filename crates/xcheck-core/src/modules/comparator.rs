use super::synonyms::SynonymTable;
use super::timeseries::TimeSeries;
use crate::common::ComparisonTolerance;
use crate::common::constants::WRMS_PASS_THRESHOLD;
use crate::domain::XcheckError;
use crate::numerics::{WrmsNorm, interpolate_onto, wrms_norm};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableStatus {
    Passed,
    Failed,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableComparison {
    pub reference_caption: String,
    pub computed_caption: Option<String>,
    pub status: VariableStatus,
    pub wrms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CaseComparison {
    pub variables: Vec<VariableComparison>,
}

impl CaseComparison {
    pub fn passed(&self) -> bool {
        self.variables
            .iter()
            .all(|variable| variable.status == VariableStatus::Passed)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &VariableComparison> {
        self.variables
            .iter()
            .filter(|variable| variable.status == VariableStatus::Unresolved)
    }

    pub fn has_unresolved(&self) -> bool {
        self.unresolved().next().is_some()
    }

    /// `WRMS(name) = value` per compared variable and `name not computed` per
    /// unresolved one, joined with `;`.
    pub fn notes(&self) -> String {
        self.variables
            .iter()
            .map(|variable| match variable.wrms {
                Some(wrms) => format!("WRMS({}) = {}", variable.reference_caption, wrms),
                None => format!("{} not computed", variable.reference_caption),
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn failure_reason(&self) -> Option<&'static str> {
        if self.has_unresolved() {
            Some("missing result variables")
        } else if !self.passed() {
            Some("Results mismatch")
        } else {
            None
        }
    }

    pub fn resolution_error(&self) -> Option<XcheckError> {
        let missing = self
            .unresolved()
            .map(|variable| variable.reference_caption.as_str())
            .collect::<Vec<_>>();
        if missing.is_empty() {
            return None;
        }
        Some(XcheckError::resolution(
            "RESOLUTION.REFERENCE_VARIABLE",
            format!("no computed column for {}", missing.join(", ")),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComparisonEngine {
    tolerance: ComparisonTolerance,
}

impl ComparisonEngine {
    pub fn new(tolerance: ComparisonTolerance) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> ComparisonTolerance {
        self.tolerance
    }

    pub const fn pass_threshold() -> f64 {
        WRMS_PASS_THRESHOLD
    }

    /// A norm equal to the threshold passes. NaN never does.
    pub fn passes_threshold(norm: f64) -> bool {
        norm <= WRMS_PASS_THRESHOLD
    }

    /// Compares every reference variable except time against `computed`.
    ///
    /// Captions are matched directly first, then through `synonyms`. The computed
    /// series is interpolated onto the reference time grid and clamped at its ends.
    pub fn compare(
        &self,
        reference: &TimeSeries,
        computed: &TimeSeries,
        synonyms: &SynonymTable,
    ) -> CaseComparison {
        let mut variables = Vec::new();
        for (index, reference_caption) in reference.captions().iter().enumerate().skip(1) {
            let computed_caption = if computed.column_index(reference_caption).is_some() {
                Some(reference_caption.as_str())
            } else {
                synonyms
                    .resolve(reference_caption)
                    .filter(|canonical| computed.column_index(canonical).is_some())
            };

            let (Some(computed_caption), Some(reference_values)) =
                (computed_caption, reference.column(index))
            else {
                info!("  '{}' not computed.", reference_caption);
                variables.push(VariableComparison {
                    reference_caption: reference_caption.clone(),
                    computed_caption: None,
                    status: VariableStatus::Unresolved,
                    wrms: None,
                });
                continue;
            };

            let computed_values = computed
                .column_by_caption(computed_caption)
                .unwrap_or_default();
            let norm = self.compare_values(
                reference.time(),
                reference_values,
                computed.time(),
                computed_values,
            );
            info!("  WRMS({}) = {}", reference_caption, norm.value);
            debug!(
                "  compared {} samples of '{}' against '{}' with AbsTol = {}",
                norm.sample_count, reference_caption, computed_caption, norm.abs_tol
            );

            variables.push(VariableComparison {
                reference_caption: reference_caption.clone(),
                computed_caption: Some(computed_caption.to_string()),
                status: if Self::passes_threshold(norm.value) {
                    VariableStatus::Passed
                } else {
                    VariableStatus::Failed
                },
                wrms: Some(norm.value),
            });
        }

        CaseComparison { variables }
    }

    pub fn compare_values(
        &self,
        reference_time: &[f64],
        reference_values: &[f64],
        computed_time: &[f64],
        computed_values: &[f64],
    ) -> WrmsNorm {
        let interpolated = interpolate_onto(computed_time, computed_values, reference_time);
        wrms_norm(reference_values, &interpolated, self.tolerance)
    }
}
