mod classifier;
mod derivation;
mod formatter;
mod normalizer;
mod payload;
mod record;

pub use classifier::{classify, Classification, FormTemplate};
pub use derivation::{
    derive, FormContext, DAY_SUITE_TREATMENT_FEE, OR_SUBSEQUENT_SUFFIX, WARD_SUBSEQUENT_SUFFIX,
};
pub use formatter::{
    describe, format_amount, format_quantity, render, AmountRowView, ChargeRowView,
    DoctorFeesView, HospitalChargesView, RenderedForm, TotalsView,
};
pub use normalizer::{money, round_money, within_limit, Normalized, AMOUNT_LIMIT};
pub use payload::{Estimate, OperatingRoom, WardEntry};
pub use record::{
    ChargeRow, DoctorFees, FormFlags, FormRecord, FormTotals, QuantityUnit, RateBasis, Slot,
};

use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("failed to read inference output: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid inference output JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inference output must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// Runs normalize, classify and derive over one inference output.
pub struct EstimateFormBuilder;

impl EstimateFormBuilder {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        context: &FormContext,
    ) -> Result<FormRecord, EstimateError> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes, context)
    }

    pub fn from_slice(bytes: &[u8], context: &FormContext) -> Result<FormRecord, EstimateError> {
        let estimate = Estimate::from_slice(bytes)?;
        Ok(Self::from_estimate(&estimate, context))
    }

    pub fn from_value(value: Value, context: &FormContext) -> Result<FormRecord, EstimateError> {
        let estimate = Estimate::from_value(value)?;
        Ok(Self::from_estimate(&estimate, context))
    }

    pub fn from_estimate(estimate: &Estimate, context: &FormContext) -> FormRecord {
        let classification = classify(estimate);
        derive(estimate, &classification, context)
    }
}
