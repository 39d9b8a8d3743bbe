//! Patient identity proof: exactly one of ABHA, PM-JAY, or an Aadhar + PAN pair.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::WorkflowError;
use crate::models::IdentityProof;

static ABHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{14}$").unwrap());
static PM_JAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{9}$").unwrap());
static AADHAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{12}$").unwrap());
static PAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{5}\d{4}[A-Z]$").unwrap());

/// Raw card numbers as submitted; blank strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityFields {
    pub abha_number: Option<String>,
    pub pm_jay_number: Option<String>,
    pub aadhar_number: Option<String>,
    pub pan_number: Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate the submitted card numbers into a single `IdentityProof`.
pub fn resolve_identity(fields: &IdentityFields) -> Result<IdentityProof, WorkflowError> {
    let abha = present(&fields.abha_number);
    let pm_jay = present(&fields.pm_jay_number);
    let aadhar = present(&fields.aadhar_number);
    let pan = present(&fields.pan_number).map(|p| p.to_ascii_uppercase());

    let pair_given = aadhar.is_some() || pan.is_some();
    let groups = [abha.is_some(), pm_jay.is_some(), pair_given]
        .iter()
        .filter(|given| **given)
        .count();

    if groups == 0 {
        return Err(WorkflowError::validation(
            "An identity proof is required: ABHA, PM-JAY, or Aadhar with PAN",
        ));
    }
    if groups > 1 {
        return Err(WorkflowError::validation(
            "Provide exactly one identity proof: ABHA, PM-JAY, or Aadhar with PAN",
        ));
    }

    if let Some(number) = abha {
        if !ABHA.is_match(&number) {
            return Err(WorkflowError::validation("ABHA number must be exactly 14 digits"));
        }
        return Ok(IdentityProof::Abha { number });
    }

    if let Some(number) = pm_jay {
        if !PM_JAY.is_match(&number) {
            return Err(WorkflowError::validation("PM-JAY number must be exactly 9 digits"));
        }
        return Ok(IdentityProof::PmJay { number });
    }

    match (aadhar, pan) {
        (Some(aadhar), Some(pan)) => {
            if !AADHAR.is_match(&aadhar) {
                return Err(WorkflowError::validation("Aadhar number must be exactly 12 digits"));
            }
            if !PAN.is_match(&pan) {
                return Err(WorkflowError::validation(
                    "PAN must be 5 letters, 4 digits and a letter (e.g. ABCDE1234F)",
                ));
            }
            Ok(IdentityProof::AadharPan { aadhar, pan })
        }
        _ => Err(WorkflowError::validation(
            "Aadhar and PAN must be provided together",
        )),
    }
}
