//! Multi-step enquiry intake.
//!
//! The portal collects an enquiry over several form steps. Each step is its
//! own struct that validates on its own; `IntakeDraft` collects them and only
//! yields a `CreateEnquiry` command once every step is present and valid.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use super::identity::{resolve_identity, IdentityFields};
use super::WorkflowError;
use crate::models::enums::{Gender, TransportationCategory, Vitals};
use crate::models::{Contact, IdentityProof, Logistics, Medical, Patient};

const MAX_TEXT_LEN: usize = 2000;

/// Accept either a JSON string or a JSON number for form fields.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    }))
}

fn required(value: &Option<String>, label: &str) -> Result<String, WorkflowError> {
    let text = value.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(WorkflowError::validation(format!("{label} is required")));
    }
    if text.len() > MAX_TEXT_LEN {
        return Err(WorkflowError::validation(format!(
            "{label} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(text.to_string())
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_enum<T: FromStr>(value: &Option<String>, label: &str, allowed: &str) -> Result<T, WorkflowError> {
    required(value, label)?
        .parse()
        .map_err(|_| WorkflowError::validation(format!("{label} must be one of: {allowed}")))
}

fn parse_uuid(value: &Option<String>, label: &str) -> Result<Uuid, WorkflowError> {
    Uuid::parse_str(&required(value, label)?)
        .map_err(|_| WorkflowError::validation(format!("{label} is not a valid id")))
}

// ═══════════════════════════════════════════════════════════
// Steps
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientStep {
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub patient_age: Option<String>,
    pub patient_gender: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub abha_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pm_jay_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub aadhar_number: Option<String>,
    pub pan_number: Option<String>,
}

impl PatientStep {
    pub fn validate(&self) -> Result<(Patient, IdentityProof), WorkflowError> {
        let name = required(&self.patient_name, "Patient name")?;
        let age: u8 = required(&self.patient_age, "Patient age")?
            .parse()
            .ok()
            .filter(|age| *age <= 150)
            .ok_or_else(|| WorkflowError::validation("Patient age must be a whole number between 0 and 150"))?;
        let gender: Gender = parse_enum(&self.patient_gender, "Patient gender", "Male, Female, Other")?;
        let identity = resolve_identity(&IdentityFields {
            abha_number: self.abha_number.clone(),
            pm_jay_number: self.pm_jay_number.clone(),
            aadhar_number: self.aadhar_number.clone(),
            pan_number: self.pan_number.clone(),
        })?;
        Ok((Patient { name, age, gender }, identity))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicalStep {
    pub medical_condition: Option<String>,
    pub chief_complaint: Option<String>,
    pub vitals: Option<String>,
}

impl MedicalStep {
    pub fn validate(&self) -> Result<Medical, WorkflowError> {
        Ok(Medical {
            condition: required(&self.medical_condition, "Medical condition")?,
            chief_complaint: required(&self.chief_complaint, "Chief complaint")?,
            vitals: parse_enum::<Vitals>(&self.vitals, "Vitals", "Stable, Unstable")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogisticsStep {
    pub source_hospital_id: Option<String>,
    pub destination_hospital_id: Option<String>,
    pub district_id: Option<String>,
    pub transportation_category: Option<String>,
}

impl LogisticsStep {
    pub fn validate(&self) -> Result<Logistics, WorkflowError> {
        let source_hospital_id = parse_uuid(&self.source_hospital_id, "Source hospital")?;
        let destination_hospital_id =
            parse_uuid(&self.destination_hospital_id, "Destination hospital")?;
        if source_hospital_id == destination_hospital_id {
            return Err(WorkflowError::validation(
                "Source and destination hospitals must differ",
            ));
        }
        Ok(Logistics {
            source_hospital_id,
            destination_hospital_id,
            district_id: parse_uuid(&self.district_id, "District")?,
            transportation_category: parse_enum::<TransportationCategory>(
                &self.transportation_category,
                "Transportation category",
                "Air, Ground",
            )?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactStep {
    pub contact_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
}

impl ContactStep {
    pub fn validate(&self) -> Result<Contact, WorkflowError> {
        let name = required(&self.contact_name, "Contact name")?;
        let phone = required(&self.contact_phone, "Contact phone")?;
        if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(WorkflowError::validation("Contact phone must be 10 digits"));
        }
        let email = optional(&self.contact_email);
        if let Some(ref addr) = email {
            if !is_plausible_email(addr) {
                return Err(WorkflowError::validation("Contact email is not valid"));
            }
        }
        Ok(Contact { name, phone, email })
    }
}

pub(crate) fn is_plausible_email(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// One form step, tagged by `step` on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum IntakeStep {
    Patient(PatientStep),
    Medical(MedicalStep),
    Logistics(LogisticsStep),
    Contact(ContactStep),
}

impl IntakeStep {
    /// Validate this step on its own, without touching the draft.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        match self {
            IntakeStep::Patient(step) => step.validate().map(|_| ()),
            IntakeStep::Medical(step) => step.validate().map(|_| ()),
            IntakeStep::Logistics(step) => step.validate().map(|_| ()),
            IntakeStep::Contact(step) => step.validate().map(|_| ()),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Draft → command
// ═══════════════════════════════════════════════════════════

/// Canonical enquiry-creation command, produced only from a complete draft.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEnquiry {
    pub patient: Patient,
    pub identity: IdentityProof,
    pub medical: Medical,
    pub logistics: Logistics,
    pub contact: Contact,
}

#[derive(Debug, Clone, Default)]
pub struct IntakeDraft {
    patient: Option<PatientStep>,
    medical: Option<MedicalStep>,
    logistics: Option<LogisticsStep>,
    contact: Option<ContactStep>,
}

impl IntakeDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step, replacing any earlier submission of the same step.
    pub fn apply(&mut self, step: IntakeStep) {
        match step {
            IntakeStep::Patient(s) => self.patient = Some(s),
            IntakeStep::Medical(s) => self.medical = Some(s),
            IntakeStep::Logistics(s) => self.logistics = Some(s),
            IntakeStep::Contact(s) => self.contact = Some(s),
        }
    }

    /// Build a draft from flat form fields (multipart text parts).
    pub fn from_form(fields: &HashMap<String, String>) -> Self {
        let get = |name: &str| fields.get(name).cloned();
        let mut draft = Self::new();
        draft.apply(IntakeStep::Patient(PatientStep {
            patient_name: get("patient_name"),
            patient_age: get("patient_age"),
            patient_gender: get("patient_gender"),
            abha_number: get("abha_number"),
            pm_jay_number: get("pm_jay_number"),
            aadhar_number: get("aadhar_number"),
            pan_number: get("pan_number"),
        }));
        draft.apply(IntakeStep::Medical(MedicalStep {
            medical_condition: get("medical_condition"),
            chief_complaint: get("chief_complaint"),
            vitals: get("vitals"),
        }));
        draft.apply(IntakeStep::Logistics(LogisticsStep {
            source_hospital_id: get("source_hospital_id"),
            destination_hospital_id: get("destination_hospital_id"),
            district_id: get("district_id"),
            transportation_category: get("transportation_category"),
        }));
        draft.apply(IntakeStep::Contact(ContactStep {
            contact_name: get("contact_name"),
            contact_phone: get("contact_phone"),
            contact_email: get("contact_email"),
        }));
        draft
    }

    pub fn missing_steps(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.patient.is_none() {
            missing.push("patient");
        }
        if self.medical.is_none() {
            missing.push("medical");
        }
        if self.logistics.is_none() {
            missing.push("logistics");
        }
        if self.contact.is_none() {
            missing.push("contact");
        }
        missing
    }

    pub fn into_command(self) -> Result<CreateEnquiry, WorkflowError> {
        let missing = self.missing_steps();
        if !missing.is_empty() {
            return Err(WorkflowError::validation(format!(
                "Incomplete enquiry, missing steps: {}",
                missing.join(", ")
            )));
        }
        let (patient, identity) = self.patient.unwrap_or_default().validate()?;
        Ok(CreateEnquiry {
            patient,
            identity,
            medical: self.medical.unwrap_or_default().validate()?,
            logistics: self.logistics.unwrap_or_default().validate()?,
            contact: self.contact.unwrap_or_default().validate()?,
        })
    }
}
