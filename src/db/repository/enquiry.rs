use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{timestamp_from_sql, timestamp_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

const ENQUIRY_COLUMNS: &str = "e.id, e.enquiry_code, e.status, e.version,
    e.patient_name, e.patient_age, e.patient_gender,
    e.identity_kind, e.abha_number, e.pm_jay_number, e.aadhar_number, e.pan_number,
    e.medical_condition, e.chief_complaint, e.vitals,
    e.source_hospital_id, e.destination_hospital_id, e.district_id, e.transportation_category,
    e.contact_name, e.contact_phone, e.contact_email,
    e.ambulance_id, e.submitted_by_user_id, e.created_at, e.updated_at";

struct EnquiryRow {
    id: String,
    enquiry_code: String,
    status: String,
    version: i64,
    patient_name: String,
    patient_age: i64,
    patient_gender: String,
    identity_kind: String,
    abha_number: Option<String>,
    pm_jay_number: Option<String>,
    aadhar_number: Option<String>,
    pan_number: Option<String>,
    medical_condition: String,
    chief_complaint: String,
    vitals: String,
    source_hospital_id: String,
    destination_hospital_id: String,
    district_id: String,
    transportation_category: String,
    contact_name: String,
    contact_phone: String,
    contact_email: Option<String>,
    ambulance_id: Option<String>,
    submitted_by_user_id: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EnquiryRow> {
    Ok(EnquiryRow {
        id: row.get(0)?,
        enquiry_code: row.get(1)?,
        status: row.get(2)?,
        version: row.get(3)?,
        patient_name: row.get(4)?,
        patient_age: row.get(5)?,
        patient_gender: row.get(6)?,
        identity_kind: row.get(7)?,
        abha_number: row.get(8)?,
        pm_jay_number: row.get(9)?,
        aadhar_number: row.get(10)?,
        pan_number: row.get(11)?,
        medical_condition: row.get(12)?,
        chief_complaint: row.get(13)?,
        vitals: row.get(14)?,
        source_hospital_id: row.get(15)?,
        destination_hospital_id: row.get(16)?,
        district_id: row.get(17)?,
        transportation_category: row.get(18)?,
        contact_name: row.get(19)?,
        contact_phone: row.get(20)?,
        contact_email: row.get(21)?,
        ambulance_id: row.get(22)?,
        submitted_by_user_id: row.get(23)?,
        created_at: row.get(24)?,
        updated_at: row.get(25)?,
    })
}

fn missing(field: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        field: field.into(),
        value: "NULL".into(),
    }
}

fn enquiry_from_row(row: EnquiryRow) -> Result<Enquiry, DatabaseError> {
    let identity = match IdentityKind::from_str(&row.identity_kind)? {
        IdentityKind::Abha => IdentityProof::Abha {
            number: row.abha_number.ok_or_else(|| missing("abha_number"))?,
        },
        IdentityKind::PmJay => IdentityProof::PmJay {
            number: row.pm_jay_number.ok_or_else(|| missing("pm_jay_number"))?,
        },
        IdentityKind::AadharPan => IdentityProof::AadharPan {
            aadhar: row.aadhar_number.ok_or_else(|| missing("aadhar_number"))?,
            pan: row.pan_number.ok_or_else(|| missing("pan_number"))?,
        },
    };

    Ok(Enquiry {
        id: uuid_from_sql("enquiries.id", &row.id)?,
        enquiry_code: row.enquiry_code,
        status: EnquiryStatus::from_str(&row.status)?,
        version: row.version,
        patient: Patient {
            name: row.patient_name,
            age: u8::try_from(row.patient_age).map_err(|_| DatabaseError::InvalidValue {
                field: "patient_age".into(),
                value: row.patient_age.to_string(),
            })?,
            gender: Gender::from_str(&row.patient_gender)?,
        },
        identity,
        medical: Medical {
            condition: row.medical_condition,
            chief_complaint: row.chief_complaint,
            vitals: Vitals::from_str(&row.vitals)?,
        },
        logistics: Logistics {
            source_hospital_id: uuid_from_sql("source_hospital_id", &row.source_hospital_id)?,
            destination_hospital_id: uuid_from_sql(
                "destination_hospital_id",
                &row.destination_hospital_id,
            )?,
            district_id: uuid_from_sql("district_id", &row.district_id)?,
            transportation_category: TransportationCategory::from_str(
                &row.transportation_category,
            )?,
        },
        contact: Contact {
            name: row.contact_name,
            phone: row.contact_phone,
            email: row.contact_email,
        },
        ambulance_id: row
            .ambulance_id
            .as_deref()
            .map(|id| uuid_from_sql("ambulance_id", id))
            .transpose()?,
        submitted_by_user_id: uuid_from_sql("submitted_by_user_id", &row.submitted_by_user_id)?,
        created_at: timestamp_from_sql("enquiries.created_at", &row.created_at)?,
        updated_at: timestamp_from_sql("enquiries.updated_at", &row.updated_at)?,
    })
}

pub fn insert_enquiry(conn: &Connection, enquiry: &Enquiry) -> Result<(), DatabaseError> {
    let (abha, pm_jay, aadhar, pan) = match &enquiry.identity {
        IdentityProof::Abha { number } => (Some(number), None, None, None),
        IdentityProof::PmJay { number } => (None, Some(number), None, None),
        IdentityProof::AadharPan { aadhar, pan } => (None, None, Some(aadhar), Some(pan)),
    };

    conn.execute(
        "INSERT INTO enquiries (id, enquiry_code, status, version,
         patient_name, patient_age, patient_gender,
         identity_kind, abha_number, pm_jay_number, aadhar_number, pan_number,
         medical_condition, chief_complaint, vitals,
         source_hospital_id, destination_hospital_id, district_id, transportation_category,
         contact_name, contact_phone, contact_email,
         ambulance_id, submitted_by_user_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
        params![
            enquiry.id.to_string(),
            enquiry.enquiry_code,
            enquiry.status.as_str(),
            enquiry.version,
            enquiry.patient.name,
            i64::from(enquiry.patient.age),
            enquiry.patient.gender.as_str(),
            enquiry.identity.kind().as_str(),
            abha,
            pm_jay,
            aadhar,
            pan,
            enquiry.medical.condition,
            enquiry.medical.chief_complaint,
            enquiry.medical.vitals.as_str(),
            enquiry.logistics.source_hospital_id.to_string(),
            enquiry.logistics.destination_hospital_id.to_string(),
            enquiry.logistics.district_id.to_string(),
            enquiry.logistics.transportation_category.as_str(),
            enquiry.contact.name,
            enquiry.contact.phone,
            enquiry.contact.email,
            enquiry.ambulance_id.map(|id| id.to_string()),
            enquiry.submitted_by_user_id.to_string(),
            timestamp_to_sql(&enquiry.created_at),
            timestamp_to_sql(&enquiry.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_enquiry(conn: &Connection, id: &Uuid) -> Result<Option<Enquiry>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ENQUIRY_COLUMNS} FROM enquiries e WHERE e.id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(enquiry_from_row).transpose()
}

/// Append the visibility predicate for `scope` on table alias `e`.
pub(crate) fn push_scope(
    sql: &mut String,
    params_vec: &mut Vec<Box<dyn rusqlite::types::ToSql>>,
    scope: &AccessScope,
) {
    match scope {
        AccessScope::All => {}
        AccessScope::SubmittedBy(user_id) => {
            params_vec.push(Box::new(user_id.to_string()));
            sql.push_str(&format!(" AND e.submitted_by_user_id = ?{}", params_vec.len()));
        }
        AccessScope::District(district_id) => {
            params_vec.push(Box::new(district_id.to_string()));
            sql.push_str(&format!(" AND e.district_id = ?{}", params_vec.len()));
        }
        AccessScope::Nothing => sql.push_str(" AND 0"),
    }
}

fn day_start(date: NaiveDate) -> String {
    let start: DateTime<Utc> = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    timestamp_to_sql(&start)
}

/// List enquiries newest first, restricted to `scope` and narrowed by `filter`.
pub fn list_enquiries(
    conn: &Connection,
    filter: &EnquiryFilter,
    scope: &AccessScope,
) -> Result<Vec<Enquiry>, DatabaseError> {
    let mut sql = format!("SELECT {ENQUIRY_COLUMNS} FROM enquiries e WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    push_scope(&mut sql, &mut params_vec, scope);

    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND e.status = ?{}", params_vec.len()));
    }
    if let Some(district) = filter.district_id {
        params_vec.push(Box::new(district.to_string()));
        sql.push_str(&format!(" AND e.district_id = ?{}", params_vec.len()));
    }
    if let Some(from) = filter.date_from {
        params_vec.push(Box::new(day_start(from)));
        sql.push_str(&format!(" AND e.created_at >= ?{}", params_vec.len()));
    }
    if let Some(to) = filter.date_to {
        // Inclusive end date: everything before the start of the next day
        params_vec.push(Box::new(day_start(to + Duration::days(1))));
        sql.push_str(&format!(" AND e.created_at < ?{}", params_vec.len()));
    }
    if let Some(submitter) = filter.submitted_by {
        params_vec.push(Box::new(submitter.to_string()));
        sql.push_str(&format!(" AND e.submitted_by_user_id = ?{}", params_vec.len()));
    }

    sql.push_str(" ORDER BY e.created_at DESC, e.enquiry_code DESC");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(param_refs.as_slice(), read_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(enquiry_from_row).collect()
}

/// Next human-readable code for the given day, e.g. `ENQ-20261019-0007`.
///
/// Must run inside the write transaction that inserts the enquiry.
pub fn next_enquiry_code(conn: &Connection, day: NaiveDate) -> Result<String, DatabaseError> {
    let prefix = format!("ENQ-{}-", day.format("%Y%m%d"));
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM enquiries WHERE enquiry_code LIKE ?1 || '%'",
        params![prefix],
        |row| row.get(0),
    )?;
    Ok(format!("{prefix}{:04}", count + 1))
}

/// Compare-and-swap on `version`. Returns `false` when another writer got there first.
pub fn update_enquiry_status(
    conn: &Connection,
    id: &Uuid,
    expected_version: i64,
    status: EnquiryStatus,
    ambulance_id: Option<&Uuid>,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE enquiries SET status = ?3, version = version + 1, ambulance_id = ?4, updated_at = ?5
         WHERE id = ?1 AND version = ?2",
        params![
            id.to_string(),
            expected_version,
            status.as_str(),
            ambulance_id.map(|a| a.to_string()),
            timestamp_to_sql(now),
        ],
    )?;
    Ok(rows == 1)
}

/// Delete an enquiry; documents, queries and escalations cascade.
/// Returns the stored paths of its documents so the caller can remove the files.
pub fn delete_enquiry(conn: &Connection, id: &Uuid) -> Result<Vec<String>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT stored_path FROM enquiry_documents WHERE enquiry_id = ?1")?;
    let paths = stmt
        .query_map(params![id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let rows = conn.execute("DELETE FROM enquiries WHERE id = ?1", params![id.to_string()])?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Enquiry".into(),
            id: id.to_string(),
        });
    }
    Ok(paths)
}
