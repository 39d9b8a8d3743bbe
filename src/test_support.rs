//! Shared fixtures for unit tests across modules.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::models::enums::*;
use crate::models::*;
use crate::workflow::intake::CreateEnquiry;
use crate::workflow::Actor;

pub struct Directory {
    pub district: District,
    pub source: Hospital,
    pub destination: Hospital,
}

/// One district with two hospitals in it.
pub fn seed_directory(conn: &Connection) -> Directory {
    let district = District {
        id: Uuid::new_v4(),
        name: format!("Dehradun {}", &Uuid::new_v4().simple().to_string()[..6]),
        state: "Uttarakhand".into(),
    };
    repository::insert_district(conn, &district).unwrap();

    let hospital = |name: &str| Hospital {
        id: Uuid::new_v4(),
        name: name.into(),
        district_id: district.id,
        address: None,
        contact_phone: None,
    };
    let source = hospital("District Hospital");
    let destination = hospital("AIIMS Rishikesh");
    repository::insert_hospital(conn, &source).unwrap();
    repository::insert_hospital(conn, &destination).unwrap();

    Directory { district, source, destination }
}

pub fn user_fixture(role: Role, district_id: Option<Uuid>, email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: email.split('@').next().unwrap_or(email).to_string(),
        email: email.into(),
        phone: None,
        role,
        district_id,
        password_hash: "unused".into(),
        created_at: Utc::now(),
    }
}

pub fn seed_user(conn: &Connection, role: Role, district_id: Option<Uuid>, email: &str) -> User {
    let user = user_fixture(role, district_id, email);
    repository::insert_user(conn, &user).unwrap();
    user
}

pub fn actor_for(user: &User) -> Actor {
    Actor {
        user_id: user.id,
        role: user.role,
        district_id: user.district_id,
    }
}

pub fn sample_command(dir: &Directory) -> CreateEnquiry {
    CreateEnquiry {
        patient: Patient {
            name: "Asha Devi".into(),
            age: 54,
            gender: Gender::Female,
        },
        identity: IdentityProof::Abha {
            number: "12345678901234".into(),
        },
        medical: Medical {
            condition: "Cardiac arrest".into(),
            chief_complaint: "Chest pain".into(),
            vitals: Vitals::Unstable,
        },
        logistics: Logistics {
            source_hospital_id: dir.source.id,
            destination_hospital_id: dir.destination.id,
            district_id: dir.district.id,
            transportation_category: TransportationCategory::Air,
        },
        contact: Contact {
            name: "Ravi Kumar".into(),
            phone: "9876543210".into(),
            email: Some("ravi@example.org".into()),
        },
    }
}

/// A PENDING enquiry with a unique code, not yet inserted.
pub fn sample_enquiry(dir: &Directory, submitted_by: Uuid) -> Enquiry {
    let command = sample_command(dir);
    let id = Uuid::new_v4();
    let now = Utc::now();
    Enquiry {
        id,
        enquiry_code: format!("ENQ-TEST-{}", id.simple()),
        status: EnquiryStatus::Pending,
        version: 0,
        patient: command.patient,
        identity: command.identity,
        medical: command.medical,
        logistics: command.logistics,
        contact: command.contact,
        ambulance_id: None,
        submitted_by_user_id: submitted_by,
        created_at: now,
        updated_at: now,
    }
}

pub fn seed_ambulance(conn: &Connection, call_sign: &str, status: AmbulanceStatus) -> Ambulance {
    let now = Utc::now();
    let ambulance = Ambulance {
        id: Uuid::new_v4(),
        registration_number: format!("VT-{}", &Uuid::new_v4().simple().to_string()[..8]),
        call_sign: call_sign.into(),
        kind: AmbulanceKind::Helicopter,
        base_district_id: None,
        status,
        created_at: now,
        updated_at: now,
    };
    repository::insert_ambulance(conn, &ambulance).unwrap();
    ambulance
}
