use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// Serde goes through the same string form, so the wire value and the
/// stored value are always identical.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(Role {
    Cmo => "CMO",
    Sdm => "SDM",
    Dm => "DM",
    Admin => "ADMIN",
    Support => "SUPPORT",
});

str_enum!(EnquiryStatus {
    Pending => "PENDING",
    Forwarded => "FORWARDED",
    Escalated => "ESCALATED",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
});

str_enum!(Gender {
    Male => "Male",
    Female => "Female",
    Other => "Other",
});

str_enum!(Vitals {
    Stable => "Stable",
    Unstable => "Unstable",
});

str_enum!(TransportationCategory {
    Air => "Air",
    Ground => "Ground",
});

str_enum!(IdentityKind {
    Abha => "ABHA",
    PmJay => "PMJAY",
    AadharPan => "AADHAR_PAN",
});

str_enum!(DocumentType {
    MedicalReport => "medical_report",
    ReferralLetter => "referral_letter",
    IdentityProof => "identity_proof",
    ConsentForm => "consent_form",
    Other => "other",
});

str_enum!(Authority {
    DistrictMagistrate => "District Magistrate",
    ChiefMedicalOfficer => "Chief Medical Officer",
    StateHealthDepartment => "State Health Department",
    EmergencyResponseTeam => "Emergency Response Team",
    SeniorMedicalAuthority => "Senior Medical Authority",
});

str_enum!(AmbulanceKind {
    FixedWing => "fixed_wing",
    Helicopter => "helicopter",
    Ground => "ground",
});

str_enum!(AmbulanceStatus {
    Available => "available",
    Dispatched => "dispatched",
    Maintenance => "maintenance",
    OutOfService => "out_of_service",
});

str_enum!(QueryStatus {
    Pending => "PENDING",
    Responded => "RESPONDED",
});

str_enum!(DateBucket {
    Today => "TODAY",
    Week => "WEEK",
    Month => "MONTH",
});

str_enum!(QuerySortKey {
    CreatedAt => "created_at",
    RespondedAt => "responded_at",
    PatientName => "patient_name",
    RaisedBy => "raised_by",
});

str_enum!(SortOrder {
    Asc => "asc",
    Desc => "desc",
});

impl EnquiryStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enquiry_status_round_trip() {
        for variant in EnquiryStatus::ALL {
            assert_eq!(EnquiryStatus::from_str(variant.as_str()).unwrap(), *variant);
        }
        assert_eq!(EnquiryStatus::InProgress.as_str(), "IN_PROGRESS");
    }

    #[test]
    fn authority_accepts_display_names() {
        assert_eq!(
            Authority::from_str("State Health Department").unwrap(),
            Authority::StateHealthDepartment
        );
        assert!(Authority::from_str("Unknown Authority").is_err());
        assert_eq!(Authority::ALL.len(), 5);
    }

    #[test]
    fn serde_uses_wire_strings() {
        let json = serde_json::to_string(&Role::Support).unwrap();
        assert_eq!(json, "\"SUPPORT\"");
        let parsed: AmbulanceStatus = serde_json::from_str("\"out_of_service\"").unwrap();
        assert_eq!(parsed, AmbulanceStatus::OutOfService);
        assert!(serde_json::from_str::<Role>("\"Cmo\"").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(EnquiryStatus::Rejected.is_terminal());
        assert!(EnquiryStatus::Completed.is_terminal());
        assert!(!EnquiryStatus::Escalated.is_terminal());
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(DocumentType::from_str("invalid").is_err());
        assert!(Vitals::from_str("stable").is_err());
        assert!(Gender::from_str("").is_err());
    }
}
