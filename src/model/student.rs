use std::{fmt, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use validator::Validate;

/// Class level: `-1` Nursery, `0` KG, `1..=12` numbered grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawClassLevel", into = "i32")]
pub struct ClassLevel(i32);

impl ClassLevel {
    pub const NURSERY: ClassLevel = ClassLevel(-1);
    pub const KG: ClassLevel = ClassLevel(0);
    pub const MIN: i32 = -1;
    pub const MAX: i32 = 12;

    pub fn new(value: i32) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(ClassLevel(value))
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid class {0:?}, expected Nursery, KG or 1-12")]
pub struct InvalidClass(pub String);

impl FromStr for ClassLevel {
    type Err = InvalidClass;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        if value.eq_ignore_ascii_case("nursery") {
            return Ok(Self::NURSERY);
        }
        if value.eq_ignore_ascii_case("kg") {
            return Ok(Self::KG);
        }
        value
            .parse::<i32>()
            .ok()
            .and_then(ClassLevel::new)
            .ok_or_else(|| InvalidClass(raw.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawClassLevel {
    Number(i64),
    Text(String),
}

impl TryFrom<RawClassLevel> for ClassLevel {
    type Error = InvalidClass;

    fn try_from(raw: RawClassLevel) -> Result<Self, Self::Error> {
        match raw {
            RawClassLevel::Number(n) => i32::try_from(n)
                .ok()
                .and_then(ClassLevel::new)
                .ok_or_else(|| InvalidClass(n.to_string())),
            RawClassLevel::Text(s) => s.parse(),
        }
    }
}

impl From<ClassLevel> for i32 {
    fn from(value: ClassLevel) -> Self {
        value.0
    }
}

impl fmt::Display for ClassLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            -1 => f.write_str("Nursery"),
            0 => f.write_str("KG"),
            n => write!(f, "{n}"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum Gender {
    M,
    F,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub father_phone: Option<String>,
    pub mother_phone: Option<String>,
    #[validate(email(message = "Invalid email"))]
    pub email: Option<String>,
    pub present_address: Option<String>,
    pub permanent_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassHistoryEntry {
    /// e.g. "2024-2025"
    #[validate(length(min = 1, message = "Academic year is required"))]
    pub academic_year: String,
    #[schema(value_type = i32, example = 3)]
    pub class_level: ClassLevel,
    pub section: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 12,
    "name": "Ayesha Rahman",
    "enrollmentNumber": "ENR-2024-0012",
    "dateOfBirth": "2016-05-14",
    "gender": "F",
    "contactInfo": { "motherName": "Nasrin Rahman", "motherPhone": "+8801712345678" },
    "admissionDate": "2024-01-08",
    "graduationDate": null,
    "currentClass": 3,
    "currentSection": "Girls",
    "status": "active",
    "classHistory": [],
    "createdAt": "2024-01-08T09:00:00Z",
    "updatedAt": "2024-01-08T09:00:00Z"
}))]
pub struct Student {
    pub id: u64,
    pub name: String,
    pub enrollment_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub contact_info: ContactInfo,
    pub admission_date: NaiveDate,
    pub graduation_date: Option<NaiveDate>,
    #[schema(value_type = i32, example = 3)]
    pub current_class: ClassLevel,
    pub current_section: Option<String>,
    pub status: StudentStatus,
    pub class_history: Vec<ClassHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `students` table row.
#[derive(Debug, FromRow)]
pub struct StudentRow {
    pub id: u64,
    pub name: String,
    pub enrollment_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub contact_info: Option<Json<ContactInfo>>,
    pub admission_date: NaiveDate,
    pub graduation_date: Option<NaiveDate>,
    pub current_class: i32,
    pub current_section: Option<String>,
    pub status: String,
    pub class_history: Json<Vec<ClassHistoryEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const STUDENT_COLUMNS: &str = "id, name, enrollment_number, date_of_birth, gender, \
    contact_info, admission_date, graduation_date, current_class, current_section, status, \
    class_history, created_at, updated_at";

impl TryFrom<StudentRow> for Student {
    type Error = anyhow::Error;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        let current_class = ClassLevel::new(row.current_class)
            .ok_or_else(|| anyhow!("student {} has invalid class {}", row.id, row.current_class))?;
        let status = row
            .status
            .parse::<StudentStatus>()
            .map_err(|_| anyhow!("student {} has invalid status {:?}", row.id, row.status))?;
        let gender = row
            .gender
            .as_deref()
            .map(str::parse::<Gender>)
            .transpose()
            .map_err(|_| anyhow!("student {} has invalid gender {:?}", row.id, row.gender))?;

        Ok(Student {
            id: row.id,
            name: row.name,
            enrollment_number: row.enrollment_number,
            date_of_birth: row.date_of_birth,
            gender,
            contact_info: row.contact_info.map(|c| c.0).unwrap_or_default(),
            admission_date: row.admission_date,
            graduation_date: row.graduation_date,
            current_class,
            current_section: row.current_section,
            status,
            class_history: row.class_history.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
