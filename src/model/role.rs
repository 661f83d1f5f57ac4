use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Roles issued by the external auth service.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum Role {
    Admin,
    Coordinator,
    Teacher,
    Operator,
    Principal,
    Guardian,
}

/// What a request is trying to do.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum Capability {
    ViewReports,
    RecordAttendance,
    ManageStudents,
    DeactivateStudents,
}

impl Role {
    pub fn can(self, capability: Capability) -> bool {
        use Role::*;

        match capability {
            Capability::ViewReports => match self {
                Admin | Coordinator | Principal => true,
                Teacher | Operator | Guardian => false,
            },
            Capability::RecordAttendance => match self {
                Admin | Coordinator | Operator | Teacher | Principal => true,
                Guardian => false,
            },
            Capability::ManageStudents => match self {
                Admin | Coordinator | Operator | Principal => true,
                Teacher | Guardian => false,
            },
            Capability::DeactivateStudents => match self {
                Admin | Principal | Coordinator => true,
                Teacher | Operator | Guardian => false,
            },
        }
    }
}
