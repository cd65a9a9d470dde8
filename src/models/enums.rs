use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
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
    };
}

str_enum!(MedicationStatus {
    Active => "active",
    Discontinued => "discontinued",
});

str_enum!(AdministrationAction {
    Administered => "administered",
    Refused => "refused",
    Held => "held",
});

str_enum!(Shift {
    Morning => "morning",
    Evening => "evening",
    Night => "night",
});

str_enum!(AuditStatus {
    PendingReview => "pending_review",
    Approved => "approved",
    Denied => "denied",
});

str_enum!(ReviewDecision {
    Approve => "approve",
    Deny => "deny",
});

str_enum!(AlertType {
    Critical => "critical",
    Warning => "warning",
    Info => "info",
});

str_enum!(AlertSourceKind {
    Administration => "administration",
    Audit => "audit",
});

str_enum!(StaffRole {
    Nurse => "nurse",
    Admin => "admin",
    Staff => "staff",
});

str_enum!(CustodyCause {
    Registration => "registration",
    Administration => "administration",
    Audit => "audit",
    Reactivation => "reactivation",
});

str_enum!(NotifySeverity {
    Success => "success",
    Info => "info",
    Warning => "warning",
    Error => "error",
});

impl AdministrationAction {
    /// Units removed from the running count by this action.
    pub fn count_delta(&self) -> i64 {
        match self {
            Self::Administered => -1,
            Self::Refused | Self::Held => 0,
        }
    }
}

impl AuditStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::PendingReview)
    }
}

impl ReviewDecision {
    pub fn outcome(&self) -> AuditStatus {
        match self {
            Self::Approve => AuditStatus::Approved,
            Self::Deny => AuditStatus::Denied,
        }
    }
}
