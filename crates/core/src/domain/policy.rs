use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::tenant::TenantId;
use crate::hours::BusinessHours;

pub const MIN_POLICY_NAME_LENGTH: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub String);

/// Tenant-scoped first-response deadline policy. Immutable after creation;
/// the only mutation is deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub id: PolicyId,
    pub tenant_id: TenantId,
    pub name: String,
    pub first_response_minutes: i64,
    pub business_hours: Option<BusinessHours>,
    pub created_at: DateTime<Utc>,
}

/// Raw policy input as it arrives over the management boundary. The deadline
/// is a string because that is how the admin form submits it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDraft {
    pub name: String,
    pub first_response_minutes: String,
    pub business_hours: Option<BusinessHours>,
}

/// A field-scoped validation failure, returned to the caller rather than
/// raised as a fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl PolicyDraft {
    /// Validate the draft and mint a policy for the tenant. All field errors
    /// are collected in one pass so the admin form can render them together.
    pub fn validate(
        self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<SlaPolicy, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim().to_string();
        if name.chars().count() < MIN_POLICY_NAME_LENGTH {
            errors.push(FieldError::new(
                "name",
                format!("name must be at least {MIN_POLICY_NAME_LENGTH} characters"),
            ));
        }

        let first_response_minutes = match self.first_response_minutes.trim().parse::<i64>() {
            Ok(minutes) if minutes > 0 => Some(minutes),
            Ok(_) => {
                errors.push(FieldError::new(
                    "firstResponseMinutes",
                    "first response deadline must be greater than zero",
                ));
                None
            }
            Err(_) => {
                errors.push(FieldError::new(
                    "firstResponseMinutes",
                    "first response deadline must be a whole number of minutes",
                ));
                None
            }
        };

        if let Some(hours) = &self.business_hours {
            if let Err(message) = hours.validate() {
                errors.push(FieldError::new("businessHours", message));
            }
        }

        match first_response_minutes {
            Some(first_response_minutes) if errors.is_empty() => Ok(SlaPolicy {
                id: PolicyId(Uuid::new_v4().to_string()),
                tenant_id,
                name,
                first_response_minutes,
                business_hours: self.business_hours,
                created_at: now,
            }),
            _ => Err(errors),
        }
    }
}
