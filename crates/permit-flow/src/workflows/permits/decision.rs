use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{Bin, CertificateRef, OfficeKey, OfficeStatus};
use super::fees::{
    compute_zoning_fee, ensure_non_negative, obo_total, FeeError, OboInspectionFees, ZoningFee,
};
use super::record::{ApplicationRecord, AuditAction, OfficeState};

/// Errors raised when an office acts on an application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("{office} already recorded a decision ({status:?})")]
    AlreadyDecided {
        office: OfficeKey,
        status: OfficeStatus,
    },
    #[error("{office} requires {field} before a decision can be recorded")]
    MissingRequiredField {
        office: OfficeKey,
        field: &'static str,
    },
    #[error("{office} fee {supplied} does not match the schedule ({expected})")]
    FeeMismatch {
        office: OfficeKey,
        supplied: Decimal,
        expected: String,
    },
    #[error("{office} is updated by the workflow and cannot be decided directly")]
    WorkflowManaged { office: OfficeKey },
    #[error("certificate '{file_name}' must be a PDF or image")]
    UnsupportedCertificate { file_name: String },
    #[error(transparent)]
    Fee(#[from] FeeError),
}

/// What an office must supply alongside an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRequirement {
    None,
    Amount,
    /// Fee may be omitted only when the computed zoning fee is exempted.
    ZoningSchedule,
    /// All six building inspection fees.
    Inspection,
}

/// Per-office approval form configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfficeRequirements {
    pub office: OfficeKey,
    pub fee: FeeRequirement,
    pub certificate: bool,
    pub assigns_bin: bool,
    /// Column moves only through assessment or payment, never a direct decision.
    pub workflow_managed: bool,
}

impl OfficeRequirements {
    pub const fn for_office(office: OfficeKey) -> Self {
        let (fee, certificate, assigns_bin) = match office {
            OfficeKey::Cenro | OfficeKey::Cho | OfficeKey::Csmwo => {
                (FeeRequirement::Amount, true, false)
            }
            OfficeKey::Obo => (FeeRequirement::Inspection, false, false),
            OfficeKey::Zoning => (FeeRequirement::ZoningSchedule, false, false),
            OfficeKey::Bplo => (FeeRequirement::None, false, true),
            OfficeKey::BusinessTax => (FeeRequirement::Amount, false, false),
            OfficeKey::Examiners | OfficeKey::Treasurer => (FeeRequirement::None, false, false),
        };

        Self {
            office,
            fee,
            certificate,
            assigns_bin,
            workflow_managed: matches!(office, OfficeKey::BusinessTax | OfficeKey::Treasurer),
        }
    }
}

/// Fields submitted with an approval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalInput {
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default, alias = "obo")]
    pub inspection: Option<OboInspectionFees>,
    #[serde(default)]
    pub certificate: Option<CertificateRef>,
    #[serde(default)]
    pub bin: Option<String>,
}

/// Disposition submitted by an office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Approve(ApprovalInput),
    Decline { reason: String },
}

/// Standard grounds for declining an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclineReason {
    #[serde(rename = "Incomplete Requirements")]
    IncompleteRequirements,
    #[serde(rename = "Non-Compliance with Safety and Health Standards")]
    SafetyAndHealthNonCompliance,
    #[serde(rename = "Regulatory or Legal Violations")]
    RegulatoryViolations,
    #[serde(rename = "Environmental and Compliance Concerns")]
    EnvironmentalConcerns,
    #[serde(rename = "Zoning and Location Issues")]
    ZoningAndLocation,
}

impl DeclineReason {
    pub const ALL: [DeclineReason; 5] = [
        DeclineReason::IncompleteRequirements,
        DeclineReason::SafetyAndHealthNonCompliance,
        DeclineReason::RegulatoryViolations,
        DeclineReason::EnvironmentalConcerns,
        DeclineReason::ZoningAndLocation,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            DeclineReason::IncompleteRequirements => "Incomplete Requirements",
            DeclineReason::SafetyAndHealthNonCompliance => {
                "Non-Compliance with Safety and Health Standards"
            }
            DeclineReason::RegulatoryViolations => "Regulatory or Legal Violations",
            DeclineReason::EnvironmentalConcerns => "Environmental and Compliance Concerns",
            DeclineReason::ZoningAndLocation => "Zoning and Location Issues",
        }
    }
}

/// Join the selected standard reasons and any free text into the stored reason.
pub fn compose_decline_reason(selected: &[DeclineReason], other: Option<&str>) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(selected.len() + 1);
    for reason in selected {
        let label = reason.label();
        if !parts.contains(&label) {
            parts.push(label);
        }
    }
    if let Some(text) = other.map(str::trim).filter(|text| !text.is_empty()) {
        parts.push(text);
    }
    parts.join(", ")
}

fn ensure_pending(record: &ApplicationRecord, office: OfficeKey) -> Result<(), DecisionError> {
    let status = record.office(office).status;
    if status.is_terminal() {
        return Err(DecisionError::AlreadyDecided { office, status });
    }
    Ok(())
}

/// Approve `office` on `record`, returning the updated snapshot.
pub fn approve(
    record: &ApplicationRecord,
    office: OfficeKey,
    input: ApprovalInput,
    at: DateTime<Utc>,
) -> Result<ApplicationRecord, DecisionError> {
    ensure_pending(record, office)?;
    let requirements = OfficeRequirements::for_office(office);
    let missing = |field: &'static str| DecisionError::MissingRequiredField { office, field };

    let (fee, inspection) = match requirements.fee {
        FeeRequirement::None => (input.fee, None),
        FeeRequirement::Amount => (Some(input.fee.ok_or_else(|| missing("fee"))?), None),
        FeeRequirement::ZoningSchedule => {
            let computed = compute_zoning_fee(record.total_capital())?;
            match (input.fee, computed) {
                (None, ZoningFee::Exempted) => (None, None),
                (None, ZoningFee::Amount(_)) => return Err(missing("fee")),
                (Some(fee), computed) if fee == computed.amount() => (Some(fee), None),
                (Some(fee), computed) => {
                    return Err(DecisionError::FeeMismatch {
                        office,
                        supplied: fee,
                        expected: computed.label(),
                    })
                }
            }
        }
        FeeRequirement::Inspection => {
            let inspection = input.inspection.ok_or_else(|| missing("inspection fees"))?;
            if let Some(field) = inspection.missing_fields().first().copied() {
                return Err(missing(field));
            }
            inspection.validate()?;
            (Some(obo_total(&inspection)), Some(inspection))
        }
    };

    if let Some(amount) = fee {
        ensure_non_negative("fee", amount)?;
    }

    let certificate = match input.certificate {
        Some(certificate) if certificate.file_key.trim().is_empty() => None,
        other => other,
    };
    if requirements.certificate && certificate.is_none() {
        return Err(missing("certificate"));
    }
    if let Some(certificate) = &certificate {
        if !certificate.is_document() {
            return Err(DecisionError::UnsupportedCertificate {
                file_name: certificate.file_name.clone(),
            });
        }
    }

    let bin = if requirements.assigns_bin {
        let raw = input.bin.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(missing("bin"));
        }
        Some(Bin(raw.to_string()))
    } else {
        None
    };

    let mut next = record.clone();
    next.set_office(
        office,
        OfficeState {
            status: OfficeStatus::Approved,
            fee,
            inspection,
            reason: None,
            certificate,
            decided_at: Some(at),
        },
    );
    next.record_audit(
        office,
        AuditAction::Approved,
        at,
        fee.map(|fee| format!("fee {fee:.2}")),
    );

    if let Some(bin) = bin {
        next.assign_bin(bin, at);
    }

    Ok(next)
}

/// Decline `office` on `record`; the reason must not be blank.
pub fn decline(
    record: &ApplicationRecord,
    office: OfficeKey,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<ApplicationRecord, DecisionError> {
    ensure_pending(record, office)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DecisionError::MissingRequiredField {
            office,
            field: "reason",
        });
    }

    let mut next = record.clone();
    next.set_office(
        office,
        OfficeState {
            status: OfficeStatus::Declined,
            fee: None,
            inspection: None,
            reason: Some(reason.to_string()),
            certificate: None,
            decided_at: Some(at),
        },
    );
    next.record_audit(office, AuditAction::Declined, at, Some(reason.to_string()));
    Ok(next)
}
