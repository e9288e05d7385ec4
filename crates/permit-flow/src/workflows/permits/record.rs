use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::decision::{self, ApprovalInput, Decision, DecisionError, OfficeRequirements};
use super::domain::{
    ApplicantProfile, ApplicationId, ApplicationKind, ApplicationSubmission, Bin, BusinessProfile,
    CertificateRef, OfficeKey, OfficeStatus, PaymentMode,
};
use super::fees::{
    compute_grouped_fee_totals, ensure_non_negative, BusinessTaxItemization, FeeCategory,
    FeeError, OboInspectionFees,
};
use super::payments::{self, Installment, InstallmentPlan, PaymentEntry, PaymentError};

const NEW_REQUIRED_OFFICES: [OfficeKey; 7] = [
    OfficeKey::Cenro,
    OfficeKey::Cho,
    OfficeKey::Csmwo,
    OfficeKey::Obo,
    OfficeKey::Zoning,
    OfficeKey::Bplo,
    OfficeKey::Examiners,
];

const RENEW_REQUIRED_OFFICES: [OfficeKey; 4] = [
    OfficeKey::Cho,
    OfficeKey::Csmwo,
    OfficeKey::Zoning,
    OfficeKey::Bplo,
];

/// Backroom offices whose approval is required for the application kind.
pub fn required_offices(kind: ApplicationKind) -> &'static [OfficeKey] {
    match kind {
        ApplicationKind::New => &NEW_REQUIRED_OFFICES,
        ApplicationKind::Renew => &RENEW_REQUIRED_OFFICES,
    }
}

/// Errors raised by commands against the application aggregate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Fee(#[from] FeeError),
    #[error("business line {index}: {reason}")]
    InvalidBusinessLine { index: usize, reason: String },
    #[error("application requires {field}")]
    MissingRequiredField { field: &'static str },
    #[error("BPLO has not approved application {0}; business tax cannot be assessed")]
    NotReadyForBusinessTax(ApplicationId),
    #[error("business tax has not been assessed for application {0}")]
    NoInstallmentPlan(ApplicationId),
    #[error("payment mode cannot change once installments are scheduled")]
    PlanAlreadyBuilt,
    #[error("application {0} is settled and archived")]
    Archived(ApplicationId),
}

/// One office's column on the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeState {
    pub status: OfficeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection: Option<OboInspectionFees>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl OfficeState {
    pub const fn pending() -> Self {
        Self {
            status: OfficeStatus::Pending,
            fee: None,
            inspection: None,
            reason: None,
            certificate: None,
            decided_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Submitted,
    Approved,
    Declined,
    BinAssigned,
    BusinessTaxAssessed,
    PaymentRecorded,
    PaymentModeOverridden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office: Option<OfficeKey>,
    pub action: AuditAction,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregate owning every office decision, assessment, and payment for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub bin: Option<Bin>,
    pub kind: ApplicationKind,
    pub applicant: ApplicantProfile,
    pub business: BusinessProfile,
    pub mode_of_payment: PaymentMode,
    pub offices: BTreeMap<OfficeKey, OfficeState>,
    pub itemization: Option<BusinessTaxItemization>,
    pub business_tax_total: Option<Decimal>,
    pub fee_breakdown: BTreeMap<FeeCategory, Decimal>,
    pub installments: Option<InstallmentPlan>,
    pub pass_to_business_tax: bool,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    pub history: Vec<AuditEntry>,
}

impl ApplicationRecord {
    /// Build a freshly submitted record with every office pending.
    pub fn create(
        id: ApplicationId,
        submission: ApplicationSubmission,
        created_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let ApplicationSubmission {
            kind,
            applicant,
            business,
            mode_of_payment,
        } = submission;

        if applicant.first_name.trim().is_empty() || applicant.last_name.trim().is_empty() {
            return Err(RecordError::MissingRequiredField {
                field: "applicant name",
            });
        }
        if business.business_name.trim().is_empty() {
            return Err(RecordError::MissingRequiredField {
                field: "business name",
            });
        }
        if business.lines.is_empty() {
            return Err(RecordError::MissingRequiredField {
                field: "business lines",
            });
        }
        for (index, line) in business.lines.iter().enumerate() {
            if line.line_of_business.trim().is_empty() {
                return Err(RecordError::InvalidBusinessLine {
                    index,
                    reason: "line of business is blank".to_string(),
                });
            }
            ensure_non_negative("capital", line.capital).map_err(|err| {
                RecordError::InvalidBusinessLine {
                    index,
                    reason: err.to_string(),
                }
            })?;
        }

        let offices = OfficeKey::ALL
            .into_iter()
            .map(|office| (office, OfficeState::pending()))
            .collect();

        Ok(Self {
            id,
            bin: None,
            kind,
            applicant,
            business,
            mode_of_payment,
            offices,
            itemization: None,
            business_tax_total: None,
            fee_breakdown: BTreeMap::new(),
            installments: None,
            pass_to_business_tax: false,
            created_at,
            version: 0,
            history: vec![AuditEntry {
                office: None,
                action: AuditAction::Submitted,
                at: created_at,
                detail: None,
            }],
        })
    }

    pub fn office(&self, office: OfficeKey) -> &OfficeState {
        static PENDING: OfficeState = OfficeState::pending();
        self.offices.get(&office).unwrap_or(&PENDING)
    }

    pub fn office_status(&self, office: OfficeKey) -> OfficeStatus {
        self.office(office).status
    }

    pub fn total_capital(&self) -> Decimal {
        self.business.lines.iter().map(|line| line.capital).sum()
    }

    pub(crate) fn set_office(&mut self, office: OfficeKey, state: OfficeState) {
        self.offices.insert(office, state);
    }

    pub(crate) fn record_audit(
        &mut self,
        office: OfficeKey,
        action: AuditAction,
        at: DateTime<Utc>,
        detail: Option<String>,
    ) {
        self.history.push(AuditEntry {
            office: Some(office),
            action,
            at,
            detail,
        });
    }

    /// Only reachable through a BPLO approval, which is itself terminal.
    pub(crate) fn assign_bin(&mut self, bin: Bin, at: DateTime<Utc>) {
        if self.bin.is_some() {
            return;
        }
        let detail = bin.0.clone();
        self.bin = Some(bin);
        self.pass_to_business_tax = true;
        self.record_audit(OfficeKey::Bplo, AuditAction::BinAssigned, at, Some(detail));
    }

    fn ensure_active(&self) -> Result<(), RecordError> {
        if self.is_archived() {
            return Err(RecordError::Archived(self.id.clone()));
        }
        Ok(())
    }

    /// Apply one office's decision, returning the next snapshot.
    pub fn apply_decision(
        &self,
        office: OfficeKey,
        command: Decision,
        at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        self.ensure_active()?;
        if OfficeRequirements::for_office(office).workflow_managed {
            return Err(DecisionError::WorkflowManaged { office }.into());
        }
        let next = match command {
            Decision::Approve(input) => decision::approve(self, office, input, at)?,
            Decision::Decline { reason } => decision::decline(self, office, &reason, at)?,
        };
        Ok(next)
    }

    /// BPLO approval is the single upstream gate for business tax assessment.
    pub fn is_ready_for_business_tax(&self) -> bool {
        self.office_status(OfficeKey::Bplo) == OfficeStatus::Approved
    }

    pub fn is_fully_approved(&self) -> bool {
        required_offices(self.kind)
            .iter()
            .all(|office| self.office_status(*office) == OfficeStatus::Approved)
    }

    pub fn has_declines(&self) -> bool {
        self.offices
            .values()
            .any(|state| state.status == OfficeStatus::Declined)
    }

    pub fn is_fully_settled(&self) -> bool {
        self.installments
            .as_ref()
            .is_some_and(InstallmentPlan::is_fully_settled)
    }

    /// Read-only once every required office is terminal and the plan is paid off.
    pub fn is_archived(&self) -> bool {
        required_offices(self.kind)
            .iter()
            .all(|office| self.office_status(*office).is_terminal())
            && self.is_fully_settled()
    }

    /// Assessed and waiting on the treasurer.
    pub fn is_ready_for_payment(&self) -> bool {
        self.office_status(OfficeKey::BusinessTax) == OfficeStatus::Approved
            && !self.is_fully_settled()
    }

    /// Record the business tax itemization and schedule installments.
    pub fn assess_business_tax(
        &self,
        itemization: BusinessTaxItemization,
        at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        self.ensure_active()?;
        if !self.is_ready_for_business_tax() {
            return Err(RecordError::NotReadyForBusinessTax(self.id.clone()));
        }
        itemization.validate()?;

        let total = itemization.total();
        let plan = payments::build_installments(total, self.mode_of_payment)?;
        let mut next = decision::approve(
            self,
            OfficeKey::BusinessTax,
            ApprovalInput {
                fee: Some(total),
                ..ApprovalInput::default()
            },
            at,
        )?;

        next.fee_breakdown = compute_grouped_fee_totals(&itemization);
        next.itemization = Some(itemization);
        next.business_tax_total = Some(total);
        next.installments = Some(plan);
        next.record_audit(
            OfficeKey::BusinessTax,
            AuditAction::BusinessTaxAssessed,
            at,
            Some(format!("{} installment(s)", self.mode_of_payment.label())),
        );
        Ok(next)
    }

    /// Record a treasurer payment; the treasurer column is approved once the plan clears.
    pub fn record_payment(
        &self,
        index: usize,
        entry: PaymentEntry,
        at: DateTime<Utc>,
    ) -> Result<(Self, Installment), RecordError> {
        self.ensure_active()?;
        let plan = self
            .installments
            .as_ref()
            .ok_or_else(|| RecordError::NoInstallmentPlan(self.id.clone()))?;

        let plan = payments::record_payment(plan, index, entry)?;
        let installment = plan.installments[index].clone();
        let cleared = plan.is_cleared(self.kind);
        let paid = plan.amount_paid();

        let mut next = self.clone();
        next.installments = Some(plan);
        next.record_audit(
            OfficeKey::Treasurer,
            AuditAction::PaymentRecorded,
            at,
            installment
                .payment
                .as_ref()
                .map(|payment| format!("installment {index} OR {}", payment.or_number)),
        );

        if cleared && next.office_status(OfficeKey::Treasurer) == OfficeStatus::Pending {
            next = decision::approve(
                &next,
                OfficeKey::Treasurer,
                ApprovalInput {
                    fee: Some(paid),
                    ..ApprovalInput::default()
                },
                at,
            )?;
        }

        Ok((next, installment))
    }

    /// Administrative override of the applicant's payment cadence.
    pub fn override_payment_mode(
        &self,
        mode: PaymentMode,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        self.ensure_active()?;
        if self.installments.is_some() {
            return Err(RecordError::PlanAlreadyBuilt);
        }
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(RecordError::MissingRequiredField { field: "actor" });
        }

        let mut next = self.clone();
        next.history.push(AuditEntry {
            office: None,
            action: AuditAction::PaymentModeOverridden,
            at,
            detail: Some(format!(
                "{} -> {} by {actor}",
                self.mode_of_payment.label(),
                mode.label()
            )),
        });
        next.mode_of_payment = mode;
        Ok(next)
    }
}
