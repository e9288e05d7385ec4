//! Business permit approval workflow.
//!
//! Backroom offices (CENRO, CHO, CSMWO, OBO, Zoning, BPLO, Examiners) approve or
//! decline independently. BPLO approval assigns the BIN and hands the record to
//! Business Tax, whose itemized assessment schedules the installments the
//! Treasurer settles in order.

pub mod coordinator;
pub mod decision;
pub mod domain;
pub mod fees;
pub mod lines;
pub mod payments;
pub mod record;
pub mod repository;
pub mod router;
pub mod service;
pub mod words;

#[cfg(test)]
mod tests;

pub use coordinator::{BucketCounts, ListQuery, Page, StatusBucket, DEFAULT_PAGE_SIZE};
pub use decision::{
    compose_decline_reason, ApprovalInput, Decision, DecisionError, DeclineReason,
    FeeRequirement, OfficeRequirements,
};
pub use domain::{
    ApplicantProfile, ApplicationId, ApplicationKind, ApplicationSubmission, Bin, BusinessLine,
    BusinessProfile, CertificateRef, OfficeKey, OfficeStatus, PaymentMode,
};
pub use fees::{
    compute_grouped_fee_totals, compute_zoning_fee, parse_amount, BusinessTaxItemization,
    FeeCategory, FeeError, FeeSchedule, OboInspectionFees, ZoningFee,
};
pub use lines::{
    parse_legacy_lines, LegacyBusinessProfile, LegacyLineColumns, LegacySubmission,
    LineParseError,
};
pub use payments::{
    build_installments, Installment, InstallmentPlan, PaymentDetails, PaymentEntry, PaymentError,
    PaymentMethod, PaymentMethodKind,
};
pub use record::{required_offices, ApplicationRecord, AuditAction, OfficeState, RecordError};
pub use repository::{
    ApplicationRepository, ApplicationView, CertificateRequest, ExportError, ExportGateway,
    ReceiptRequest, RepositoryError,
};
pub use router::application_router;
pub use service::{
    BusinessProfileExport, PermitServiceError, PermitWorkflowService, WorkflowSettings,
};
pub use words::amount_to_words;
