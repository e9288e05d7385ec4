use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationKind, Bin, OfficeKey};
use super::fees::FeeCategory;
use super::payments::{Installment, InstallmentPlan, PaymentMethod};
use super::record::ApplicationRecord;

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    /// Compare-and-swap on `version`: the stored record must still be at
    /// `expected_version`. Returns the stored record with its bumped version.
    fn update(
        &self,
        record: ApplicationRecord,
        expected_version: u64,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed concurrently (expected version {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hooks for the PDF/receipt rendering collaborators.
pub trait ExportGateway: Send + Sync {
    fn request_certificate(&self, request: CertificateRequest) -> Result<(), ExportError>;
    fn request_receipt(&self, request: ReceiptRequest) -> Result<(), ExportError>;
}

/// Input handed to the certificate renderer for zoning and environmental clearances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub application_id: ApplicationId,
    pub office: OfficeKey,
    pub applicant_name: String,
    pub business_name: String,
    pub business_address: String,
    pub total_capital: Decimal,
    pub fee_label: String,
    pub issued_at: DateTime<Utc>,
}

/// Input handed to the official receipt renderer after a treasurer payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRequest {
    pub application_id: ApplicationId,
    pub bin: Option<Bin>,
    pub payer: String,
    pub business_name: String,
    pub installment_index: usize,
    pub due_date: String,
    pub amount_paid: Decimal,
    pub amount_in_words: String,
    pub or_number: String,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub fee_breakdown: BTreeMap<FeeCategory, Decimal>,
}

/// Export dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export transport unavailable: {0}")]
    Transport(String),
}

/// Office column as exposed over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct OfficeStatusView {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

/// Sanitized projection of an application for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<Bin>,
    pub kind: ApplicationKind,
    pub applicant_name: String,
    pub business_name: String,
    pub total_capital: Decimal,
    pub mode_of_payment: &'static str,
    pub offices: BTreeMap<OfficeKey, OfficeStatusView>,
    pub ready_for_business_tax: bool,
    pub fully_approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_tax_total: Option<Decimal>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fee_breakdown: BTreeMap<&'static str, Decimal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub installments: Vec<Installment>,
    pub fully_settled: bool,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl ApplicationRecord {
    /// Certificate links point at the file-storage collaborator under `api_base`.
    pub fn view(&self, api_base: &str) -> ApplicationView {
        let api_base = api_base.trim_end_matches('/');
        let offices = self
            .offices
            .iter()
            .map(|(office, state)| {
                let certificate_url = state.certificate.as_ref().map(|certificate| {
                    format!("{api_base}/files/{}/{}", self.id, certificate.file_key)
                });
                (
                    *office,
                    OfficeStatusView {
                        status: state.status.label(),
                        fee: state.fee,
                        reason: state.reason.clone(),
                        certificate_url,
                        decided_at: state.decided_at,
                    },
                )
            })
            .collect();

        ApplicationView {
            application_id: self.id.clone(),
            bin: self.bin.clone(),
            kind: self.kind,
            applicant_name: self.applicant.full_name(),
            business_name: self.business.business_name.clone(),
            total_capital: self.total_capital(),
            mode_of_payment: self.mode_of_payment.label(),
            offices,
            ready_for_business_tax: self.is_ready_for_business_tax(),
            fully_approved: self.is_fully_approved(),
            business_tax_total: self.business_tax_total,
            fee_breakdown: self
                .fee_breakdown
                .iter()
                .map(|(category, amount)| (category.label(), *amount))
                .collect(),
            installments: self
                .installments
                .as_ref()
                .map(|plan: &InstallmentPlan| plan.installments.clone())
                .unwrap_or_default(),
            fully_settled: self.is_fully_settled(),
            created_at: self.created_at,
            version: self.version,
        }
    }
}

