use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::coordinator::{self, BucketCounts, ListQuery, Page, DEFAULT_PAGE_SIZE};
use super::decision::{Decision, DecisionError};
use super::domain::{ApplicationId, ApplicationSubmission, OfficeKey, OfficeStatus, PaymentMode};
use super::fees::{compute_zoning_fee, BusinessTaxItemization, FeeError};
use super::lines::{LegacySubmission, LineParseError};
use super::payments::{PaymentEntry, PaymentError};
use super::record::{ApplicationRecord, RecordError};
use super::repository::{
    ApplicationRepository, CertificateRequest, ExportError, ExportGateway, ReceiptRequest,
    RepositoryError,
};
use super::words::amount_to_words;

/// Settings the service needs from the application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub api_base: String,
    pub page_size: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:3000".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// CSV snapshot of every business profile for the records office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusinessProfileExport {
    pub success: bool,
    pub csv: String,
    pub filename: String,
}

/// Service composing the repository, the workflow rules, and the export collaborators.
pub struct PermitWorkflowService<R, E> {
    repository: Arc<R>,
    exports: Arc<E>,
    settings: WorkflowSettings,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("bp-{id:06}"))
}

/// Offices whose approval produces a printable clearance certificate.
const CERTIFICATE_OFFICES: [OfficeKey; 2] = [OfficeKey::Zoning, OfficeKey::Cenro];

const EXPORT_HEADERS: [&str; 13] = [
    "application_id",
    "bin",
    "kind",
    "applicant",
    "contact_number",
    "business_name",
    "business_type",
    "business_address",
    "lines_of_business",
    "total_capital",
    "mode_of_payment",
    "backroom",
    "business_tax_total",
];

impl<R, E> PermitWorkflowService<R, E>
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    pub fn new(repository: Arc<R>, exports: Arc<E>, settings: WorkflowSettings) -> Self {
        Self {
            repository,
            exports,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Register a new or renewal application with every office pending.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, PermitServiceError> {
        let record = ApplicationRecord::create(next_application_id(), submission, Utc::now())?;
        let stored = self.repository.insert(record)?;
        info!(
            application_id = %stored.id,
            kind = ?stored.kind,
            lines = stored.business.lines.len(),
            "permit application submitted"
        );
        Ok(stored)
    }

    /// Same as [`submit`](Self::submit) for the legacy form's packed line columns.
    pub fn submit_legacy(
        &self,
        legacy: LegacySubmission,
    ) -> Result<ApplicationRecord, PermitServiceError> {
        let submission = legacy.into_submission().map_err(|err| {
            warn!(error = %err, "legacy business lines rejected");
            err
        })?;
        self.submit(submission)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<ApplicationRecord, PermitServiceError> {
        let record = self.repository.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn list(&self, query: ListQuery) -> Result<Page<ApplicationRecord>, PermitServiceError> {
        let records = self.repository.all()?;
        Ok(coordinator::list(&records, query, self.settings.page_size))
    }

    pub fn list_business_tax_handoff(
        &self,
        page: usize,
    ) -> Result<Page<ApplicationRecord>, PermitServiceError> {
        let mut records = coordinator::filter_for_business_tax_handoff(&self.repository.all()?);
        coordinator::order_by_submission(&mut records);
        Ok(coordinator::paginate(&records, page, self.settings.page_size))
    }

    pub fn list_ready_for_payment(
        &self,
        page: usize,
    ) -> Result<Page<ApplicationRecord>, PermitServiceError> {
        let mut records = coordinator::filter_ready_for_payment(&self.repository.all()?);
        coordinator::order_by_submission(&mut records);
        Ok(coordinator::paginate(&records, page, self.settings.page_size))
    }

    pub fn counts(&self, office: OfficeKey) -> Result<BucketCounts, PermitServiceError> {
        let records = self.repository.all()?;
        Ok(coordinator::bucket_counts(&records, office))
    }

    /// Record an office approval or decline.
    pub fn decide(
        &self,
        id: &ApplicationId,
        office: OfficeKey,
        decision: Decision,
    ) -> Result<ApplicationRecord, PermitServiceError> {
        let (stored, ()) = self.mutate(id, |record| {
            let next = record.apply_decision(office, decision.clone(), Utc::now())?;
            Ok((next, ()))
        })?;

        let state = stored.office(office);
        info!(
            application_id = %stored.id,
            %office,
            status = state.status.label(),
            "office decision recorded"
        );
        if office == OfficeKey::Bplo {
            if let Some(bin) = &stored.bin {
                info!(
                    application_id = %stored.id,
                    bin = %bin.0,
                    "BIN assigned; handed off to business tax"
                );
            }
        }

        if state.status == OfficeStatus::Approved && CERTIFICATE_OFFICES.contains(&office) {
            self.request_certificate(&stored, office);
        }

        Ok(stored)
    }

    /// Record the business tax itemization, fee breakdown, and installment plan.
    pub fn assess_business_tax(
        &self,
        id: &ApplicationId,
        itemization: BusinessTaxItemization,
    ) -> Result<ApplicationRecord, PermitServiceError> {
        let (stored, ()) = self.mutate(id, |record| {
            let next = record.assess_business_tax(itemization.clone(), Utc::now())?;
            Ok((next, ()))
        })?;

        info!(
            application_id = %stored.id,
            total = %stored.business_tax_total.unwrap_or_default(),
            mode = stored.mode_of_payment.label(),
            "business tax assessed"
        );
        Ok(stored)
    }

    /// Settle one installment and hand the receipt to the export collaborator.
    pub fn record_payment(
        &self,
        id: &ApplicationId,
        index: usize,
        entry: PaymentEntry,
    ) -> Result<(ApplicationRecord, ReceiptRequest), PermitServiceError> {
        let (stored, installment) = self.mutate(id, |record| {
            record.record_payment(index, entry.clone(), Utc::now())
        })?;

        let amount_paid = installment.amount_paid.unwrap_or_default();
        let payment = installment
            .payment
            .ok_or(RecordError::Payment(PaymentError::MissingRequiredField {
                field: "payment details",
            }))?;

        let receipt = ReceiptRequest {
            application_id: stored.id.clone(),
            bin: stored.bin.clone(),
            payer: stored.applicant.full_name(),
            business_name: stored.business.business_name.clone(),
            installment_index: index,
            due_date: installment.due_date,
            amount_paid,
            amount_in_words: amount_to_words(amount_paid),
            or_number: payment.or_number,
            payment_date: payment.payment_date,
            method: payment.method,
            fee_breakdown: stored.fee_breakdown.clone(),
        };

        info!(
            application_id = %stored.id,
            installment = index,
            amount = %amount_paid,
            settled = stored.is_fully_settled(),
            "installment payment recorded"
        );
        if let Err(err) = self.exports.request_receipt(receipt.clone()) {
            warn!(application_id = %stored.id, error = %err, "receipt request not delivered");
        }

        Ok((stored, receipt))
    }

    pub fn override_payment_mode(
        &self,
        id: &ApplicationId,
        mode: PaymentMode,
        actor: &str,
    ) -> Result<ApplicationRecord, PermitServiceError> {
        let (stored, ()) = self.mutate(id, |record| {
            let next = record.override_payment_mode(mode, actor, Utc::now())?;
            Ok((next, ()))
        })?;
        info!(application_id = %stored.id, mode = mode.label(), %actor, "payment mode overridden");
        Ok(stored)
    }

    pub fn export_business_profiles(&self) -> Result<BusinessProfileExport, PermitServiceError> {
        let mut records = self.repository.all()?;
        coordinator::order_by_submission(&mut records);

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(EXPORT_HEADERS)?;
        for record in &records {
            let lines = record
                .business
                .lines
                .iter()
                .map(|line| line.line_of_business.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            let backroom = OfficeKey::ALL
                .iter()
                .map(|office| format!("{office}:{}", record.office_status(*office).label()))
                .collect::<Vec<_>>()
                .join(" ");

            writer.write_record([
                record.id.0.clone(),
                record.bin.as_ref().map(|bin| bin.0.clone()).unwrap_or_default(),
                format!("{:?}", record.kind),
                record.applicant.full_name(),
                record.applicant.contact_number.clone(),
                record.business.business_name.clone(),
                record.business.business_type.clone(),
                record.business.business_address.clone(),
                lines,
                format!("{:.2}", record.total_capital()),
                record.mode_of_payment.label().to_string(),
                backroom,
                record
                    .business_tax_total
                    .map(|total| format!("{total:.2}"))
                    .unwrap_or_default(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| PermitServiceError::ExportEncoding(err.to_string()))?;
        let csv = String::from_utf8(bytes)
            .map_err(|err| PermitServiceError::ExportEncoding(err.to_string()))?;

        info!(rows = records.len(), "business profiles exported");
        Ok(BusinessProfileExport {
            success: true,
            csv,
            filename: format!("business_profiles_{}.csv", Utc::now().format("%Y%m%d")),
        })
    }

    /// Load, apply, and compare-and-swap. A version conflict is retried once
    /// against the fresh record so decisions on different offices both land,
    /// while a duplicate decision on the same office fails on the retry.
    fn mutate<T, F>(
        &self,
        id: &ApplicationId,
        command: F,
    ) -> Result<(ApplicationRecord, T), PermitServiceError>
    where
        F: Fn(&ApplicationRecord) -> Result<(ApplicationRecord, T), RecordError>,
    {
        let mut attempt = 0;
        loop {
            let current = self.get(id)?;
            let (next, output) = command(&current).map_err(|err| {
                warn!(application_id = %id, error = %err, "command rejected");
                err
            })?;

            match self.repository.update(next, current.version) {
                Ok(stored) => return Ok((stored, output)),
                Err(RepositoryError::VersionConflict { expected, found }) if attempt == 0 => {
                    warn!(application_id = %id, expected, found, "concurrent update; retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn request_certificate(&self, record: &ApplicationRecord, office: OfficeKey) {
        let fee_label = match office {
            OfficeKey::Zoning => compute_zoning_fee(record.total_capital())
                .map(|fee| fee.label())
                .unwrap_or_else(|_| "Exempted".to_string()),
            _ => record
                .office(office)
                .fee
                .map(|fee| format!("{fee:.2}"))
                .unwrap_or_default(),
        };

        let request = CertificateRequest {
            application_id: record.id.clone(),
            office,
            applicant_name: record.applicant.full_name(),
            business_name: record.business.business_name.clone(),
            business_address: record.business.business_address.clone(),
            total_capital: record.total_capital(),
            fee_label,
            issued_at: record.office(office).decided_at.unwrap_or(record.created_at),
        };

        if let Err(err) = self.exports.request_certificate(request) {
            warn!(application_id = %record.id, %office, error = %err, "certificate request not delivered");
        }
    }
}

/// Error raised by the permit workflow service.
#[derive(Debug, thiserror::Error)]
pub enum PermitServiceError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Lines(#[from] LineParseError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("failed to write export: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to encode export: {0}")]
    ExportEncoding(String),
}

impl PermitServiceError {
    /// Coarse category reported to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            PermitServiceError::Record(err) => match err {
                RecordError::Decision(DecisionError::AlreadyDecided { .. }) => "AlreadyDecided",
                RecordError::Decision(DecisionError::MissingRequiredField { .. })
                | RecordError::Payment(PaymentError::MissingRequiredField { .. })
                | RecordError::MissingRequiredField { .. } => "MissingRequiredField",
                RecordError::Payment(PaymentError::OutOfSequence { .. }) => "OutOfSequence",
                RecordError::Payment(PaymentError::AlreadyPaid { .. }) => "AlreadyPaid",
                RecordError::Decision(DecisionError::Fee(_))
                | RecordError::Decision(DecisionError::UnsupportedCertificate { .. })
                | RecordError::Decision(DecisionError::FeeMismatch { .. })
                | RecordError::Decision(DecisionError::WorkflowManaged { .. })
                | RecordError::Fee(_)
                | RecordError::Payment(PaymentError::InvalidInput(_))
                | RecordError::InvalidBusinessLine { .. } => "InvalidInput",
                RecordError::NotReadyForBusinessTax(_)
                | RecordError::NoInstallmentPlan(_)
                | RecordError::PlanAlreadyBuilt => "NotReady",
                RecordError::Archived(_) => "Archived",
            },
            PermitServiceError::Lines(_) => "InvalidInput",
            PermitServiceError::Repository(RepositoryError::NotFound) => "NotFound",
            PermitServiceError::Repository(RepositoryError::Conflict)
            | PermitServiceError::Repository(RepositoryError::VersionConflict { .. }) => {
                "Conflict"
            }
            PermitServiceError::Repository(RepositoryError::Unavailable(_))
            | PermitServiceError::Export(_) => "NetworkFailure",
            PermitServiceError::Csv(_) | PermitServiceError::ExportEncoding(_) => "ExportFailure",
        }
    }
}

impl From<FeeError> for PermitServiceError {
    fn from(value: FeeError) -> Self {
        Self::Record(RecordError::Fee(value))
    }
}
