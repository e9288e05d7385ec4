use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::permits::decision::{ApprovalInput, Decision};
use crate::workflows::permits::domain::{
    ApplicantProfile, ApplicationId, ApplicationKind, ApplicationSubmission, BusinessLine,
    BusinessProfile, CertificateRef, OfficeKey, PaymentMode,
};
use crate::workflows::permits::fees::{BusinessTaxItemization, OboInspectionFees};
use crate::workflows::permits::payments::{PaymentEntry, PaymentMethodKind};
use crate::workflows::permits::record::ApplicationRecord;
use crate::workflows::permits::repository::{
    ApplicationRepository, CertificateRequest, ExportError, ExportGateway, ReceiptRequest,
    RepositoryError,
};
use crate::workflows::permits::{application_router, PermitWorkflowService, WorkflowSettings};

pub(super) fn d(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn line(name: &str, capital: i64) -> BusinessLine {
    BusinessLine {
        line_of_business: name.to_string(),
        product_service: "Retail".to_string(),
        unit: "1".to_string(),
        capital: d(capital),
        nature_code: "G".to_string(),
        business_nature: "Wholesale and retail trade".to_string(),
        line_code: "4711".to_string(),
    }
}

pub(super) fn submission_with(kind: ApplicationKind, capital: i64) -> ApplicationSubmission {
    ApplicationSubmission {
        kind,
        applicant: ApplicantProfile {
            first_name: "Maria".to_string(),
            middle_name: Some("Santos".to_string()),
            last_name: "Reyes".to_string(),
            contact_number: "09171234567".to_string(),
            email: Some("maria.reyes@example.com".to_string()),
            address: "12 Rizal St, Poblacion".to_string(),
            tax_address: None,
        },
        business: BusinessProfile {
            business_name: "Reyes Sari-Sari Store".to_string(),
            business_type: "Sole Proprietorship".to_string(),
            trade_name: None,
            business_address: "12 Rizal St, Poblacion".to_string(),
            lines: vec![line("Sari-sari store", capital)],
        },
        mode_of_payment: PaymentMode::Quarterly,
    }
}

pub(super) fn submission() -> ApplicationSubmission {
    submission_with(ApplicationKind::New, 150_000)
}

pub(super) fn record(id: &str, created_at: DateTime<Utc>) -> ApplicationRecord {
    ApplicationRecord::create(ApplicationId(id.to_string()), submission(), created_at)
        .expect("valid submission")
}

pub(super) fn certificate(name: &str) -> CertificateRef {
    CertificateRef {
        file_key: format!("uploads/{name}"),
        file_name: name.to_string(),
    }
}

pub(super) fn inspection_fees() -> OboInspectionFees {
    OboInspectionFees {
        architectural_presentability: Some(d(100)),
        sanitary: Some(d(150)),
        mechanical: Some(d(200)),
        electrical: Some(d(250)),
        signage: Some(d(50)),
        electronics: Some(d(75)),
    }
}

/// Approval payload that satisfies the office's form for a 150,000 capital record.
pub(super) fn approval_for(office: OfficeKey) -> ApprovalInput {
    match office {
        OfficeKey::Cenro | OfficeKey::Cho | OfficeKey::Csmwo => ApprovalInput {
            fee: Some(d(250)),
            certificate: Some(certificate("clearance.pdf")),
            ..ApprovalInput::default()
        },
        OfficeKey::Obo => ApprovalInput {
            inspection: Some(inspection_fees()),
            ..ApprovalInput::default()
        },
        OfficeKey::Zoning => ApprovalInput {
            fee: Some(Decimal::new(55_000, 2)),
            ..ApprovalInput::default()
        },
        OfficeKey::Bplo => ApprovalInput {
            bin: Some("BIN-2025-0001".to_string()),
            ..ApprovalInput::default()
        },
        OfficeKey::BusinessTax => ApprovalInput {
            fee: Some(d(1_000)),
            ..ApprovalInput::default()
        },
        OfficeKey::Examiners | OfficeKey::Treasurer => ApprovalInput::default(),
    }
}

pub(super) fn approve(office: OfficeKey) -> Decision {
    Decision::Approve(approval_for(office))
}

pub(super) fn itemization() -> BusinessTaxItemization {
    BusinessTaxItemization {
        business_tax: Some(d(2_000)),
        mayors_permit: Some(d(500)),
        barangay_fee: Some(d(300)),
        occupational_tax: Some(d(100)),
        health_certificate: Some(d(150)),
        obo_fee: Some(d(825)),
        zoning_fee: Some(Decimal::new(55_000, 2)),
        solid_waste_fee: Some(d(200)),
        fixed_tax: Some(d(375)),
        ..BusinessTaxItemization::default()
    }
}

pub(super) fn cash(amount: Decimal, or_number: &str) -> PaymentEntry {
    PaymentEntry {
        amount_paid: Some(amount),
        method: PaymentMethodKind::Cash,
        or_number: Some(or_number.to_string()),
        payment_date: NaiveDate::from_ymd_opt(2025, 1, 20),
        drawee_bank: None,
        check_number: None,
        check_date: None,
    }
}

pub(super) fn check(amount: Decimal, or_number: &str) -> PaymentEntry {
    PaymentEntry {
        amount_paid: Some(amount),
        method: PaymentMethodKind::Check,
        or_number: Some(or_number.to_string()),
        payment_date: None,
        drawee_bank: Some("Land Bank".to_string()),
        check_number: Some("0001234".to_string()),
        check_date: NaiveDate::from_ymd_opt(2025, 4, 18),
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl ApplicationRepository for MemoryRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(
        &self,
        mut record: ApplicationRecord,
        expected_version: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard.get(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        record.version = expected_version + 1;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

/// Lets another office land its decision between our read and our write, once.
pub(super) struct RacingRepository {
    pub inner: MemoryRepository,
    pub rival: OfficeKey,
    pub raced: AtomicBool,
}

impl RacingRepository {
    pub(super) fn new(rival: OfficeKey) -> Self {
        Self {
            inner: MemoryRepository::default(),
            rival,
            raced: AtomicBool::new(false),
        }
    }
}

impl ApplicationRepository for RacingRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(
        &self,
        record: ApplicationRecord,
        expected_version: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let current = self
                .inner
                .fetch(&record.id)?
                .ok_or(RepositoryError::NotFound)?;
            let rival = current
                .apply_decision(self.rival, approve(self.rival), Utc::now())
                .expect("rival decision applies");
            self.inner.update(rival, current.version)?;
        }
        self.inner.update(record, expected_version)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.all()
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryExports {
    certificates: Arc<Mutex<Vec<CertificateRequest>>>,
    receipts: Arc<Mutex<Vec<ReceiptRequest>>>,
}

impl MemoryExports {
    pub(super) fn certificates(&self) -> Vec<CertificateRequest> {
        self.certificates
            .lock()
            .expect("export mutex poisoned")
            .clone()
    }

    pub(super) fn receipts(&self) -> Vec<ReceiptRequest> {
        self.receipts.lock().expect("export mutex poisoned").clone()
    }
}

impl ExportGateway for MemoryExports {
    fn request_certificate(&self, request: CertificateRequest) -> Result<(), ExportError> {
        self.certificates
            .lock()
            .expect("export mutex poisoned")
            .push(request);
        Ok(())
    }

    fn request_receipt(&self, request: ReceiptRequest) -> Result<(), ExportError> {
        self.receipts
            .lock()
            .expect("export mutex poisoned")
            .push(request);
        Ok(())
    }
}

pub(super) struct OfflineExports;

impl ExportGateway for OfflineExports {
    fn request_certificate(&self, _request: CertificateRequest) -> Result<(), ExportError> {
        Err(ExportError::Transport("renderer offline".to_string()))
    }

    fn request_receipt(&self, _request: ReceiptRequest) -> Result<(), ExportError> {
        Err(ExportError::Transport("renderer offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _record: ApplicationRecord,
        _expected_version: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) type MemoryService = PermitWorkflowService<MemoryRepository, MemoryExports>;

pub(super) fn settings() -> WorkflowSettings {
    WorkflowSettings {
        api_base: "https://permits.example.gov".to_string(),
        page_size: 2,
    }
}

pub(super) fn build_service() -> (MemoryService, MemoryRepository, MemoryExports) {
    let repository = MemoryRepository::default();
    let exports = MemoryExports::default();
    let service = PermitWorkflowService::new(
        Arc::new(repository.clone()),
        Arc::new(exports.clone()),
        settings(),
    );
    (service, repository, exports)
}

/// Drive a submitted record through every backroom office up to BPLO.
pub(super) fn approve_backroom(service: &MemoryService, id: &ApplicationId) -> ApplicationRecord {
    let mut latest = None;
    for office in [
        OfficeKey::Cenro,
        OfficeKey::Cho,
        OfficeKey::Csmwo,
        OfficeKey::Obo,
        OfficeKey::Zoning,
        OfficeKey::Examiners,
        OfficeKey::Bplo,
    ] {
        latest = Some(
            service
                .decide(id, office, approve(office))
                .expect("backroom approval succeeds"),
        );
    }
    latest.expect("at least one office")
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    application_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
