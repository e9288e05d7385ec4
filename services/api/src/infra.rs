use metrics_exporter_prometheus::PrometheusHandle;
use permit_flow::workflows::permits::{
    parse_amount, ApplicationId, ApplicationRecord, ApplicationRepository, CertificateRequest,
    ExportError, ExportGateway, PaymentMode, ReceiptRequest, RepositoryError,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl InMemoryApplicationRepository {
    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ApplicationId, ApplicationRecord>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.lock()?;
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
        let mut guard = self.lock()?;
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
        Ok(self.lock()?.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

/// Queues render requests in memory until a PDF renderer is wired in.
#[derive(Default, Clone)]
pub(crate) struct InMemoryExportGateway {
    certificates: Arc<Mutex<Vec<CertificateRequest>>>,
    receipts: Arc<Mutex<Vec<ReceiptRequest>>>,
}

impl ExportGateway for InMemoryExportGateway {
    fn request_certificate(&self, request: CertificateRequest) -> Result<(), ExportError> {
        info!(
            application_id = %request.application_id,
            office = %request.office,
            "certificate render queued"
        );
        let mut guard = self
            .certificates
            .lock()
            .map_err(|_| ExportError::Transport("certificate queue poisoned".to_string()))?;
        guard.push(request);
        Ok(())
    }

    fn request_receipt(&self, request: ReceiptRequest) -> Result<(), ExportError> {
        info!(
            application_id = %request.application_id,
            or_number = %request.or_number,
            "official receipt render queued"
        );
        let mut guard = self
            .receipts
            .lock()
            .map_err(|_| ExportError::Transport("receipt queue poisoned".to_string()))?;
        guard.push(request);
        Ok(())
    }
}

impl InMemoryExportGateway {
    pub(crate) fn certificates(&self) -> Vec<CertificateRequest> {
        self.certificates
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub(crate) fn receipts(&self) -> Vec<ReceiptRequest> {
        self.receipts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn parse_money(raw: &str) -> Result<Decimal, String> {
    parse_amount("amount", raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_payment_mode(raw: &str) -> Result<PaymentMode, String> {
    raw.parse::<PaymentMode>().map_err(|err| err.to_string())
}
