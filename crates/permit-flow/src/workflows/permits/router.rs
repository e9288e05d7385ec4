use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::coordinator::{ListQuery, Page, StatusBucket};
use super::decision::{compose_decline_reason, ApprovalInput, Decision, DeclineReason};
use super::domain::{ApplicationId, ApplicationSubmission, OfficeKey, PaymentMode};
use super::fees::{compute_zoning_fee, parse_amount, BusinessTaxItemization};
use super::lines::LegacySubmission;
use super::payments::{PaymentEntry, PaymentMethodKind};
use super::record::ApplicationRecord;
use super::repository::{ApplicationRepository, ApplicationView, ExportGateway};
use super::service::{PermitServiceError, PermitWorkflowService};

/// Router builder exposing intake, office decisions, assessment, and payment endpoints.
pub fn application_router<R, E>(service: Arc<PermitWorkflowService<R, E>>) -> Router
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<R, E>).get(list_handler::<R, E>),
        )
        .route(
            "/api/v1/applications/legacy",
            post(legacy_submit_handler::<R, E>),
        )
        .route("/api/v1/applications/:id", get(status_handler::<R, E>))
        .route(
            "/api/v1/applications/:id/payment-mode",
            put(payment_mode_handler::<R, E>),
        )
        .route(
            "/api/v1/offices/:office/approve/:id",
            post(approve_handler::<R, E>),
        )
        .route(
            "/api/v1/offices/:office/decline/:id",
            post(decline_handler::<R, E>),
        )
        .route("/api/v1/offices/:office/counts", get(counts_handler::<R, E>))
        .route("/api/v1/business-tax", get(handoff_handler::<R, E>))
        .route(
            "/api/v1/business-tax/approve/:id",
            post(business_tax_handler::<R, E>),
        )
        .route("/api/v1/treasurer", get(treasurer_queue_handler::<R, E>))
        .route(
            "/api/v1/treasurer/payments/:id",
            put(payment_handler::<R, E>),
        )
        .route(
            "/api/v1/business-profiles/export",
            get(export_handler::<R, E>),
        )
        .route("/api/v1/fees/zoning", get(zoning_fee_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    pub office: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageParams {
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeclineRequest {
    #[serde(default)]
    pub reasons: Vec<DeclineReason>,
    #[serde(default)]
    pub other: Option<String>,
}

/// Treasurer payment form as posted by the dashboard.
#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    pub index: usize,
    #[serde(default)]
    pub amount_paid: Option<Decimal>,
    pub payment_mode: PaymentMethodKind,
    #[serde(default)]
    pub or_no: Option<String>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub drawee_bank: Option<String>,
    #[serde(default)]
    pub check_number: Option<String>,
    #[serde(default)]
    pub check_date: Option<NaiveDate>,
}

impl From<PaymentRequest> for PaymentEntry {
    fn from(request: PaymentRequest) -> Self {
        PaymentEntry {
            amount_paid: request.amount_paid,
            method: request.payment_mode,
            or_number: request.or_no,
            payment_date: request.payment_date,
            drawee_bank: request.drawee_bank,
            check_number: request.check_number,
            check_date: request.check_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentModeRequest {
    pub mode: PaymentMode,
    pub actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ZoningParams {
    pub capital: String,
}

fn status_for(error: &PermitServiceError) -> StatusCode {
    match error.kind() {
        "InvalidInput" | "MissingRequiredField" => StatusCode::UNPROCESSABLE_ENTITY,
        "NotFound" => StatusCode::NOT_FOUND,
        "AlreadyDecided" | "OutOfSequence" | "AlreadyPaid" | "NotReady" | "Archived"
        | "Conflict" => StatusCode::CONFLICT,
        "NetworkFailure" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: PermitServiceError) -> Response {
    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    (status_for(&error), axum::Json(payload)).into_response()
}

fn invalid_request(message: String) -> Response {
    let payload = json!({
        "error": message,
        "kind": "InvalidInput",
    });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
}

fn page_view(page: Page<ApplicationRecord>, api_base: &str) -> Page<ApplicationView> {
    Page {
        page: page.page,
        page_size: page.page_size,
        total_items: page.total_items,
        total_pages: page.total_pages,
        items: page
            .items
            .iter()
            .map(|record| record.view(api_base))
            .collect(),
    }
}

fn record_response<R, E>(
    service: &PermitWorkflowService<R, E>,
    status: StatusCode,
    result: Result<ApplicationRecord, PermitServiceError>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    match result {
        Ok(record) => {
            let view = record.view(&service.settings().api_base);
            (status, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let result = service.submit(submission);
    record_response(&service, StatusCode::ACCEPTED, result)
}

pub(crate) async fn legacy_submit_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    axum::Json(legacy): axum::Json<LegacySubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let result = service.submit_legacy(legacy);
    record_response(&service, StatusCode::ACCEPTED, result)
}

pub(crate) async fn status_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Path(id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let result = service.get(&ApplicationId(id));
    record_response(&service, StatusCode::OK, result)
}

pub(crate) async fn list_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Query(params): Query<ListParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let office = match params.office.parse::<OfficeKey>() {
        Ok(office) => office,
        Err(error) => return invalid_request(error.to_string()),
    };
    let bucket = match params.status.as_deref() {
        Some(raw) => match raw.parse::<StatusBucket>() {
            Ok(bucket) => bucket,
            Err(error) => return invalid_request(error.to_string()),
        },
        None => StatusBucket::Pending,
    };
    let query = ListQuery::new(office, bucket).with_page(params.page.unwrap_or(1));

    match service.list(query) {
        Ok(page) => {
            let view = page_view(page, &service.settings().api_base);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approve_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Path((office, id)): Path<(String, String)>,
    axum::Json(input): axum::Json<ApprovalInput>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let office = match office.parse::<OfficeKey>() {
        Ok(office) => office,
        Err(error) => return invalid_request(error.to_string()),
    };
    let result = service.decide(&ApplicationId(id), office, Decision::Approve(input));
    record_response(&service, StatusCode::OK, result)
}

pub(crate) async fn decline_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Path((office, id)): Path<(String, String)>,
    axum::Json(request): axum::Json<DeclineRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let office = match office.parse::<OfficeKey>() {
        Ok(office) => office,
        Err(error) => return invalid_request(error.to_string()),
    };
    let reason = compose_decline_reason(&request.reasons, request.other.as_deref());
    let result = service.decide(&ApplicationId(id), office, Decision::Decline { reason });
    record_response(&service, StatusCode::OK, result)
}

pub(crate) async fn counts_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Path(office): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let office = match office.parse::<OfficeKey>() {
        Ok(office) => office,
        Err(error) => return invalid_request(error.to_string()),
    };
    match service.counts(office) {
        Ok(counts) => (StatusCode::OK, axum::Json(counts)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn handoff_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Query(params): Query<PageParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    match service.list_business_tax_handoff(params.page.unwrap_or(1)) {
        Ok(page) => {
            let view = page_view(page, &service.settings().api_base);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn business_tax_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Path(id): Path<String>,
    axum::Json(itemization): axum::Json<BusinessTaxItemization>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let result = service.assess_business_tax(&ApplicationId(id), itemization);
    record_response(&service, StatusCode::OK, result)
}

pub(crate) async fn treasurer_queue_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Query(params): Query<PageParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    match service.list_ready_for_payment(params.page.unwrap_or(1)) {
        Ok(page) => {
            let view = page_view(page, &service.settings().api_base);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn payment_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<PaymentRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let index = request.index;
    match service.record_payment(&ApplicationId(id), index, request.into()) {
        Ok((record, receipt)) => {
            let payload = json!({
                "application": record.view(&service.settings().api_base),
                "receipt": receipt,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn payment_mode_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<PaymentModeRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    let result = service.override_payment_mode(&ApplicationId(id), request.mode, &request.actor);
    record_response(&service, StatusCode::OK, result)
}

pub(crate) async fn export_handler<R, E>(
    State(service): State<Arc<PermitWorkflowService<R, E>>>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: ExportGateway + 'static,
{
    match service.export_business_profiles() {
        Ok(export) => (StatusCode::OK, axum::Json(export)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn zoning_fee_handler(Query(params): Query<ZoningParams>) -> Response {
    let fee = parse_amount("capital", &params.capital).and_then(|capital| {
        compute_zoning_fee(capital).map(|fee| (capital, fee))
    });
    match fee {
        Ok((capital, fee)) => {
            let payload = json!({
                "capital": capital,
                "fee": fee,
                "label": fee.label(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error.into()),
    }
}
