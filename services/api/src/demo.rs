use crate::infra::{
    parse_money, parse_payment_mode, InMemoryApplicationRepository, InMemoryExportGateway,
};
use chrono::Local;
use clap::Args;
use permit_flow::error::AppError;
use permit_flow::workflows::permits::{
    amount_to_words, build_installments, compose_decline_reason, compute_zoning_fee,
    required_offices, ApplicantProfile, ApplicationKind, ApplicationRecord, ApprovalInput,
    BusinessTaxItemization, CertificateRef, Decision, DeclineReason, FeeCategory,
    InstallmentPlan, LegacyBusinessProfile, LegacyLineColumns, LegacySubmission,
    FeeRequirement, OboInspectionFees, OfficeKey, OfficeRequirements, PaymentEntry,
    PaymentMethodKind, PaymentMode, PermitServiceError, PermitWorkflowService, RecordError,
    WorkflowSettings, ZoningFee,
};
use rust_decimal::Decimal;
use std::sync::Arc;

type DemoService = PermitWorkflowService<InMemoryApplicationRepository, InMemoryExportGateway>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Capital of the second business line (the first is fixed at 25,000)
    #[arg(long, value_parser = parse_money, default_value = "125,000")]
    pub(crate) capital: Decimal,
    /// Annual, Semi-Annual, or Quarterly
    #[arg(long, value_parser = parse_payment_mode, default_value = "Quarterly")]
    pub(crate) mode: PaymentMode,
    /// Run the renewal path instead of a new application
    #[arg(long)]
    pub(crate) renew: bool,
    /// Decline at this office instead of approving, e.g. ZONING
    #[arg(long)]
    pub(crate) decline: Option<OfficeKey>,
}

pub(crate) fn run_zoning_fee(capital: Decimal) -> Result<(), AppError> {
    let fee = compute_zoning_fee(capital).map_err(PermitServiceError::from)?;
    println!("Zoning fee for capital {capital:.2}: {}", fee.label());
    Ok(())
}

pub(crate) fn run_installment_plan(total: Decimal, mode: PaymentMode) -> Result<(), AppError> {
    let plan = build_installments(total, mode)
        .map_err(|err| PermitServiceError::Record(RecordError::Payment(err)))?;
    println!("{} schedule for {total:.2}", mode.label());
    render_plan(&plan);
    Ok(())
}

fn render_plan(plan: &InstallmentPlan) {
    for installment in plan.installments() {
        let status = match installment.amount_paid {
            Some(paid) => format!("paid {paid:.2}"),
            None => "unpaid".to_string(),
        };
        println!(
            "- #{} due {}: {:.2} ({status})",
            installment.index + 1,
            installment.due_date,
            installment.amount_due
        );
    }
}

fn legacy_submission(kind: ApplicationKind, capital: Decimal, mode: PaymentMode) -> LegacySubmission {
    LegacySubmission {
        kind,
        applicant: ApplicantProfile {
            first_name: "Juan".to_string(),
            middle_name: Some("Bautista".to_string()),
            last_name: "Dela Cruz".to_string(),
            contact_number: "09181234567".to_string(),
            email: Some("juan.delacruz@example.com".to_string()),
            address: "45 Mabini St, San Roque".to_string(),
            tax_address: None,
        },
        business: LegacyBusinessProfile {
            business_name: "Dela Cruz General Merchandise".to_string(),
            business_type: "Sole Proprietorship".to_string(),
            trade_name: Some("JDC Store".to_string()),
            business_address: "45 Mabini St, San Roque".to_string(),
            lines: LegacyLineColumns {
                line_of_business: r#"["Retail","Food Service"]"#.to_string(),
                product_service: r#"["General merchandise","Carinderia"]"#.to_string(),
                unit: r#"["1","1"]"#.to_string(),
                capital: format!(r#"["25,000","{capital}"]"#),
                nature_code: r#"["R-01","F-02"]"#.to_string(),
                business_nature: r#"["Retailer","Restaurant"]"#.to_string(),
                line_code: r#"["1001","2002"]"#.to_string(),
            },
        },
        mode_of_payment: mode,
    }
}

fn demo_approval(record: &ApplicationRecord, office: OfficeKey) -> ApprovalInput {
    let requirements = OfficeRequirements::for_office(office);
    let certificate = requirements.certificate.then(|| CertificateRef {
        file_key: format!("{}/{}-clearance.pdf", record.id, office.label().to_lowercase()),
        file_name: format!("{}-clearance.pdf", office.label().to_lowercase()),
    });
    let bin = requirements
        .assigns_bin
        .then(|| format!("BIN-{}", record.id.0.trim_start_matches("bp-")));

    let (fee, inspection) = match requirements.fee {
        FeeRequirement::Amount => (Some(Decimal::new(300, 0)), None),
        FeeRequirement::ZoningSchedule => match compute_zoning_fee(record.total_capital()) {
            Ok(ZoningFee::Amount(amount)) => (Some(amount), None),
            _ => (None, None),
        },
        FeeRequirement::Inspection => (
            None,
            Some(OboInspectionFees {
                architectural_presentability: Some(Decimal::new(100, 0)),
                sanitary: Some(Decimal::new(150, 0)),
                mechanical: Some(Decimal::new(200, 0)),
                electrical: Some(Decimal::new(250, 0)),
                signage: Some(Decimal::new(50, 0)),
                electronics: Some(Decimal::new(75, 0)),
            }),
        ),
        FeeRequirement::None => (None, None),
    };

    ApprovalInput {
        fee,
        inspection,
        certificate,
        bin,
    }
}

fn demo_itemization(record: &ApplicationRecord) -> BusinessTaxItemization {
    let zoning_fee = record.office(OfficeKey::Zoning).fee;
    let obo_fee = record.office(OfficeKey::Obo).fee;
    BusinessTaxItemization {
        business_tax: Some(Decimal::new(2_400, 0)),
        mayors_permit: Some(Decimal::new(500, 0)),
        barangay_fee: Some(Decimal::new(300, 0)),
        occupational_tax: Some(Decimal::new(100, 0)),
        health_certificate: record.office(OfficeKey::Cho).fee,
        obo_fee,
        zoning_fee,
        environment_fee: record.office(OfficeKey::Cenro).fee,
        solid_waste_fee: record.office(OfficeKey::Csmwo).fee,
        tinplate: Some(Decimal::new(5_050, 2)),
        ..BusinessTaxItemization::default()
    }
}

fn print_offices(record: &ApplicationRecord) {
    for office in OfficeKey::ALL {
        let state = record.office(office);
        let detail = match (&state.fee, &state.reason) {
            (Some(fee), _) => format!(" fee {fee:.2}"),
            (None, Some(reason)) => format!(" ({reason})"),
            (None, None) => String::new(),
        };
        println!("- {office}: {}{detail}", state.status.label());
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        capital,
        mode,
        renew,
        decline,
    } = args;
    let kind = if renew {
        ApplicationKind::Renew
    } else {
        ApplicationKind::New
    };

    let exports = Arc::new(InMemoryExportGateway::default());
    let service: DemoService = PermitWorkflowService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        exports.clone(),
        WorkflowSettings::default(),
    );

    println!("Business permit workflow demo ({})", Local::now().date_naive());
    let record = service.submit_legacy(legacy_submission(kind, capital, mode))?;
    println!(
        "Submitted {} for {} ({} line(s), total capital {:.2})",
        record.id,
        record.business.business_name,
        record.business.lines.len(),
        record.total_capital()
    );
    let zoning = compute_zoning_fee(record.total_capital()).map_err(PermitServiceError::from)?;
    println!("Computed zoning fee: {}", zoning.label());

    println!("\nBackroom review");
    let mut latest = record.clone();
    for office in required_offices(kind) {
        let decision = if decline == Some(*office) {
            Decision::Decline {
                reason: compose_decline_reason(
                    &[DeclineReason::IncompleteRequirements],
                    Some("demo decline"),
                ),
            }
        } else {
            Decision::Approve(demo_approval(&latest, *office))
        };
        latest = service.decide(&record.id, *office, decision)?;
    }
    print_offices(&latest);

    if !latest.is_ready_for_business_tax() {
        println!("\nApplication did not reach Business Tax; stopping here.");
        return Ok(());
    }
    let bin = latest
        .bin
        .as_ref()
        .map(|bin| bin.0.clone())
        .unwrap_or_default();
    println!("\nBPLO assigned BIN {bin}; handed off to Business Tax");

    let assessed = service.assess_business_tax(&record.id, demo_itemization(&latest))?;
    println!(
        "\nBusiness tax assessed: {:.2} ({})",
        assessed.business_tax_total.unwrap_or_default(),
        assessed.mode_of_payment.label()
    );
    for category in FeeCategory::ALL {
        let amount = assessed
            .fee_breakdown
            .get(&category)
            .copied()
            .unwrap_or_default();
        println!("- {}: {amount:.2}", category.label());
    }

    let due = assessed
        .installments
        .as_ref()
        .map(|plan| plan.required_for_clearance(kind))
        .unwrap_or_default();
    let amounts: Vec<Decimal> = assessed
        .installments
        .as_ref()
        .map(|plan| {
            plan.installments()
                .iter()
                .map(|installment| installment.amount_due)
                .collect()
        })
        .unwrap_or_default();

    println!("\nTreasurer");
    let today = Local::now().date_naive();
    for (index, amount) in amounts.into_iter().take(due).enumerate() {
        let entry = PaymentEntry {
            amount_paid: Some(amount),
            method: PaymentMethodKind::Cash,
            or_number: Some(format!("OR-{:05}", index + 1)),
            payment_date: Some(today),
            drawee_bank: None,
            check_number: None,
            check_date: None,
        };
        let (_, receipt) = service.record_payment(&record.id, index, entry)?;
        println!(
            "- {} paid {:.2}: {}",
            receipt.or_number, receipt.amount_paid, receipt.amount_in_words
        );
    }

    let settled = service.get(&record.id)?;
    if let Some(plan) = &settled.installments {
        render_plan(plan);
    }
    println!(
        "Treasurer column: {} | fully settled: {}",
        settled.office_status(OfficeKey::Treasurer).label(),
        settled.is_fully_settled()
    );
    println!(
        "Renderer queue: {} certificate(s), {} receipt(s)",
        exports.certificates().len(),
        exports.receipts().len()
    );
    println!(
        "Total paid in words: {}",
        amount_to_words(
            settled
                .installments
                .as_ref()
                .map(InstallmentPlan::amount_paid)
                .unwrap_or_default()
        )
    );

    let export = service.export_business_profiles()?;
    println!("\nExported {}", export.filename);
    print!("{}", export.csv);
    Ok(())
}
