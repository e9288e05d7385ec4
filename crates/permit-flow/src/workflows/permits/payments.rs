//! Installment plans for assessed business tax.
//!
//! Plans are immutable values: recording a payment produces a new plan so a
//! rejected entry never leaves a half-updated installment behind.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationKind, PaymentMode};
use super::fees::round2;

const QUARTERLY_DUE_DATES: [&str; 4] = ["January 20", "April 20", "July 20", "October 20"];
const SEMI_ANNUAL_DUE_DATES: [&str; 2] = ["January 20", "July 20"];
const ANNUAL_DUE_DATES: [&str; 1] = ["January 20"];

/// Errors raised while building or settling an installment plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("installment {index} cannot be paid before installment {previous}")]
    OutOfSequence { index: usize, previous: usize },
    #[error("installment {index} is already paid")]
    AlreadyPaid { index: usize },
    #[error("payment requires {field}")]
    MissingRequiredField { field: &'static str },
    #[error("invalid payment input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethodKind {
    Cash,
    Check,
}

/// Settlement metadata stamped on a paid installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum PaymentMethod {
    Cash,
    Check {
        drawee_bank: String,
        check_number: String,
        check_date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub or_number: String,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
}

/// Treasurer input for one installment, as captured by the payment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEntry {
    #[serde(default)]
    pub amount_paid: Option<Decimal>,
    pub method: PaymentMethodKind,
    #[serde(default)]
    pub or_number: Option<String>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub drawee_bank: Option<String>,
    #[serde(default)]
    pub check_number: Option<String>,
    #[serde(default)]
    pub check_date: Option<NaiveDate>,
}

fn required_text(value: Option<&str>, field: &'static str) -> Result<String, PaymentError> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(PaymentError::MissingRequiredField { field })
}

impl PaymentEntry {
    /// Validate the method-specific fields and return the amount with its metadata.
    pub fn into_details(self) -> Result<(Decimal, PaymentDetails), PaymentError> {
        let amount = self
            .amount_paid
            .ok_or(PaymentError::MissingRequiredField { field: "amount_paid" })?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PaymentError::InvalidInput(format!(
                "amount paid {amount} is negative"
            )));
        }
        let or_number = required_text(self.or_number.as_deref(), "or_number")?;

        let (payment_date, method) = match self.method {
            PaymentMethodKind::Cash => {
                let date = self
                    .payment_date
                    .ok_or(PaymentError::MissingRequiredField { field: "payment_date" })?;
                (date, PaymentMethod::Cash)
            }
            PaymentMethodKind::Check => {
                let drawee_bank = required_text(self.drawee_bank.as_deref(), "drawee_bank")?;
                let check_number = required_text(self.check_number.as_deref(), "check_number")?;
                let check_date = self
                    .check_date
                    .ok_or(PaymentError::MissingRequiredField { field: "check_date" })?;
                (
                    self.payment_date.unwrap_or(check_date),
                    PaymentMethod::Check {
                        drawee_bank,
                        check_number,
                        check_date,
                    },
                )
            }
        };

        Ok((
            amount,
            PaymentDetails {
                or_number,
                payment_date,
                method,
            },
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub index: usize,
    pub amount_due: Decimal,
    pub due_date: String,
    pub amount_paid: Option<Decimal>,
    pub payment: Option<PaymentDetails>,
}

impl Installment {
    pub fn is_paid(&self) -> bool {
        self.amount_paid.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub mode: PaymentMode,
    pub total: Decimal,
    pub installments: Vec<Installment>,
}

impl InstallmentPlan {
    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn is_fully_settled(&self) -> bool {
        self.installments.iter().all(Installment::is_paid)
    }

    pub fn amount_paid(&self) -> Decimal {
        self.installments
            .iter()
            .filter_map(|installment| installment.amount_paid)
            .sum()
    }

    /// Number of leading installments that must be paid before the permit is released.
    pub fn required_for_clearance(&self, kind: ApplicationKind) -> usize {
        match kind {
            ApplicationKind::New => self.installments.len(),
            ApplicationKind::Renew => self.installments.len().min(1),
        }
    }

    pub fn is_cleared(&self, kind: ApplicationKind) -> bool {
        self.installments
            .iter()
            .take(self.required_for_clearance(kind))
            .all(Installment::is_paid)
    }

    /// First unpaid installment, i.e. the only one that may be paid next.
    pub fn next_due(&self) -> Option<&Installment> {
        self.installments.iter().find(|installment| !installment.is_paid())
    }
}

fn due_dates(mode: PaymentMode) -> &'static [&'static str] {
    match mode {
        PaymentMode::Annual => &ANNUAL_DUE_DATES,
        PaymentMode::SemiAnnual => &SEMI_ANNUAL_DUE_DATES,
        PaymentMode::Quarterly => &QUARTERLY_DUE_DATES,
    }
}

/// Split `total` into equal installments; the last one absorbs any rounding remainder.
pub fn build_installments(
    total: Decimal,
    mode: PaymentMode,
) -> Result<InstallmentPlan, PaymentError> {
    if total.is_sign_negative() && !total.is_zero() {
        return Err(PaymentError::InvalidInput(format!(
            "total {total} is negative"
        )));
    }

    let count = mode.installment_count();
    let share = round2(total / Decimal::from(count));
    let last = total - share * Decimal::from(count - 1);

    let installments = due_dates(mode)
        .iter()
        .take(count)
        .enumerate()
        .map(|(index, due_date)| Installment {
            index,
            amount_due: if index + 1 == count { last } else { share },
            due_date: (*due_date).to_string(),
            amount_paid: None,
            payment: None,
        })
        .collect();

    Ok(InstallmentPlan {
        mode,
        total,
        installments,
    })
}

/// Settle installment `index`, enforcing sequential payment.
pub fn record_payment(
    plan: &InstallmentPlan,
    index: usize,
    entry: PaymentEntry,
) -> Result<InstallmentPlan, PaymentError> {
    let installment = plan.installments.get(index).ok_or_else(|| {
        PaymentError::InvalidInput(format!(
            "installment {index} does not exist (plan has {})",
            plan.installments.len()
        ))
    })?;
    if installment.is_paid() {
        return Err(PaymentError::AlreadyPaid { index });
    }
    if let Some(next_due) = plan.next_due().filter(|next| next.index < index) {
        return Err(PaymentError::OutOfSequence {
            index,
            previous: next_due.index,
        });
    }

    let (amount, details) = entry.into_details()?;

    let mut next = plan.clone();
    let target = &mut next.installments[index];
    target.amount_paid = Some(amount);
    target.payment = Some(details);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cash(amount: i64) -> PaymentEntry {
        PaymentEntry {
            amount_paid: Some(Decimal::new(amount, 0)),
            method: PaymentMethodKind::Cash,
            or_number: Some("OR-1001".to_string()),
            payment_date: NaiveDate::from_ymd_opt(2025, 1, 15),
            drawee_bank: None,
            check_number: None,
            check_date: None,
        }
    }

    #[test]
    fn quarterly_plan_splits_evenly() {
        let plan = build_installments(Decimal::new(120_000, 0), PaymentMode::Quarterly).unwrap();
        let amounts: Vec<Decimal> = plan.installments.iter().map(|i| i.amount_due).collect();
        assert_eq!(amounts, vec![Decimal::new(30_000, 0); 4]);
        let dates: Vec<&str> = plan.installments.iter().map(|i| i.due_date.as_str()).collect();
        assert_eq!(dates, ["January 20", "April 20", "July 20", "October 20"]);
    }

    #[test]
    fn annual_and_semi_annual_plans() {
        let annual = build_installments(Decimal::new(120_000, 0), PaymentMode::Annual).unwrap();
        assert_eq!(annual.installments.len(), 1);
        assert_eq!(annual.installments[0].amount_due, Decimal::new(120_000, 0));
        assert_eq!(annual.installments[0].due_date, "January 20");

        let semi = build_installments(Decimal::new(1_000, 0), PaymentMode::SemiAnnual).unwrap();
        assert_eq!(semi.installments.len(), 2);
        assert_eq!(semi.installments[1].due_date, "July 20");
    }

    #[test]
    fn remainder_lands_on_last_installment() {
        let plan = build_installments(Decimal::new(10_000, 2), PaymentMode::Quarterly).unwrap();
        let total: Decimal = plan.installments.iter().map(|i| i.amount_due).sum();
        assert_eq!(total, Decimal::new(100, 0));

        let plan = build_installments(Decimal::new(100, 0), PaymentMode::SemiAnnual).unwrap();
        assert_eq!(plan.installments[0].amount_due, Decimal::new(50, 0));

        let odd = build_installments(Decimal::new(10_001, 2), PaymentMode::Quarterly).unwrap();
        assert_eq!(odd.installments[0].amount_due, Decimal::new(2500, 2));
        assert_eq!(odd.installments[3].amount_due, Decimal::new(2501, 2));
    }

    #[test]
    fn every_mode_has_a_due_date_per_installment() {
        for mode in [PaymentMode::Annual, PaymentMode::SemiAnnual, PaymentMode::Quarterly] {
            assert_eq!(due_dates(mode).len(), mode.installment_count());
            let plan = build_installments(Decimal::new(1_000, 0), mode).unwrap();
            assert_eq!(plan.installments.len(), mode.installment_count());
        }
    }

    #[test]
    fn payments_must_follow_sequence() {
        let plan = build_installments(Decimal::new(120_000, 0), PaymentMode::Quarterly).unwrap();
        assert_eq!(
            record_payment(&plan, 1, cash(30_000)),
            Err(PaymentError::OutOfSequence {
                index: 1,
                previous: 0
            })
        );

        let plan = record_payment(&plan, 0, cash(30_000)).unwrap();
        let plan = record_payment(&plan, 1, cash(30_000)).unwrap();
        assert_eq!(plan.installments[1].amount_paid, Some(Decimal::new(30_000, 0)));
        assert_eq!(
            record_payment(&plan, 1, cash(30_000)),
            Err(PaymentError::AlreadyPaid { index: 1 })
        );
        assert!(!plan.is_fully_settled());
        assert_eq!(plan.next_due().map(|i| i.index), Some(2));
    }

    #[test]
    fn check_payments_require_bank_details() {
        let plan = build_installments(Decimal::new(5_000, 0), PaymentMode::Annual).unwrap();
        let mut entry = cash(5_000);
        entry.method = PaymentMethodKind::Check;
        entry.drawee_bank = Some("Land Bank".to_string());
        assert_eq!(
            record_payment(&plan, 0, entry.clone()),
            Err(PaymentError::MissingRequiredField {
                field: "check_number"
            })
        );

        entry.check_number = Some("000123".to_string());
        entry.check_date = NaiveDate::from_ymd_opt(2025, 1, 10);
        let plan = record_payment(&plan, 0, entry).unwrap();
        assert!(plan.is_fully_settled());
        assert!(matches!(
            plan.installments[0].payment.as_ref().map(|p| &p.method),
            Some(PaymentMethod::Check { .. })
        ));
    }

    #[test]
    fn cash_payment_requires_date_and_amount() {
        let plan = build_installments(Decimal::new(5_000, 0), PaymentMode::Annual).unwrap();
        let mut entry = cash(5_000);
        entry.payment_date = None;
        assert_eq!(
            record_payment(&plan, 0, entry),
            Err(PaymentError::MissingRequiredField {
                field: "payment_date"
            })
        );

        let mut entry = cash(5_000);
        entry.amount_paid = None;
        assert_eq!(
            record_payment(&plan, 0, entry),
            Err(PaymentError::MissingRequiredField {
                field: "amount_paid"
            })
        );
    }

    #[test]
    fn renewals_clear_after_first_installment() {
        let plan = build_installments(Decimal::new(120_000, 0), PaymentMode::Quarterly).unwrap();
        let plan = record_payment(&plan, 0, cash(30_000)).unwrap();
        assert!(plan.is_cleared(ApplicationKind::Renew));
        assert!(!plan.is_cleared(ApplicationKind::New));
    }
}
