//! Office fee schedules.
//!
//! Every function here is deterministic and total over non-negative amounts. Raw
//! form input goes through [`parse_amount`] first, which is the only place a
//! non-numeric value can be rejected.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors raised while evaluating fee schedules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeError {
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("fee brackets are not contiguous at position {position}")]
    NonContiguousBrackets { position: usize },
    #[error("no fee bracket covers {0}")]
    Uncovered(Decimal),
}

/// Round half away from zero to centavos.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a monetary form field, accepting thousands separators.
pub fn parse_amount(field: &'static str, raw: &str) -> Result<Decimal, FeeError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(FeeError::InvalidInput {
            field,
            reason: "value is blank".to_string(),
        });
    }

    let amount = Decimal::from_str(&cleaned).map_err(|_| FeeError::InvalidInput {
        field,
        reason: format!("'{raw}' is not a number"),
    })?;
    ensure_non_negative(field, amount)?;
    Ok(amount)
}

pub(crate) fn ensure_non_negative(field: &'static str, amount: Decimal) -> Result<(), FeeError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(FeeError::InvalidInput {
            field,
            reason: format!("{amount} is negative"),
        });
    }
    Ok(())
}

/// How a bracket converts capital into a fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeRule {
    Flat(Decimal),
    Exempted,
    /// `base + rate * (capital - threshold)`
    Linear {
        base: Decimal,
        rate: Decimal,
        threshold: Decimal,
    },
}

/// Half-open capital range `(lower, upper]`; `None` leaves that side unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBracket {
    pub lower: Option<Decimal>,
    pub upper: Option<Decimal>,
    pub rule: FeeRule,
}

impl FeeBracket {
    pub fn contains(&self, capital: Decimal) -> bool {
        self.lower.map_or(true, |lower| capital > lower)
            && self.upper.map_or(true, |upper| capital <= upper)
    }
}

/// Result of a bracket evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum ZoningFee {
    Exempted,
    Amount(Decimal),
}

impl ZoningFee {
    pub fn amount(self) -> Decimal {
        match self {
            ZoningFee::Exempted => Decimal::ZERO,
            ZoningFee::Amount(amount) => amount,
        }
    }

    pub fn label(self) -> String {
        match self {
            ZoningFee::Exempted => "Exempted".to_string(),
            ZoningFee::Amount(amount) => format!("{:.2}", amount),
        }
    }
}

/// Ordered, contiguous bracket table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    brackets: Vec<FeeBracket>,
}

impl FeeSchedule {
    pub fn new(brackets: Vec<FeeBracket>) -> Result<Self, FeeError> {
        for (position, pair) in brackets.windows(2).enumerate() {
            if pair[0].upper.is_none() || pair[0].upper != pair[1].lower {
                return Err(FeeError::NonContiguousBrackets {
                    position: position + 1,
                });
            }
        }
        Ok(Self { brackets })
    }

    /// Municipal zoning clearance schedule.
    pub fn zoning() -> Self {
        let amount = |value: i64| Decimal::new(value, 0);
        Self {
            brackets: vec![
                FeeBracket {
                    lower: None,
                    upper: Some(amount(5_000)),
                    rule: FeeRule::Exempted,
                },
                FeeBracket {
                    lower: Some(amount(5_000)),
                    upper: Some(amount(10_000)),
                    rule: FeeRule::Flat(amount(100)),
                },
                FeeBracket {
                    lower: Some(amount(10_000)),
                    upper: Some(amount(50_000)),
                    rule: FeeRule::Flat(amount(200)),
                },
                FeeBracket {
                    lower: Some(amount(50_000)),
                    upper: Some(amount(100_000)),
                    rule: FeeRule::Flat(amount(300)),
                },
                FeeBracket {
                    lower: Some(amount(100_000)),
                    upper: None,
                    rule: FeeRule::Linear {
                        base: amount(500),
                        rate: Decimal::new(1, 3),
                        threshold: amount(100_000),
                    },
                },
            ],
        }
    }

    pub fn evaluate(&self, capital: Decimal) -> Result<ZoningFee, FeeError> {
        ensure_non_negative("capital", capital)?;

        let bracket = self
            .brackets
            .iter()
            .find(|bracket| bracket.contains(capital))
            .ok_or(FeeError::Uncovered(capital))?;

        Ok(match bracket.rule {
            FeeRule::Exempted => ZoningFee::Exempted,
            FeeRule::Flat(amount) => ZoningFee::Amount(amount),
            FeeRule::Linear {
                base,
                rate,
                threshold,
            } => ZoningFee::Amount(round2((capital - threshold) * rate + base)),
        })
    }
}

pub fn compute_zoning_fee(total_capital: Decimal) -> Result<ZoningFee, FeeError> {
    FeeSchedule::zoning().evaluate(total_capital)
}

/// The six inspection fees assessed by the building official.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OboInspectionFees {
    #[serde(default)]
    pub architectural_presentability: Option<Decimal>,
    #[serde(default)]
    pub sanitary: Option<Decimal>,
    #[serde(default)]
    pub mechanical: Option<Decimal>,
    #[serde(default)]
    pub electrical: Option<Decimal>,
    #[serde(default)]
    pub signage: Option<Decimal>,
    #[serde(default)]
    pub electronics: Option<Decimal>,
}

impl OboInspectionFees {
    fn fields(&self) -> [(&'static str, Option<Decimal>); 6] {
        [
            ("architectural_presentability", self.architectural_presentability),
            ("sanitary", self.sanitary),
            ("mechanical", self.mechanical),
            ("electrical", self.electrical),
            ("signage", self.signage),
            ("electronics", self.electronics),
        ]
    }

    /// Names of the inspection fields that were left blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name)
            .collect()
    }

    pub fn validate(&self) -> Result<(), FeeError> {
        for (name, value) in self.fields() {
            if let Some(amount) = value {
                ensure_non_negative(name, amount)?;
            }
        }
        Ok(())
    }
}

pub fn obo_total(fees: &OboInspectionFees) -> Decimal {
    fees.fields()
        .into_iter()
        .map(|(_, value)| value.unwrap_or_default())
        .sum()
}

/// Receipt categories used on the official payment receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCategory {
    BusinessTax,
    MayorsPermit,
    BarangayFee,
    OccupationalTax,
    HealthAndObo,
    RegulatoryAndEnvironmental,
    OtherCharges,
}

impl FeeCategory {
    pub const ALL: [FeeCategory; 7] = [
        FeeCategory::BusinessTax,
        FeeCategory::MayorsPermit,
        FeeCategory::BarangayFee,
        FeeCategory::OccupationalTax,
        FeeCategory::HealthAndObo,
        FeeCategory::RegulatoryAndEnvironmental,
        FeeCategory::OtherCharges,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            FeeCategory::BusinessTax => "Business Tax",
            FeeCategory::MayorsPermit => "Mayor's Permit",
            FeeCategory::BarangayFee => "Barangay Fee",
            FeeCategory::OccupationalTax => "Occupational Tax",
            FeeCategory::HealthAndObo => "Health Certificate & OBO Fees",
            FeeCategory::RegulatoryAndEnvironmental => "Regulatory & Environmental Fees",
            FeeCategory::OtherCharges => "Other Charges",
        }
    }
}

/// Itemized assessment entered by the business tax examiner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessTaxItemization {
    #[serde(default)]
    pub business_tax: Option<Decimal>,
    #[serde(default)]
    pub mayors_permit: Option<Decimal>,
    #[serde(default)]
    pub barangay_fee: Option<Decimal>,
    #[serde(default)]
    pub occupational_tax: Option<Decimal>,
    #[serde(default)]
    pub health_certificate: Option<Decimal>,
    #[serde(default)]
    pub obo_fee: Option<Decimal>,
    #[serde(default)]
    pub delivery_vehicle: Option<Decimal>,
    #[serde(default)]
    pub surcharge: Option<Decimal>,
    #[serde(default)]
    pub interest: Option<Decimal>,
    #[serde(default)]
    pub tinplate: Option<Decimal>,
    #[serde(default)]
    pub verification: Option<Decimal>,
    #[serde(default)]
    pub zoning_fee: Option<Decimal>,
    #[serde(default)]
    pub environment_fee: Option<Decimal>,
    #[serde(default)]
    pub solid_waste_fee: Option<Decimal>,
    #[serde(default)]
    pub veterinary_fee: Option<Decimal>,
    #[serde(default)]
    pub fixed_tax: Option<Decimal>,
    #[serde(default)]
    pub other_charges: Option<Decimal>,
}

impl BusinessTaxItemization {
    fn categorized(&self) -> [(FeeCategory, &'static str, Option<Decimal>); 17] {
        use FeeCategory::*;
        [
            (BusinessTax, "business_tax", self.business_tax),
            (MayorsPermit, "mayors_permit", self.mayors_permit),
            (BarangayFee, "barangay_fee", self.barangay_fee),
            (OccupationalTax, "occupational_tax", self.occupational_tax),
            (HealthAndObo, "health_certificate", self.health_certificate),
            (HealthAndObo, "obo_fee", self.obo_fee),
            (RegulatoryAndEnvironmental, "delivery_vehicle", self.delivery_vehicle),
            (RegulatoryAndEnvironmental, "surcharge", self.surcharge),
            (RegulatoryAndEnvironmental, "interest", self.interest),
            (RegulatoryAndEnvironmental, "tinplate", self.tinplate),
            (RegulatoryAndEnvironmental, "verification", self.verification),
            (RegulatoryAndEnvironmental, "zoning_fee", self.zoning_fee),
            (RegulatoryAndEnvironmental, "environment_fee", self.environment_fee),
            (RegulatoryAndEnvironmental, "solid_waste_fee", self.solid_waste_fee),
            (OtherCharges, "veterinary_fee", self.veterinary_fee),
            (OtherCharges, "fixed_tax", self.fixed_tax),
            (OtherCharges, "other_charges", self.other_charges),
        ]
    }

    pub fn validate(&self) -> Result<(), FeeError> {
        for (_, name, value) in self.categorized() {
            if let Some(amount) = value {
                ensure_non_negative(name, amount)?;
            }
        }
        Ok(())
    }

    pub fn total(&self) -> Decimal {
        self.categorized()
            .into_iter()
            .map(|(_, _, value)| value.unwrap_or_default())
            .sum()
    }
}

/// Collapse the itemized assessment into the seven receipt categories.
pub fn compute_grouped_fee_totals(
    itemization: &BusinessTaxItemization,
) -> BTreeMap<FeeCategory, Decimal> {
    let mut totals: BTreeMap<FeeCategory, Decimal> = FeeCategory::ALL
        .into_iter()
        .map(|category| (category, Decimal::ZERO))
        .collect();

    for (category, _, value) in itemization.categorized() {
        *totals.entry(category).or_default() += value.unwrap_or_default();
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    #[test]
    fn zoning_fee_matches_bracket_edges() {
        assert_eq!(compute_zoning_fee(d(0)).unwrap(), ZoningFee::Exempted);
        assert_eq!(compute_zoning_fee(d(5_000)).unwrap(), ZoningFee::Exempted);
        assert_eq!(compute_zoning_fee(d(5_001)).unwrap(), ZoningFee::Amount(d(100)));
        assert_eq!(compute_zoning_fee(d(10_000)).unwrap(), ZoningFee::Amount(d(100)));
        assert_eq!(compute_zoning_fee(d(10_001)).unwrap(), ZoningFee::Amount(d(200)));
        assert_eq!(compute_zoning_fee(d(50_001)).unwrap(), ZoningFee::Amount(d(300)));
        assert_eq!(compute_zoning_fee(d(100_000)).unwrap(), ZoningFee::Amount(d(300)));
        assert_eq!(
            compute_zoning_fee(d(100_001)).unwrap(),
            ZoningFee::Amount(Decimal::new(50000, 2))
        );
        assert_eq!(
            compute_zoning_fee(d(150_000)).unwrap(),
            ZoningFee::Amount(Decimal::new(55000, 2))
        );
    }

    #[test]
    fn fractional_capital_falls_into_next_bracket() {
        let fee = compute_zoning_fee(Decimal::new(500_050, 2)).unwrap();
        assert_eq!(fee, ZoningFee::Amount(d(100)));
    }

    #[test]
    fn zoning_fee_is_monotonic_above_exemption() {
        let mut previous = Decimal::ZERO;
        for capital in (5_001..2_000_000).step_by(7_919) {
            let fee = compute_zoning_fee(d(capital)).unwrap().amount();
            assert!(fee >= previous, "fee dropped at capital {capital}");
            previous = fee;
        }
    }

    #[test]
    fn negative_capital_is_rejected() {
        assert!(matches!(
            compute_zoning_fee(d(-1)),
            Err(FeeError::InvalidInput { field: "capital", .. })
        ));
    }

    #[test]
    fn parse_amount_rejects_non_numeric_and_negative_values() {
        assert_eq!(parse_amount("capital", " 1,250.50 ").unwrap(), Decimal::new(125050, 2));
        assert!(matches!(
            parse_amount("capital", "abc"),
            Err(FeeError::InvalidInput { .. })
        ));
        assert!(matches!(
            parse_amount("capital", "-3"),
            Err(FeeError::InvalidInput { .. })
        ));
        assert!(matches!(
            parse_amount("capital", "  "),
            Err(FeeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn schedule_rejects_gaps_between_brackets() {
        let result = FeeSchedule::new(vec![
            FeeBracket {
                lower: None,
                upper: Some(d(100)),
                rule: FeeRule::Exempted,
            },
            FeeBracket {
                lower: Some(d(200)),
                upper: None,
                rule: FeeRule::Flat(d(5)),
            },
        ]);
        assert_eq!(result, Err(FeeError::NonContiguousBrackets { position: 1 }));
    }

    #[test]
    fn obo_total_defaults_missing_fields_to_zero() {
        let fees = OboInspectionFees {
            architectural_presentability: Some(d(150)),
            sanitary: Some(Decimal::new(7550, 2)),
            electrical: Some(d(200)),
            ..OboInspectionFees::default()
        };
        assert_eq!(obo_total(&fees), Decimal::new(42550, 2));
        assert_eq!(
            fees.missing_fields(),
            vec!["mechanical", "signage", "electronics"]
        );
    }

    #[test]
    fn grouped_totals_cover_every_category() {
        let itemization = BusinessTaxItemization {
            business_tax: Some(d(1_000)),
            mayors_permit: Some(d(500)),
            health_certificate: Some(d(100)),
            obo_fee: Some(d(250)),
            surcharge: Some(d(25)),
            zoning_fee: Some(d(300)),
            fixed_tax: Some(d(40)),
            ..BusinessTaxItemization::default()
        };

        let totals = compute_grouped_fee_totals(&itemization);
        assert_eq!(totals.len(), 7);
        assert_eq!(totals[&FeeCategory::BusinessTax], d(1_000));
        assert_eq!(totals[&FeeCategory::BarangayFee], Decimal::ZERO);
        assert_eq!(totals[&FeeCategory::HealthAndObo], d(350));
        assert_eq!(totals[&FeeCategory::RegulatoryAndEnvironmental], d(325));
        assert_eq!(totals[&FeeCategory::OtherCharges], d(40));

        let sum: Decimal = totals.values().copied().sum();
        assert_eq!(sum, itemization.total());
    }
}
