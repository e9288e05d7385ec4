use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantProfile, ApplicationKind, ApplicationSubmission, BusinessLine, BusinessProfile,
    PaymentMode,
};
use super::fees::{parse_amount, FeeError};

/// Column blobs exported by the legacy intake form, e.g. `["Retail","Food"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyLineColumns {
    pub line_of_business: String,
    pub product_service: String,
    pub unit: String,
    pub capital: String,
    pub nature_code: String,
    pub business_nature: String,
    pub line_code: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LineParseError {
    #[error("column {column} has {found} entries but line_of_business has {expected}")]
    MismatchedLineColumns {
        column: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("column {column} is not a quoted list: {source}")]
    Malformed {
        column: &'static str,
        source: csv::Error,
    },
    #[error("line {line}: {source}")]
    Capital { line: usize, source: FeeError },
}

fn split_column(column: &'static str, raw: &str) -> Result<Vec<String>, LineParseError> {
    let trimmed = raw.trim();
    let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let inner = inner.strip_suffix(']').unwrap_or(inner).trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(inner.as_bytes());

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LineParseError::Malformed { column, source })?;
        values.extend(record.iter().map(str::to_string));
    }
    Ok(values)
}

/// Convert legacy column blobs into structured lines.
///
/// Columns of different lengths are rejected instead of padded: a short column
/// cannot be told apart from a data-entry error.
pub fn parse_legacy_lines(
    columns: &LegacyLineColumns,
) -> Result<Vec<BusinessLine>, LineParseError> {
    let lines = split_column("line_of_business", &columns.line_of_business)?;
    let expected = lines.len();

    let column = |name: &'static str, raw: &str| -> Result<Vec<String>, LineParseError> {
        let values = split_column(name, raw)?;
        if values.len() != expected {
            return Err(LineParseError::MismatchedLineColumns {
                column: name,
                expected,
                found: values.len(),
            });
        }
        Ok(values)
    };

    let products = column("product_service", &columns.product_service)?;
    let units = column("unit", &columns.unit)?;
    let capitals = column("capital", &columns.capital)?;
    let nature_codes = column("nature_code", &columns.nature_code)?;
    let natures = column("business_nature", &columns.business_nature)?;
    let line_codes = column("line_code", &columns.line_code)?;

    lines
        .into_iter()
        .enumerate()
        .map(|(index, line_of_business)| -> Result<BusinessLine, LineParseError> {
            let capital = parse_amount("capital", &capitals[index])
                .map_err(|source| LineParseError::Capital { line: index, source })?;
            Ok(BusinessLine {
                line_of_business,
                product_service: products[index].clone(),
                unit: units[index].clone(),
                capital,
                nature_code: nature_codes[index].clone(),
                business_nature: natures[index].clone(),
                line_code: line_codes[index].clone(),
            })
        })
        .collect()
}

/// Business header as captured by the legacy form, lines still packed in columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyBusinessProfile {
    pub business_name: String,
    pub business_type: String,
    #[serde(default)]
    pub trade_name: Option<String>,
    pub business_address: String,
    pub lines: LegacyLineColumns,
}

/// Submission from the legacy intake form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySubmission {
    pub kind: ApplicationKind,
    pub applicant: ApplicantProfile,
    pub business: LegacyBusinessProfile,
    pub mode_of_payment: PaymentMode,
}

impl LegacySubmission {
    pub fn into_submission(self) -> Result<ApplicationSubmission, LineParseError> {
        let lines = parse_legacy_lines(&self.business.lines)?;
        Ok(ApplicationSubmission {
            kind: self.kind,
            applicant: self.applicant,
            business: BusinessProfile {
                business_name: self.business.business_name,
                business_type: self.business.business_type,
                trade_name: self.business.trade_name,
                business_address: self.business.business_address,
                lines,
            },
            mode_of_payment: self.mode_of_payment,
        })
    }
}
