use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for submitted permit applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Business Identification Number issued by the BPLO.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bin(pub String);

/// Whether the applicant registers a new business or renews an existing permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationKind {
    New,
    Renew,
}

/// Approving offices that hold a status column on every application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OfficeKey {
    Cenro,
    Cho,
    Csmwo,
    Obo,
    Zoning,
    Bplo,
    Examiners,
    Treasurer,
    BusinessTax,
}

impl OfficeKey {
    pub const ALL: [OfficeKey; 9] = [
        OfficeKey::Cenro,
        OfficeKey::Cho,
        OfficeKey::Csmwo,
        OfficeKey::Obo,
        OfficeKey::Zoning,
        OfficeKey::Bplo,
        OfficeKey::Examiners,
        OfficeKey::Treasurer,
        OfficeKey::BusinessTax,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            OfficeKey::Cenro => "CENRO",
            OfficeKey::Cho => "CHO",
            OfficeKey::Csmwo => "CSMWO",
            OfficeKey::Obo => "OBO",
            OfficeKey::Zoning => "ZONING",
            OfficeKey::Bplo => "BPLO",
            OfficeKey::Examiners => "EXAMINERS",
            OfficeKey::Treasurer => "TREASURER",
            OfficeKey::BusinessTax => "BUSINESSTAX",
        }
    }
}

impl fmt::Display for OfficeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown office '{0}'")]
pub struct UnknownOffice(pub String);

impl FromStr for OfficeKey {
    type Err = UnknownOffice;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "CENRO" => Ok(OfficeKey::Cenro),
            "CHO" => Ok(OfficeKey::Cho),
            // The solid-waste office appears under both spellings in office rosters.
            "CSMWO" | "CSWMO" | "CMSWO" => Ok(OfficeKey::Csmwo),
            "OBO" => Ok(OfficeKey::Obo),
            "ZONING" => Ok(OfficeKey::Zoning),
            "BPLO" => Ok(OfficeKey::Bplo),
            "EXAMINERS" => Ok(OfficeKey::Examiners),
            "TREASURER" => Ok(OfficeKey::Treasurer),
            "BUSINESSTAX" => Ok(OfficeKey::BusinessTax),
            _ => Err(UnknownOffice(value.to_string())),
        }
    }
}

/// Per-office disposition of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfficeStatus {
    Pending,
    Approved,
    Declined,
}

impl OfficeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OfficeStatus::Pending => "Pending",
            OfficeStatus::Approved => "Approved",
            OfficeStatus::Declined => "Declined",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, OfficeStatus::Approved | OfficeStatus::Declined)
    }
}

/// Installment cadence chosen by the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMode {
    Annual,
    #[serde(rename = "Semi-Annual", alias = "SemiAnnual")]
    SemiAnnual,
    Quarterly,
}

impl PaymentMode {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentMode::Annual => "Annual",
            PaymentMode::SemiAnnual => "Semi-Annual",
            PaymentMode::Quarterly => "Quarterly",
        }
    }

    pub const fn installment_count(self) -> usize {
        match self {
            PaymentMode::Annual => 1,
            PaymentMode::SemiAnnual => 2,
            PaymentMode::Quarterly => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment mode '{0}' (expected Annual, Semi-Annual, or Quarterly)")]
pub struct UnknownPaymentMode(pub String);

impl FromStr for PaymentMode {
    type Err = UnknownPaymentMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "annual" | "annually" => Ok(PaymentMode::Annual),
            "semiannual" | "semiannually" => Ok(PaymentMode::SemiAnnual),
            "quarterly" => Ok(PaymentMode::Quarterly),
            _ => Err(UnknownPaymentMode(value.to_string())),
        }
    }
}

/// Applicant contact data captured at submission; read-mostly afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub contact_number: String,
    #[serde(default)]
    pub email: Option<String>,
    pub address: String,
    #[serde(default)]
    pub tax_address: Option<String>,
}

impl ApplicantProfile {
    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref().map(str::trim) {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.first_name, middle, self.last_name)
            }
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// One product/service entry of a multi-line business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessLine {
    pub line_of_business: String,
    pub product_service: String,
    pub unit: String,
    pub capital: Decimal,
    pub nature_code: String,
    pub business_nature: String,
    pub line_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub business_name: String,
    pub business_type: String,
    #[serde(default)]
    pub trade_name: Option<String>,
    pub business_address: String,
    pub lines: Vec<BusinessLine>,
}

/// Inbound payload from the applicant-facing portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub kind: ApplicationKind,
    pub applicant: ApplicantProfile,
    pub business: BusinessProfile,
    pub mode_of_payment: PaymentMode,
}

/// Reference to a certificate file held by the external file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRef {
    pub file_key: String,
    pub file_name: String,
}

impl CertificateRef {
    pub fn content_type(&self) -> mime::Mime {
        mime_guess::from_path(&self.file_name).first_or_octet_stream()
    }

    /// Certificates are scanned documents: PDFs or images.
    pub fn is_document(&self) -> bool {
        let content_type = self.content_type();
        content_type == mime::APPLICATION_PDF || content_type.type_() == mime::IMAGE
    }
}
