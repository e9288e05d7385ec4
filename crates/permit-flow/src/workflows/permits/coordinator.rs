//! Read-side grouping of applications into the office dashboard buckets.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::domain::{OfficeKey, OfficeStatus};
use super::record::ApplicationRecord;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    Pending,
    Approved,
    Declined,
}

impl StatusBucket {
    pub const ALL: [StatusBucket; 3] = [
        StatusBucket::Pending,
        StatusBucket::Approved,
        StatusBucket::Declined,
    ];

    pub fn matches(self, status: OfficeStatus) -> bool {
        match self {
            StatusBucket::Pending => !status.is_terminal(),
            StatusBucket::Approved => status == OfficeStatus::Approved,
            StatusBucket::Declined => status == OfficeStatus::Declined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status bucket '{0}'")]
pub struct UnknownBucket(pub String);

impl FromStr for StatusBucket {
    type Err = UnknownBucket;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(StatusBucket::Pending),
            "approved" => Ok(StatusBucket::Approved),
            "declined" => Ok(StatusBucket::Declined),
            _ => Err(UnknownBucket(value.to_string())),
        }
    }
}

/// Oldest first; ids break ties so page boundaries never shift between reloads.
pub fn order_by_submission(records: &mut [ApplicationRecord]) {
    records.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });
}

pub fn filter_by_office_status(
    records: &[ApplicationRecord],
    office: OfficeKey,
    bucket: StatusBucket,
) -> Vec<ApplicationRecord> {
    records
        .iter()
        .filter(|record| bucket.matches(record.office_status(office)))
        .cloned()
        .collect()
}

pub fn filter_for_business_tax_handoff(records: &[ApplicationRecord]) -> Vec<ApplicationRecord> {
    records
        .iter()
        .filter(|record| {
            record.pass_to_business_tax
                && record.office_status(OfficeKey::BusinessTax) == OfficeStatus::Pending
        })
        .cloned()
        .collect()
}

pub fn filter_ready_for_payment(records: &[ApplicationRecord]) -> Vec<ApplicationRecord> {
    records
        .iter()
        .filter(|record| record.is_ready_for_payment())
        .cloned()
        .collect()
}

/// Dashboard view of one office. Buckets stay a partition for every office;
/// the business tax queue reads the handoff flag instead of BPLO's buckets.
pub fn office_view(
    records: &[ApplicationRecord],
    office: OfficeKey,
    bucket: StatusBucket,
) -> Vec<ApplicationRecord> {
    let mut view = filter_by_office_status(records, office, bucket);
    order_by_submission(&mut view);
    view
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub pending: usize,
    pub approved: usize,
    pub declined: usize,
}

pub fn bucket_counts(records: &[ApplicationRecord], office: OfficeKey) -> BucketCounts {
    records
        .iter()
        .fold(BucketCounts::default(), |mut counts, record| {
            match record.office_status(office) {
                OfficeStatus::Approved => counts.approved += 1,
                OfficeStatus::Declined => counts.declined += 1,
                OfficeStatus::Pending => counts.pending += 1,
            }
            counts
        })
}

/// List parameters shared by every office screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub office: OfficeKey,
    pub bucket: StatusBucket,
    pub page: usize,
}

impl ListQuery {
    pub fn new(office: OfficeKey, bucket: StatusBucket) -> Self {
        Self {
            office,
            bucket,
            page: 1,
        }
    }

    /// Switching buckets always lands on the first page.
    pub fn with_bucket(self, bucket: StatusBucket) -> Self {
        if bucket == self.bucket {
            return self;
        }
        Self {
            bucket,
            page: 1,
            ..self
        }
    }

    pub fn with_page(self, page: usize) -> Self {
        Self {
            page: page.max(1),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub items: Vec<T>,
}

/// Pure slice of an already ordered list; `page` is 1-based.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let page = page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size).min(total_items);
    let end = (start + page_size).min(total_items);

    Page {
        page,
        page_size,
        total_items,
        total_pages,
        items: items[start..end].to_vec(),
    }
}

pub fn list(
    records: &[ApplicationRecord],
    query: ListQuery,
    page_size: usize,
) -> Page<ApplicationRecord> {
    let view = office_view(records, query.office, query.bucket);
    paginate(&view, query.page, page_size)
}
