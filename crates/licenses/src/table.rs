//! Client-side sorting, paging and tallying of license lists

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{parse_date, License, LicenseStatus, Page, PriceHistory, SortField, SortOrder};

fn cmp_dates(a: &str, b: &str) -> Ordering {
    parse_date(a).cmp(&parse_date(b))
}

fn cmp_license(a: &License, b: &License, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortField::StartDate => cmp_dates(&a.start_date, &b.start_date),
        SortField::EndDate => cmp_dates(&a.end_date, &b.end_date),
        SortField::Volume => a.volume.total_cmp(&b.volume),
        SortField::UnitPrice => a.harga_satuan.total_cmp(&b.harga_satuan),
        SortField::Total => a.jumlah.total_cmp(&b.jumlah),
        SortField::Status => a.status_lisensi.cmp(&b.status_lisensi),
    }
}

/// Stable sort on one column
pub fn sort_licenses(licenses: &mut [License], field: SortField, order: SortOrder) {
    licenses.sort_by(|a, b| {
        let ord = cmp_license(a, b, field);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

/// Columns of the price history table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySortField {
    UnitPrice,
    Date,
    CreatedAt,
    Description,
    User,
}

pub fn sort_history(history: &mut [PriceHistory], field: HistorySortField, order: SortOrder) {
    history.sort_by(|a, b| {
        let ord = match field {
            HistorySortField::UnitPrice => a.harga_satuan.total_cmp(&b.harga_satuan),
            HistorySortField::Date => cmp_dates(&a.tanggal, &b.tanggal),
            HistorySortField::CreatedAt => cmp_dates(
                a.created_at.as_deref().unwrap_or_default(),
                b.created_at.as_deref().unwrap_or_default(),
            ),
            HistorySortField::Description => a.description.cmp(&b.description),
            HistorySortField::User => a.last_user_input.cmp(&b.last_user_input),
        };
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

/// One 1-based page of `items`. Page numbers past the end give an empty page.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let start = (page - 1).saturating_mul(per_page);

    let docs = items.iter().skip(start).take(per_page).cloned().collect();

    Page {
        docs,
        pages: ((items.len() + per_page - 1) / per_page) as u32,
        total: items.len() as u64,
    }
}

/// Formats an amount as Indonesian rupiah, e.g. `Rp 1.500.000`
pub fn format_rupiah(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{}", rounded.abs() as u64);

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    if rounded < 0.0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

/// History entries whose description, user or formatted price contains
/// `term`, ignoring case
pub fn search_history<'a>(history: &'a [PriceHistory], term: &str) -> Vec<&'a PriceHistory> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return history.iter().collect();
    }

    history
        .iter()
        .filter(|entry| {
            let contains = |value: Option<&str>| {
                value.map_or(false, |v| v.to_lowercase().contains(&term))
            };
            contains(entry.description.as_deref())
                || contains(entry.last_user_input.as_deref())
                || format_rupiah(entry.harga_satuan).to_lowercase().contains(&term)
        })
        .collect()
}

/// License counts per status, as shown by the dashboard cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusSummary {
    pub safe: usize,
    pub expiring: usize,
    pub expired: usize,
    pub unknown: usize,
}

impl StatusSummary {
    /// Counts licenses by the backend status, falling back to the end date
    /// when the backend sent none
    pub fn tally(licenses: &[License], today: NaiveDate) -> Self {
        let mut summary = Self::default();
        for license in licenses {
            let status = match license.status() {
                LicenseStatus::Unknown => license.status_on(today),
                known => known,
            };
            match status {
                LicenseStatus::Safe => summary.safe += 1,
                LicenseStatus::ExpiringSoon => summary.expiring += 1,
                LicenseStatus::Expired => summary.expired += 1,
                LicenseStatus::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.safe + self.expiring + self.expired + self.unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn license(name: &str, end_date: &str, price: f64, status: Option<u8>) -> License {
        serde_json::from_value(json!({
            "uuid": format!("uuid-{}", name),
            "name": name,
            "start_date": "2024-01-01",
            "end_date": end_date,
            "volume": 1,
            "harga_satuan": price,
            "jumlah": price,
            "status_lisensi": status,
        }))
        .unwrap()
    }

    fn history(description: &str, user: &str, price: f64, tanggal: &str) -> PriceHistory {
        serde_json::from_value(json!({
            "uuid": description,
            "licenses_uuid": "l-1",
            "harga_satuan": price,
            "tanggal": tanggal,
            "description": description,
            "last_user_input": user,
        }))
        .unwrap()
    }

    #[test]
    fn test_sort_by_date_and_price() {
        let mut items = vec![
            license("b", "2025-03-01", 300.0, Some(3)),
            license("a", "2024-12-31T00:00:00.000Z", 1000.0, Some(2)),
            license("c", "2026-01-01", 20.0, Some(3)),
        ];

        sort_licenses(&mut items, SortField::EndDate, SortOrder::Asc);
        let names: Vec<_> = items.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        // Numeric, not lexicographic
        sort_licenses(&mut items, SortField::UnitPrice, SortOrder::Desc);
        let names: Vec<_> = items.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        sort_licenses(&mut items, SortField::UnitPrice, SortOrder::Asc);
        let names: Vec<_> = items.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=12).collect();

        let first = paginate(&items, 1, 5);
        assert_eq!(first.docs, vec![1, 2, 3, 4, 5]);
        assert_eq!(first.pages, 3);
        assert_eq!(first.total, 12);

        assert_eq!(paginate(&items, 3, 5).docs, vec![11, 12]);
        assert!(paginate(&items, 4, 5).docs.is_empty());
        assert_eq!(paginate(&items, 0, 5).docs, first.docs);

        let empty: Vec<u32> = Vec::new();
        assert_eq!(paginate(&empty, 1, 5).pages, 0);
    }

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(0.0), "Rp 0");
        assert_eq!(format_rupiah(950.0), "Rp 950");
        assert_eq!(format_rupiah(1500.0), "Rp 1.500");
        assert_eq!(format_rupiah(1234567.4), "Rp 1.234.567");
        assert_eq!(format_rupiah(-25000.0), "-Rp 25.000");
    }

    #[test]
    fn test_search_and_sort_history() {
        let mut entries = vec![
            history("Renewal", "alice", 1500000.0, "2024-05-01"),
            history("Initial purchase", "Bob", 1200000.0, "2023-05-01"),
        ];

        let hits = search_history(&entries, "bob");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].description.as_deref(), Some("Initial purchase"));

        let hits = search_history(&entries, "1.500");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].description.as_deref(), Some("Renewal"));

        assert_eq!(search_history(&entries, "  ").len(), 2);

        sort_history(&mut entries, HistorySortField::Date, SortOrder::Asc);
        assert_eq!(entries[0].tanggal, "2023-05-01");
    }

    #[test]
    fn test_status_summary() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let items = vec![
            license("a", "2030-01-01", 1.0, Some(3)),
            license("b", "2024-07-01", 1.0, Some(2)),
            license("c", "2024-01-01", 1.0, Some(1)),
            license("d", "2024-01-01", 1.0, None),
            license("e", "not a date", 1.0, None),
        ];

        let summary = StatusSummary::tally(&items, today);
        assert_eq!(
            summary,
            StatusSummary {
                safe: 1,
                expiring: 1,
                expired: 2,
                unknown: 1,
            }
        );
        assert_eq!(summary.total(), 5);
    }
}
