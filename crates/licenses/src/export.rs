//! Flat rows for spreadsheet export
//!
//! Each row type serializes with human-readable column headers, so any
//! serde-based writer (CSV, JSON lines, a spreadsheet library) produces the
//! same sheet layout as the dashboard.

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{parse_date, License, LicenseStatus};

fn long_date(value: &str) -> String {
    parse_date(value)
        .map(|d| d.format("%d %B %Y").to_string())
        .unwrap_or_else(|| value.to_string())
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Row of the license data sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseRow {
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "Asset Name")]
    pub name: String,
    #[serde(rename = "Start Date")]
    pub start_date: String,
    #[serde(rename = "End Date")]
    pub end_date: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Unit Price")]
    pub unit_price: f64,
    #[serde(rename = "Total Price")]
    pub total: f64,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Notes")]
    pub notes: String,
    #[serde(rename = "Last User")]
    pub last_user: String,
}

/// Row of the price sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRow {
    #[serde(rename = "No")]
    pub number: usize,
    #[serde(rename = "License Name")]
    pub name: String,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Unit Price")]
    pub unit_price: f64,
    #[serde(rename = "Total Price")]
    pub total: f64,
    #[serde(rename = "Start Date")]
    pub start_date: String,
    #[serde(rename = "End Date")]
    pub end_date: String,
    #[serde(rename = "License Location")]
    pub location: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Last Modified By")]
    pub last_user: String,
}

/// Row of the price history sheet, numbered `license.entry`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    #[serde(rename = "No")]
    pub number: String,
    #[serde(rename = "License Name")]
    pub name: String,
    #[serde(rename = "Unit Price (History)")]
    pub unit_price: f64,
    #[serde(rename = "Record Date")]
    pub recorded_on: String,
    #[serde(rename = "Description (History)")]
    pub description: String,
    #[serde(rename = "Last Input By")]
    pub last_user: String,
    #[serde(rename = "Created At")]
    pub created_at: String,
}

/// Rows of the license data sheet. Licenses without a backend status are
/// classified from their end date.
pub fn license_rows(licenses: &[License], today: NaiveDate) -> Vec<LicenseRow> {
    licenses
        .iter()
        .map(|l| {
            let status = match l.status() {
                LicenseStatus::Unknown => l.status_on(today),
                known => known,
            };
            LicenseRow {
                uuid: l.uuid.clone(),
                name: l.name.clone(),
                start_date: long_date(&l.start_date),
                end_date: long_date(&l.end_date),
                status: status.label().to_string(),
                volume: l.volume,
                unit: l.satuan.clone(),
                unit_price: l.harga_satuan,
                total: l.jumlah,
                username: l.username.clone(),
                password: l.password.clone(),
                location: text(&l.lokasi_lisensi),
                notes: text(&l.description),
                last_user: text(&l.last_user_input),
            }
        })
        .collect()
}

pub fn price_rows(licenses: &[License]) -> Vec<PriceRow> {
    licenses
        .iter()
        .enumerate()
        .map(|(i, l)| PriceRow {
            number: i + 1,
            name: l.name.clone(),
            volume: l.volume,
            unit: l.satuan.clone(),
            unit_price: l.harga_satuan,
            total: l.jumlah,
            start_date: long_date(&l.start_date),
            end_date: long_date(&l.end_date),
            location: text(&l.lokasi_lisensi),
            description: text(&l.description),
            last_user: text(&l.last_user_input),
        })
        .collect()
}

pub fn history_rows(licenses: &[License]) -> Vec<HistoryRow> {
    licenses
        .iter()
        .enumerate()
        .flat_map(|(i, l)| {
            l.history_licenses
                .iter()
                .enumerate()
                .map(move |(j, h)| HistoryRow {
                    number: format!("{}.{}", i + 1, j + 1),
                    name: l.name.clone(),
                    unit_price: h.harga_satuan,
                    recorded_on: long_date(&h.tanggal),
                    description: text(&h.description),
                    last_user: text(&h.last_user_input),
                    created_at: long_date(h.created_at.as_deref().unwrap_or_default()),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn licenses() -> Vec<License> {
        serde_json::from_value(json!([
            {
                "uuid": "l-1",
                "name": "Office",
                "start_date": "2024-01-01",
                "end_date": "2025-03-15",
                "volume": 2,
                "satuan": "seat",
                "harga_satuan": 100,
                "jumlah": 200,
                "history_licenses": [
                    {"uuid": "h-1", "harga_satuan": 90, "tanggal": "2023-01-01", "createdAt": "2023-01-02T00:00:00.000Z"},
                    {"uuid": "h-2", "harga_satuan": 100, "tanggal": "2024-01-01", "description": "raise"}
                ]
            },
            {"uuid": "l-2", "name": "CAD", "end_date": "2020-01-01", "status_lisensi": 3},
            {"uuid": "l-3", "name": "ERP", "history_licenses": [
                {"uuid": "h-3", "harga_satuan": 5, "tanggal": "2022-06-30"}
            ]}
        ]))
        .unwrap()
    }

    #[test]
    fn test_history_rows_are_numbered_per_license() {
        let rows = history_rows(&licenses());
        let numbers: Vec<_> = rows.iter().map(|r| r.number.as_str()).collect();
        assert_eq!(numbers, vec!["1.1", "1.2", "3.1"]);
        assert_eq!(rows[0].recorded_on, "01 January 2023");
        assert_eq!(rows[0].created_at, "02 January 2023");
        assert_eq!(rows[1].description, "raise");
        assert_eq!(rows[2].name, "ERP");
    }

    #[test]
    fn test_license_rows_prefer_backend_status() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let rows = license_rows(&licenses(), today);
        assert_eq!(rows[0].status, "Expiring soon");
        assert_eq!(rows[0].end_date, "15 March 2025");
        assert_eq!(rows[1].status, "Safe");
        assert_eq!(rows[2].status, "Unknown");
    }

    #[test]
    fn test_rows_serialize_with_headers() {
        let rows = price_rows(&licenses());
        let value = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(value["No"], 1);
        assert_eq!(value["License Name"], "Office");
        assert_eq!(value["Total Price"], 200.0);
    }
}
