//! License records and request types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::LicenseError;

/// Days before the end date during which a license counts as expiring
pub const EXPIRING_WINDOW_DAYS: i64 = 120;

/// Page size used to fetch every license in one request
pub const ALL_PAGE_SIZE: u32 = 9999;

/// Accepts numbers sent either as JSON numbers or as decimal strings
fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Null(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) if s.trim().is_empty() => Ok(0.0),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Raw::Null(()) => Ok(0.0),
    }
}

/// Parses a `YYYY-MM-DD` date or an RFC 3339 timestamp
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
        .or_else(|| value.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Expiry classification of a license
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LicenseStatus {
    Expired,
    ExpiringSoon,
    Safe,
    Unknown,
}

impl LicenseStatus {
    /// Maps the backend's `status_lisensi` code
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => LicenseStatus::Expired,
            2 => LicenseStatus::ExpiringSoon,
            3 => LicenseStatus::Safe,
            _ => LicenseStatus::Unknown,
        }
    }

    pub fn code(&self) -> Option<u8> {
        match self {
            LicenseStatus::Expired => Some(1),
            LicenseStatus::ExpiringSoon => Some(2),
            LicenseStatus::Safe => Some(3),
            LicenseStatus::Unknown => None,
        }
    }

    /// Classifies an end date relative to `today`
    pub fn from_end_date(end_date: NaiveDate, today: NaiveDate) -> Self {
        let days_left = (end_date - today).num_days();
        if days_left < 0 {
            LicenseStatus::Expired
        } else if days_left <= EXPIRING_WINDOW_DAYS {
            LicenseStatus::ExpiringSoon
        } else {
            LicenseStatus::Safe
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LicenseStatus::Expired => "Expired",
            LicenseStatus::ExpiringSoon => "Expiring soon",
            LicenseStatus::Safe => "Safe",
            LicenseStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One recorded unit price of a license
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    #[serde(default)]
    pub id: Option<i64>,
    pub uuid: String,
    #[serde(default)]
    pub licenses_uuid: String,
    #[serde(default, deserialize_with = "number")]
    pub harga_satuan: f64,
    #[serde(default)]
    pub tanggal: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub last_user_input: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
}

/// A license record as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default, deserialize_with = "number")]
    pub volume: f64,
    /// Unit of the volume
    #[serde(default)]
    pub satuan: String,
    /// Unit price
    #[serde(default, deserialize_with = "number")]
    pub harga_satuan: f64,
    /// Total price
    #[serde(default, deserialize_with = "number")]
    pub jumlah: f64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub lokasi_lisensi: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_lisensi: Option<u8>,
    #[serde(default)]
    pub last_user_input: Option<String>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history_licenses: Vec<PriceHistory>,
}

impl License {
    /// Status reported by the backend
    pub fn status(&self) -> LicenseStatus {
        self.status_lisensi
            .map(LicenseStatus::from_code)
            .unwrap_or(LicenseStatus::Unknown)
    }

    /// Status computed from the end date
    pub fn status_on(&self, today: NaiveDate) -> LicenseStatus {
        parse_date(&self.end_date)
            .map(|end| LicenseStatus::from_end_date(end, today))
            .unwrap_or(LicenseStatus::Unknown)
    }

    pub fn total(&self) -> f64 {
        self.volume * self.harga_satuan
    }

    pub fn to_draft(&self) -> LicenseDraft {
        LicenseDraft {
            name: self.name.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            volume: self.volume,
            satuan: self.satuan.clone(),
            harga_satuan: self.harga_satuan,
            username: self.username.clone(),
            password: self.password.clone(),
            lokasi_lisensi: self.lokasi_lisensi.clone(),
            description: self.description.clone(),
        }
    }
}

/// One page of `GET /licenses/get`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub docs: Vec<T>,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub total: u64,
}

/// Sortable license columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    StartDate,
    EndDate,
    Volume,
    UnitPrice,
    Total,
    Status,
}

impl SortField {
    /// Column name understood by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::StartDate => "start_date",
            SortField::EndDate => "end_date",
            SortField::Volume => "volume",
            SortField::UnitPrice => "harga_satuan",
            SortField::Total => "jumlah",
            SortField::Status => "status_lisensi",
        }
    }
}

impl FromStr for SortField {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortField::Name),
            "start_date" => Ok(SortField::StartDate),
            "end_date" => Ok(SortField::EndDate),
            "volume" => Ok(SortField::Volume),
            "harga_satuan" | "price" => Ok(SortField::UnitPrice),
            "jumlah" | "total" => Ok(SortField::Total),
            "status_lisensi" | "status" => Ok(SortField::Status),
            other => Err(LicenseError::Validation(vec![format!(
                "Unknown sort field: {}",
                other
            )])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(LicenseError::Validation(vec![format!(
                "Unknown sort order: {}",
                other
            )])),
        }
    }
}

/// Query of `GET /licenses/get`
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: u32,
    pub paginate: u32,
    pub name: String,
    pub sort: Option<(SortField, SortOrder)>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            paginate: 10,
            name: String::new(),
            sort: None,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every license in a single page
    pub fn all() -> Self {
        Self::default().paginate(ALL_PAGE_SIZE)
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn paginate(mut self, paginate: u32) -> Self {
        self.paginate = paginate.max(1);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = Some((field, order));
        self
    }
}

/// License fields entered by a user
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LicenseDraft {
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub volume: f64,
    pub satuan: String,
    pub harga_satuan: f64,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub lokasi_lisensi: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl LicenseDraft {
    /// Checks required fields and numeric ranges, collecting every problem
    pub fn validate(&self) -> Result<(), LicenseError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Name is required".to_string());
        }
        for (label, value) in [("Start date", &self.start_date), ("End date", &self.end_date)] {
            if value.trim().is_empty() {
                errors.push(format!("{} is required", label));
            } else if parse_date(value).is_none() {
                errors.push(format!("{} must be a valid date", label));
            }
        }
        if self.volume.is_nan() || self.volume <= 0.0 {
            errors.push("Volume must be greater than 0".to_string());
        }
        if self.satuan.trim().is_empty() {
            errors.push("Unit is required".to_string());
        }
        if self.harga_satuan < 0.0 || self.harga_satuan.is_nan() {
            errors.push("Unit price cannot be negative".to_string());
        }
        if self.username.trim().is_empty() {
            errors.push("Username is required".to_string());
        }
        if self.password.trim().is_empty() {
            errors.push("Password is required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LicenseError::Validation(errors))
        }
    }

    pub fn total(&self) -> f64 {
        self.volume * self.harga_satuan
    }
}

/// Body of `POST /licenses/create`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateLicense<'a> {
    pub name: &'a str,
    pub start_date: String,
    pub end_date: String,
    pub volume: f64,
    pub satuan: &'a str,
    pub harga_satuan: f64,
    pub username: &'a str,
    pub password: &'a str,
    pub lokasi_lisensi: Option<&'a str>,
    pub description: Option<&'a str>,
    pub last_user_input: &'a str,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn iso_date(value: &str) -> String {
    parse_date(value)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| value.trim().to_string())
}

impl<'a> CreateLicense<'a> {
    pub fn new(draft: &'a LicenseDraft, user: &'a str) -> Self {
        Self {
            name: draft.name.trim(),
            start_date: iso_date(&draft.start_date),
            end_date: iso_date(&draft.end_date),
            volume: draft.volume,
            satuan: draft.satuan.trim(),
            harga_satuan: draft.harga_satuan,
            username: draft.username.trim(),
            password: draft.password.trim(),
            lokasi_lisensi: non_empty(&draft.lokasi_lisensi),
            description: non_empty(&draft.description),
            last_user_input: user,
        }
    }
}
