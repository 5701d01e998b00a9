//! License endpoints

use chrono::{SecondsFormat, TimeZone, Utc};
use lisa_rust_auth::session::AUTH_NAME_KEY;
use lisa_rust_auth::{ApiClient, AuthError};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde_json::json;

use crate::types::{CreateLicense, License, LicenseDraft, ListQuery, Page};
use crate::LicenseError;

/// Client for `/licenses/*`
#[derive(Debug, Clone)]
pub struct LicensesClient {
    api: ApiClient,
}

async fn expect_success(response: Response, fallback: &str) -> Result<Response, LicenseError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(AuthError::Unauthorized.into());
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(AuthError::api(status.as_u16(), error_text, fallback).into());
    }
    Ok(response)
}

impl LicensesClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn current_user(&self) -> Option<String> {
        self.api
            .session()
            .jar()
            .get(AUTH_NAME_KEY)
            .filter(|name| !name.is_empty())
    }

    fn now_rfc3339(&self) -> String {
        let millis = self.api.session().jar().now_millis();
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Fetches one page of licenses
    pub async fn list(&self, query: &ListQuery) -> Result<Page<License>, LicenseError> {
        let mut req = self
            .api
            .get("/licenses/get")
            .query("page", &query.page.to_string())
            .query("paginate", &query.paginate.to_string())
            .query("name", &query.name);

        if let Some((field, order)) = query.sort {
            req = req
                .query("sortField", field.as_str())
                .query("sortOrder", order.as_str());
        }

        let page: Page<License> = req
            .envelope()
            .await?
            .expect_status(200, "Failed to load licenses")?
            .decode()?;

        debug!(
            "Loaded page {} of {} ({} licenses)",
            query.page,
            page.pages,
            page.docs.len()
        );
        Ok(page)
    }

    /// Fetches every license in one page
    pub async fn list_all(&self) -> Result<Vec<License>, LicenseError> {
        Ok(self.list(&ListQuery::all()).await?.docs)
    }

    pub async fn find(&self, uuid: &str) -> Result<License, LicenseError> {
        let license = self
            .api
            .get("/licenses/find")
            .query("uuid", uuid)
            .envelope()
            .await?
            .expect_status(200, "Failed to load license")?
            .decode()?;
        Ok(license)
    }

    /// Creates a license on behalf of the signed-in user
    pub async fn create(&self, draft: &LicenseDraft) -> Result<(), LicenseError> {
        draft.validate()?;
        let user = self.current_user().ok_or(LicenseError::SessionInvalid)?;

        let body = CreateLicense::new(draft, &user);
        let response = self.api.post("/licenses/create").json(&body)?.send().await?;
        expect_success(response, "Failed to create license").await?;

        info!("Created license {}", body.name);
        Ok(())
    }

    /// Saves an edited license. The total is recomputed and the record is
    /// stamped with the current user and time.
    pub async fn update(&self, license: &License) -> Result<License, LicenseError> {
        license.to_draft().validate()?;

        let mut updated = license.clone();
        updated.jumlah = license.total();
        updated.last_user_input = Some(self.current_user().unwrap_or_default());
        updated.updated_at = Some(self.now_rfc3339());

        let response = self.api.put("/licenses/update").json(&updated)?.send().await?;
        expect_success(response, "Failed to update license").await?;

        info!("Updated license {}", updated.uuid);
        Ok(updated)
    }

    pub async fn delete(&self, uuid: &str) -> Result<(), LicenseError> {
        let response = self
            .api
            .delete("/licenses/delete")
            .json(&json!({ "uuid": uuid }))?
            .send()
            .await?;
        expect_success(response, "Failed to delete license").await?;

        info!("Deleted license {}", uuid);
        Ok(())
    }

    /// Imports licenses from a spreadsheet
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<(), LicenseError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new()
            .part("file", part)
            .text("last_user_input", self.current_user().unwrap_or_default());

        let response = self.api.post("/licenses/upload").multipart(form).send().await?;
        expect_success(response, "Import failed").await?;

        info!("Imported licenses from {}", file_name);
        Ok(())
    }

    /// Every license with its price history
    pub async fn export_prices(&self) -> Result<Vec<License>, LicenseError> {
        let licenses = self
            .api
            .get("/licenses/export")
            .envelope()
            .await?
            .expect_status(200, "Failed to export license prices")?
            .decode()?;
        Ok(licenses)
    }
}
