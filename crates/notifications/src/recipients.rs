//! Email recipients of the expiry report

use std::fmt;
use std::str::FromStr;

use lisa_rust_auth::{ApiClient, AuthError, Envelope};
use log::{debug, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::NotificationError;

/// Header the address is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailType {
    #[default]
    To,
    Cc,
    Bcc,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::To => "to",
            EmailType::Cc => "cc",
            EmailType::Bcc => "bcc",
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "to" => Ok(EmailType::To),
            "cc" => Ok(EmailType::Cc),
            "bcc" => Ok(EmailType::Bcc),
            other => Err(NotificationError::Validation(vec![format!(
                "Unknown email type: {}",
                other
            )])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecipient {
    #[serde(default)]
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    pub email: String,
    pub email_type: EmailType,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
}

/// Fields entered when adding or editing a recipient
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecipientForm {
    pub name: String,
    pub email: String,
    pub email_type: EmailType,
}

impl RecipientForm {
    pub fn new(name: &str, email: &str, email_type: EmailType) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            email_type,
        }
    }

    pub fn validate(&self) -> Result<(), NotificationError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Name is required".to_string());
        }
        if self.email.trim().is_empty() {
            errors.push("Email is required".to_string());
        } else if !self.email.contains('@') {
            errors.push(format!("'{}' is not an email address", self.email));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::Validation(errors))
        }
    }
}

impl From<&EmailRecipient> for RecipientForm {
    fn from(recipient: &EmailRecipient) -> Self {
        Self {
            name: recipient.name.clone(),
            email: recipient.email.clone(),
            email_type: recipient.email_type,
        }
    }
}

#[derive(Serialize)]
struct UpdateRecipient<'a> {
    uuid: &'a str,
    #[serde(flatten)]
    form: &'a RecipientForm,
}

/// Client for `/email/*`
#[derive(Debug, Clone)]
pub struct RecipientsClient {
    api: ApiClient,
}

impl RecipientsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// All recipients. The backend answers 404 when there are none.
    pub async fn list(&self) -> Result<Vec<EmailRecipient>, NotificationError> {
        let envelope = self.api.get("/email/get").envelope().await?;

        match envelope.status {
            200 => match envelope.data {
                Some(Value::Null) | None => Ok(Vec::new()),
                Some(data) => Ok(serde_json::from_value(data)?),
            },
            404 => {
                debug!("No email recipients registered");
                Ok(Vec::new())
            }
            status => Err(NotificationError::ApiError {
                status,
                message: envelope.message_or("Failed to load email recipients"),
            }),
        }
    }

    pub async fn create(&self, form: &RecipientForm) -> Result<(), NotificationError> {
        form.validate()?;
        self.api
            .post("/email/create")
            .json(form)?
            .envelope()
            .await?
            .expect_status(201, "Failed to add email recipient")?;

        info!("Added email recipient {}", form.email);
        Ok(())
    }

    pub async fn update(&self, uuid: &str, form: &RecipientForm) -> Result<(), NotificationError> {
        form.validate()?;
        self.api
            .put("/email/update")
            .json(&UpdateRecipient { uuid, form })?
            .envelope()
            .await?
            .expect_status(200, "Failed to update email recipient")?;

        info!("Updated email recipient {}", uuid);
        Ok(())
    }

    /// Deletes a recipient. Only `204 No Content` counts as success.
    pub async fn delete(&self, uuid: &str) -> Result<(), NotificationError> {
        let response = self
            .api
            .delete("/email/delete")
            .json(&serde_json::json!({ "uuid": uuid }))?
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                info!("Deleted email recipient {}", uuid);
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(AuthError::Unauthorized.into()),
            status => {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<Envelope>(&text)
                    .map(|e| e.message_or("Failed to delete email recipient"))
                    .unwrap_or_else(|_| "Failed to delete email recipient".to_string());
                Err(NotificationError::ApiError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
