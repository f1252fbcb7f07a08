use crate::error::SubmissionError;
use crate::model::NewAlert;
use log::{info, warn};
use reqwest::Client;

#[derive(Clone)]
pub struct AlertClient {
    http: Client,
    base_url: String,
}

impl AlertClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/alert", self.base_url.trim_end_matches('/'))
    }

    /// `POST {SERVER_URL}/alert`. Any 2xx counts as created.
    pub async fn create(&self, alert: &NewAlert) -> Result<(), SubmissionError> {
        let url = self.endpoint();
        info!(
            "Creating alert: {} {} {}",
            alert.indicator.as_str(),
            alert.direction.as_str(),
            alert.value
        );

        let res = self.http.post(&url).json(alert).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            warn!("Alert creation rejected by {}: {}", url, status);
            return Err(SubmissionError::Rejected(status));
        }

        Ok(())
    }
}

/// Validates the value typed into the create form.
pub fn parse_value(input: &str) -> Result<f64, SubmissionError> {
    let trimmed = input.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SubmissionError::InvalidValue(trimmed.to_string())),
    }
}
