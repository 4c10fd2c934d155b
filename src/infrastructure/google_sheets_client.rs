use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/";
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateValuesResponse {
    pub updated_range: Option<String>,
    pub updated_cells: u64,
}

#[async_trait]
pub trait GoogleSheetsClient: Send + Sync {
    /// Rows of the range, top to bottom. Empty rows inside the range come back as empty vectors.
    async fn get_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, InfraError>;

    /// Writes cells as if typed by a user, so formula text is evaluated by the sheet.
    async fn update_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<UpdateValuesResponse, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGoogleSheetsClient {
    client: Client,
    api_base: String,
}

impl ReqwestGoogleSheetsClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_base: SHEETS_API_BASE.to_string(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::SheetsApi(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn sheets_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("google sheets api error: http {}", status.as_u16())
        } else {
            format!("google sheets api error: http {}; body={body}", status.as_u16())
        };
        InfraError::SheetsApi(message)
    }

    fn values_endpoint(&self, spreadsheet_id: &str, range: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| InfraError::SheetsApi(format!("invalid sheets api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::SheetsApi("sheets api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("spreadsheets");
            segments.push(spreadsheet_id);
            segments.push("values");
            segments.push(range);
        }
        Ok(url)
    }
}

#[derive(Debug, serde::Deserialize)]
struct ValueRangeResponse {
    values: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, serde::Serialize)]
struct ValueRangeRequest<'a> {
    range: &'a str,
    #[serde(rename = "majorDimension")]
    major_dimension: &'a str,
    values: Vec<Vec<String>>,
}

#[derive(Debug, serde::Deserialize)]
struct UpdateValuesPayload {
    #[serde(rename = "updatedRange")]
    updated_range: Option<String>,
    #[serde(rename = "updatedCells")]
    updated_cells: Option<u64>,
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl GoogleSheetsClient for ReqwestGoogleSheetsClient {
    async fn get_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(spreadsheet_id, "spreadsheet id")?;

        let endpoint = self.values_endpoint(spreadsheet_id, range)?;
        let response = self
            .client
            .get(endpoint)
            .query(&[("majorDimension", "ROWS")])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::SheetsApi(format!("network error while reading values: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::SheetsApi(format!("failed reading values response: {error}")))?;

        if !status.is_success() {
            return Err(Self::sheets_http_error(status, &body));
        }

        let parsed: ValueRangeResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::SheetsApi(format!("invalid values payload: {error}; body={body}"))
        })?;

        Ok(parsed
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn update_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<UpdateValuesResponse, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(spreadsheet_id, "spreadsheet id")?;

        let endpoint = self.values_endpoint(spreadsheet_id, range)?;
        let request = ValueRangeRequest {
            range,
            major_dimension: "ROWS",
            values: rows,
        };

        let response = self
            .client
            .put(endpoint)
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|error| InfraError::SheetsApi(format!("network error while updating values: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::SheetsApi(format!("failed reading update response: {error}")))?;

        if !status.is_success() {
            return Err(Self::sheets_http_error(status, &body));
        }

        let parsed: UpdateValuesPayload = serde_json::from_str(&body).map_err(|error| {
            InfraError::SheetsApi(format!("invalid update payload: {error}; body={body}"))
        })?;

        Ok(UpdateValuesResponse {
            updated_range: parsed.updated_range,
            updated_cells: parsed.updated_cells.unwrap_or(0),
        })
    }
}
