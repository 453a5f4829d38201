use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::RegistrarError;

const DEFAULT_BASE_URL: &str = "https://api.porkbun.com/api/json/v3";
const RECORD_TYPE_A: &str = "A";

/// A single DNS record as reported by the registrar.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct RetrieveRecordsResponse {
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    #[serde(rename = "yourIp")]
    your_ip: String,
}

#[derive(Debug, Deserialize)]
struct StatusOnly {
    status: String,
}

/// Thin HTTP client for a Porkbun-style DNS registrar API: every call is a
/// `POST` whose JSON body merges the request-specific fields with
/// `{apikey, secretapikey}`, and succeeds only if the HTTP status is 200 and
/// the decoded body's `status` field is `"SUCCESS"`.
pub struct RegistrarClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    secret_key: String,
}

impl RegistrarClient {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolves the agent's own egress address as seen by the registrar.
    pub async fn ping(&self) -> Result<String, RegistrarError> {
        let resp: PingResponse = self.execute("/ping", json!({})).await?;
        Ok(resp.your_ip)
    }

    pub async fn retrieve_records(&self, domain: &str) -> Result<Vec<Record>, RegistrarError> {
        let path = format!("/dns/retrieve/{domain}");
        let resp: RetrieveRecordsResponse = self.execute(&path, json!({})).await?;
        Ok(resp.records)
    }

    /// Creates an `A` record for `name.domain` pointing at `content`.
    pub async fn create_record(
        &self,
        domain: &str,
        name: &str,
        content: &str,
    ) -> Result<(), RegistrarError> {
        let path = format!("/dns/create/{domain}");
        let body = json!({ "name": name, "type": RECORD_TYPE_A, "content": content });
        let _: StatusOnly = self.execute(&path, body).await?;
        Ok(())
    }

    pub async fn delete_record(&self, domain: &str, id: &str) -> Result<(), RegistrarError> {
        let path = format!("/dns/delete/{domain}/{id}");
        let _: StatusOnly = self.execute(&path, json!({})).await?;
        Ok(())
    }

    async fn execute<R>(&self, path: &str, payload: Value) -> Result<R, RegistrarError>
    where
        R: for<'de> Deserialize<'de>,
    {
        let body = merge_credentials(payload, &self.api_key, &self.secret_key);
        let url = format!("{}{path}", self.base_url);

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(RegistrarError::Status {
                status: status.to_string(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: StatusOnly = serde_json::from_slice(&bytes)?;
        if parsed.status != "SUCCESS" {
            return Err(RegistrarError::Status {
                status: parsed.status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn merge_credentials(mut payload: Value, api_key: &str, secret_key: &str) -> Value {
    if let Value::Object(map) = &mut payload {
        map.insert("apikey".to_string(), Value::String(api_key.to_string()));
        map.insert("secretapikey".to_string(), Value::String(secret_key.to_string()));
    }
    payload
}
