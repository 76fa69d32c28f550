use std::fmt;
use std::time::Duration;

use rollcall_core::config::VendorConfig;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ArtemisError;
use crate::signing::{self, ACCEPT, CONTENT_TYPE, SIGNATURE_HEADERS};

/// The fixed set of gateway operations this client may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Attendance,
    PersonInfo,
    PersonList,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Attendance, Endpoint::PersonInfo, Endpoint::PersonList];

    pub fn key(&self) -> &'static str {
        match self {
            Endpoint::Attendance => "getAttendance",
            Endpoint::PersonInfo => "getPersonInfo",
            Endpoint::PersonList => "getPersonList",
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            Endpoint::Attendance => "/artemis/api/attendance/v1/report",
            Endpoint::PersonInfo => "/artemis/api/resource/v1/person/personCode/personInfo",
            Endpoint::PersonList => "/artemis/api/resource/v1/person/personList",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.key() == key)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Outcome of a gateway call. Transport failures are folded in as
/// `Failure { status: 500, data: {"error": ...} }`.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Success { status: u16, data: Value },
    Failure { status: u16, data: Value },
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        match self {
            ApiResponse::Success { status, .. } | ApiResponse::Failure { status, .. } => *status,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            ApiResponse::Success { data, .. } | ApiResponse::Failure { data, .. } => data,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success { .. })
    }

    /// The body of a 2xx answer.
    pub fn into_success(self) -> Option<Value> {
        match self {
            ApiResponse::Success { data, .. } => Some(data),
            ApiResponse::Failure { .. } => None,
        }
    }

    fn transport(error: impl fmt::Display) -> Self {
        ApiResponse::Failure {
            status: 500,
            data: json!({ "error": error.to_string() }),
        }
    }
}

/// Signed client for the HikCentral Artemis OpenAPI gateway.
///
/// Certificate validation is disabled: gateways ship with self-signed
/// certificates on the local network.
#[derive(Clone)]
pub struct ArtemisClient {
    http: reqwest::Client,
    base_uri: String,
    app_key: String,
    app_secret: String,
    user_id: String,
}

impl ArtemisClient {
    pub fn new(config: &VendorConfig) -> Result<Self, ArtemisError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_uri: config.base_uri.trim_end_matches('/').to_string(),
            app_key: config.app_key.clone(),
            app_secret: config.app_secret.clone(),
            user_id: config.user_id.clone(),
        })
    }

    /// Look up `key` and send. Only an unknown key is an error.
    pub async fn send_request(&self, key: &str, body: &Value) -> Result<ApiResponse, ArtemisError> {
        let endpoint =
            Endpoint::from_key(key).ok_or_else(|| ArtemisError::UnknownEndpoint(key.to_string()))?;
        Ok(self.send(endpoint, body).await)
    }

    /// POST a signed JSON body. Never fails: non-2xx answers come back as
    /// [`ApiResponse::Failure`] with the server's status and body.
    pub async fn send(&self, endpoint: Endpoint, body: &Value) -> ApiResponse {
        let payload = match serde_json::to_vec(body) {
            Ok(bytes) => bytes,
            Err(e) => return ApiResponse::transport(e),
        };
        let uri = endpoint.uri();
        let signed = signing::sign(
            &self.app_key,
            &self.app_secret,
            uri,
            &payload,
            chrono::Utc::now().timestamp_millis(),
        );

        debug!(endpoint = %endpoint, bytes = payload.len(), "sending signed gateway request");

        let result = self
            .http
            .post(format!("{}{uri}", self.base_uri))
            .header("Accept", ACCEPT)
            .header("Content-Type", CONTENT_TYPE)
            .header("Content-MD5", &signed.content_md5)
            .header("userId", &self.user_id)
            .header("X-Ca-Key", &self.app_key)
            .header("X-Ca-Timestamp", signed.timestamp.to_string())
            .header("X-Ca-Signature-Headers", SIGNATURE_HEADERS)
            .header("X-Ca-Signature", &signed.signature)
            .body(payload)
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "gateway request failed");
                return ApiResponse::transport(e);
            }
        };

        let status = resp.status();
        let data = match resp.bytes().await {
            Ok(bytes) => decode_body(&bytes),
            Err(e) => json!({ "error": e.to_string() }),
        };

        if status.is_success() {
            ApiResponse::Success {
                status: status.as_u16(),
                data,
            }
        } else {
            ApiResponse::Failure {
                status: status.as_u16(),
                data,
            }
        }
    }
}

/// JSON when possible, otherwise the raw text.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
