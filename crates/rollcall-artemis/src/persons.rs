use serde_json::{json, Value};
use tracing::warn;

use crate::client::{ArtemisClient, Endpoint};

/// First page (100 entries) of the gateway's person list, as returned.
/// `None` when the gateway does not answer with 2xx.
pub async fn fetch_person_list(client: &ArtemisClient) -> Option<Value> {
    let response = client
        .send(Endpoint::PersonList, &json!({ "pageNo": 1, "pageSize": 100 }))
        .await;
    if !response.is_success() {
        warn!(status = response.status(), body = %response.data(), "person list request failed");
    }
    response.into_success()
}
