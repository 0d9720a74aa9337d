//! HTTP client for an Openmano-style resource orchestrator.
//!
//! Uses `ureq` (sync) inside `tokio::task::spawn_blocking`. Instances
//! live under `{url}/{tenant}/instances`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{RoClient, RoConnector};
use crate::config::{RoAccount, RoKind};
use crate::error::{OrchestratorError, RoClientError};

pub struct OpenmanoHttpClient {
    base_url: String,
}

impl OpenmanoHttpClient {
    pub fn new(account: &RoAccount) -> Self {
        OpenmanoHttpClient {
            base_url: format!(
                "{}/{}/instances",
                account.url.trim_end_matches('/'),
                account.tenant
            ),
        }
    }

    pub fn instances_url(&self) -> &str {
        &self.base_url
    }

    pub fn instance_url(&self, uuid: &str) -> String {
        format!("{}/{}", self.base_url, uuid)
    }
}

enum Method {
    Get,
    Post(Value),
    Delete,
}

/// Run one request on the blocking pool and decode the JSON body.
async fn request(url: String, method: Method) -> Result<Value, RoClientError> {
    tokio::task::spawn_blocking(move || {
        let agent = ureq::Agent::new_with_defaults();
        let response = match method {
            Method::Get => agent.get(&url).header("Accept", "application/json").call(),
            Method::Post(body) => agent
                .post(&url)
                .header("Accept", "application/json")
                .send_json(&body),
            Method::Delete => agent.delete(&url).call(),
        };
        let response = response.map_err(|e| match e {
            ureq::Error::StatusCode(status) => RoClientError::Http {
                url: url.clone(),
                status,
                message: format!("HTTP status {}", status),
            },
            other => RoClientError::Transport {
                url: url.clone(),
                message: other.to_string(),
            },
        })?;

        let text = response
            .into_body()
            .read_to_string()
            .map_err(|e| RoClientError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| RoClientError::Decode {
            url,
            message: format!("failed to parse response as JSON: {}", e),
        })
    })
    .await
    .map_err(|e| RoClientError::Join(e.to_string()))?
}

fn not_found(err: RoClientError, uuid: &str) -> RoClientError {
    match err {
        RoClientError::Http { status: 404, .. } => RoClientError::UnknownInstance {
            uuid: uuid.to_string(),
        },
        other => other,
    }
}

#[async_trait]
impl RoClient for OpenmanoHttpClient {
    async fn list_instances(&self) -> Result<HashMap<String, String>, RoClientError> {
        let url = self.base_url.clone();
        let body = request(url.clone(), Method::Get).await?;
        parse_instance_list(&body).ok_or(RoClientError::Decode {
            url,
            message: "missing 'instances' list".to_string(),
        })
    }

    async fn create_instance(&self, scenario: Value) -> Result<String, RoClientError> {
        let url = self.base_url.clone();
        let body = request(url.clone(), Method::Post(json!({ "instance": scenario }))).await?;
        parse_created_uuid(&body).ok_or(RoClientError::Decode {
            url,
            message: "no instance uuid in response".to_string(),
        })
    }

    async fn get_instance(&self, uuid: &str) -> Result<Value, RoClientError> {
        request(self.instance_url(uuid), Method::Get)
            .await
            .map_err(|e| not_found(e, uuid))
    }

    async fn delete_instance(&self, uuid: &str) -> Result<(), RoClientError> {
        request(self.instance_url(uuid), Method::Delete)
            .await
            .map(|_| ())
            .map_err(|e| not_found(e, uuid))
    }
}

fn parse_instance_list(body: &Value) -> Option<HashMap<String, String>> {
    let list = body.get("instances")?.as_array()?;
    Some(
        list.iter()
            .filter_map(|i| {
                let name = i.get("name")?.as_str()?;
                let uuid = i.get("uuid")?.as_str()?;
                Some((name.to_string(), uuid.to_string()))
            })
            .collect(),
    )
}

fn parse_created_uuid(body: &Value) -> Option<String> {
    body.get("uuid")
        .or_else(|| body.get("instance").and_then(|i| i.get("uuid")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Builds [`OpenmanoHttpClient`]s for configured accounts.
#[derive(Debug, Default)]
pub struct HttpRoConnector;

impl RoConnector for HttpRoConnector {
    fn connect(&self, account: &RoAccount) -> Result<Arc<dyn RoClient>, OrchestratorError> {
        match account.kind {
            RoKind::Openmano => {
                if account.url.is_empty() {
                    return Err(OrchestratorError::config(format!(
                        "resource orchestrator {} has no url",
                        account.name
                    )));
                }
                Ok(Arc::new(OpenmanoHttpClient::new(account)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(url: &str) -> RoAccount {
        RoAccount {
            name: "mano".into(),
            kind: RoKind::Openmano,
            url: url.into(),
            tenant: "t1".into(),
        }
    }

    #[test]
    fn urls_are_tenant_scoped() {
        let client = OpenmanoHttpClient::new(&account("http://ro:9090/openmano/"));
        assert_eq!(client.instances_url(), "http://ro:9090/openmano/t1/instances");
        assert_eq!(
            client.instance_url("abc"),
            "http://ro:9090/openmano/t1/instances/abc"
        );
    }

    #[test]
    fn instance_list_parsing() {
        let body = json!({ "instances": [
            { "name": "ns-a", "uuid": "1" },
            { "name": "ns-b", "uuid": "2" },
            { "uuid": "orphan" }
        ]});
        let map = parse_instance_list(&body).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["ns-b"], "2");
        assert!(parse_instance_list(&json!({})).is_none());
    }

    #[test]
    fn created_uuid_in_either_shape() {
        assert_eq!(parse_created_uuid(&json!({ "uuid": "u1" })).as_deref(), Some("u1"));
        assert_eq!(
            parse_created_uuid(&json!({ "instance": { "uuid": "u2" } })).as_deref(),
            Some("u2")
        );
        assert!(parse_created_uuid(&json!({ "result": "ok" })).is_none());
    }

    #[test]
    fn connector_requires_url() {
        assert!(HttpRoConnector.connect(&account("")).is_err());
        assert!(HttpRoConnector.connect(&account("http://ro")).is_ok());
    }

    #[test]
    fn http_404_maps_to_unknown_instance() {
        let err = not_found(
            RoClientError::Http {
                url: "u".into(),
                status: 404,
                message: "nope".into(),
            },
            "abc",
        );
        assert!(matches!(err, RoClientError::UnknownInstance { uuid } if uuid == "abc"));
    }

    #[tokio::test]
    async fn unreachable_ro_is_a_transport_error() {
        let client = OpenmanoHttpClient::new(&account("http://127.0.0.1:1"));
        let err = client.list_instances().await.unwrap_err();
        assert!(matches!(err, RoClientError::Transport { .. }));
    }
}
