use anyhow::{anyhow, Result};
use reqwest::Client;
use tracing::{debug, info};

use crate::config::VerificationConfig;
use crate::devdoc::ContractRecord;

#[derive(Debug, Clone)]
pub struct SourcifyClient {
    client: Client,
    base_url: String,
    include_abi: bool,
}

impl SourcifyClient {
    pub fn new(config: &VerificationConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            include_abi: config.include_abi,
        }
    }

    pub fn contract_url(&self, chain_id: &str, address: &str) -> String {
        let fields = if self.include_abi {
            "devdoc,abi"
        } else {
            "devdoc"
        };
        format!(
            "{}/v2/contract/{}/{}?fields={}",
            self.base_url, chain_id, address, fields
        )
    }

    /// Fetch the verified record of one contract. Any non-2xx status is an
    /// error; nothing is retried.
    pub async fn fetch_contract(&self, chain_id: &str, address: &str) -> Result<ContractRecord> {
        let url = self.contract_url(chain_id, address);
        info!("Fetching devdoc for {} on chain {}", address, chain_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach verification service: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP error! status: {}", status.as_u16()));
        }

        let record: ContractRecord = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse verification response: {}", e))?;

        debug!(
            "Fetched record with {} documented methods, abi loaded: {}",
            record.devdoc.methods.len(),
            record.abi.is_some()
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(include_abi: bool) -> VerificationConfig {
        VerificationConfig {
            base_url: "https://sourcify.dev/server/".to_string(),
            include_abi,
        }
    }

    #[test]
    fn test_contract_url_with_abi() {
        let client = SourcifyClient::new(&config(true));
        assert_eq!(
            client.contract_url("11155111", "0xF7eb390231F0Db11C673390f3C25e613D7228659"),
            "https://sourcify.dev/server/v2/contract/11155111/0xF7eb390231F0Db11C673390f3C25e613D7228659?fields=devdoc,abi"
        );
    }

    #[test]
    fn test_contract_url_devdoc_only() {
        let client = SourcifyClient::new(&config(false));
        assert!(client.contract_url("1", "0xabc").ends_with("/v2/contract/1/0xabc?fields=devdoc"));
    }

    async fn spawn_service(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_contract_parses_record() {
        use axum::{routing::get, Json};

        let router = axum::Router::new().route(
            "/v2/contract/:chain/:address",
            get(|| async {
                Json(serde_json::json!({
                    "devdoc": { "title": "Counter", "methods": { "increment()": {} } },
                    "chainId": "1",
                    "address": "0xabc"
                }))
            }),
        );
        let base_url = spawn_service(router).await;

        let client = SourcifyClient::new(&VerificationConfig {
            base_url,
            include_abi: false,
        });
        let record = client.fetch_contract("1", "0xabc").await.unwrap();
        assert_eq!(record.devdoc.title.as_deref(), Some("Counter"));
        assert!(record.devdoc.methods.contains_key("increment()"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        use axum::{http::StatusCode, routing::get};

        let router = axum::Router::new().route(
            "/v2/contract/:chain/:address",
            get(|| async { (StatusCode::NOT_FOUND, "missing") }),
        );
        let base_url = spawn_service(router).await;

        let client = SourcifyClient::new(&VerificationConfig {
            base_url,
            include_abi: true,
        });
        let err = client.fetch_contract("1", "0xabc").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP error! status: 404");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        let client = SourcifyClient::new(&VerificationConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            include_abi: false,
        });
        assert!(client.fetch_contract("1", "0xabc").await.is_err());
    }
}
