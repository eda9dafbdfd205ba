//! Marketplace HTTP client

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use shared::models::OrderCreate;
use shared::util::now_millis;

use super::{CatalogPage, MarketplaceError, OrderSource, ProductCatalog, wire};
use crate::core::config::MarketplaceConfig;
use crate::utils::time::{collection_window, to_marketplace_iso};

const TOKEN_PATH: &str = "/external/v1/oauth2/token";
const ORDERS_PATH: &str = "/external/v1/pay-order/seller/product-orders";
const DISPATCH_PATH: &str = "/external/v1/pay-order/seller/product-orders/dispatch";
const PRODUCT_SEARCH_PATH: &str = "/external/v1/products/search";
const CATALOG_PAGE_SIZE: u32 = 20;

/// Issued tokens are dropped this long before they actually expire
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 300;
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Primary delivery method first; the rest are tried after a 400
const DELIVERY_METHODS: &[&str] = &["NOTHING", "DELIVERY", "DIRECT_DELIVERY", "VISITRECEIVE"];

type HmacSha256 = Hmac<Sha256>;

/// `base64(HMAC-SHA256(secret, "{client_id}_{timestamp}"))`
pub fn sign_client_secret(
    client_id: &str,
    client_secret: &str,
    timestamp: i64,
) -> Result<String, MarketplaceError> {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|_| MarketplaceError::NotConfigured)?;
    mac.update(format!("{client_id}_{timestamp}").as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct IssuedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
struct TokenCache {
    issued: Option<IssuedToken>,
    /// The configured token came back 401; issue fresh ones from now on
    stored_rejected: bool,
}

/// Order source backed by the marketplace commerce API
pub struct MarketplaceClient {
    client: Client,
    config: MarketplaceConfig,
    window_hours: i64,
    token: Mutex<TokenCache>,
}

impl MarketplaceClient {
    pub fn new(
        config: MarketplaceConfig,
        timeout: Duration,
        window_hours: i64,
    ) -> Result<Self, MarketplaceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            config,
            window_hours,
            token: Mutex::new(TokenCache::default()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// Bearer credential: stored token, cached issued token, or a fresh one
    async fn access_token(&self) -> Result<String, MarketplaceError> {
        {
            let cache = self.token.lock();
            if !cache.stored_rejected
                && let Some(stored) = self.config.stored_token()
            {
                return Ok(stored.to_string());
            }
            if let Some(issued) = &cache.issued
                && issued.expires_at > Instant::now()
            {
                return Ok(issued.value.clone());
            }
        }

        if !self.config.can_issue_token() {
            return Err(MarketplaceError::NotConfigured);
        }

        let issued = self.issue_token().await?;
        let value = issued.value.clone();
        self.token.lock().issued = Some(issued);
        Ok(value)
    }

    async fn issue_token(&self) -> Result<IssuedToken, MarketplaceError> {
        let timestamp = now_millis();
        let signature = sign_client_secret(
            &self.config.client_id,
            &self.config.client_secret,
            timestamp,
        )?;
        let timestamp = timestamp.to_string();

        let response = self
            .client
            .post(self.url(TOKEN_PATH))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("client_secret_sign", signature.as_str()),
                ("grant_type", "client_credentials"),
                ("type", "SELF"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Marketplace token request rejected");
            return Err(MarketplaceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| MarketplaceError::InvalidResponse(format!("token response: {e}")))?;

        let ttl = token
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        tracing::info!(ttl_secs = ttl, "Issued marketplace access token");

        Ok(IssuedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }

    /// Forget a token the marketplace rejected
    fn invalidate_token(&self, token: &str) {
        let mut cache = self.token.lock();
        if cache.issued.as_ref().is_some_and(|t| t.value == token) {
            cache.issued = None;
        } else if self.config.stored_token() == Some(token) && self.config.can_issue_token() {
            cache.stored_rejected = true;
        }
        tracing::warn!("Marketplace access token invalidated");
    }

    async fn dispatch(&self, order_number: &str) -> Result<(), MarketplaceError> {
        let token = self.access_token().await?;

        for method in DELIVERY_METHODS {
            let body = json!({
                "dispatchProductOrders": [{
                    "productOrderId": order_number,
                    "deliveryMethod": method,
                    "deliveryCompanyCode": "ETC",
                    "trackingNumber": "",
                    "dispatchDate": to_marketplace_iso(Utc::now()),
                }]
            });

            let response = self
                .client
                .post(self.url(DISPATCH_PATH))
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT => {
                    let text = response.text().await.unwrap_or_default();
                    return if dispatch_rejected(&text, order_number) {
                        Err(MarketplaceError::InvalidResponse(format!(
                            "dispatch of {order_number} listed as failed"
                        )))
                    } else {
                        Ok(())
                    };
                }
                StatusCode::CONFLICT => {
                    tracing::info!(order = %order_number, "Order already dispatched on marketplace");
                    return Ok(());
                }
                StatusCode::BAD_REQUEST => {
                    tracing::debug!(
                        order = %order_number,
                        method = %method,
                        "Delivery method rejected, trying next"
                    );
                }
                StatusCode::UNAUTHORIZED => {
                    self.invalidate_token(&token);
                    return Err(MarketplaceError::Unauthorized);
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(MarketplaceError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
            }
        }

        Err(MarketplaceError::Status {
            status: StatusCode::BAD_REQUEST.as_u16(),
            body: "every delivery method was rejected".into(),
        })
    }
}

/// A 200 body may still list the order under `failProductOrderInfos`
fn dispatch_rejected(body: &str, order_number: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    let data = value.get("data").unwrap_or(&value);

    let listed = |key: &str, id_of: fn(&Value) -> Option<String>| {
        data.get(key)
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|v| id_of(v).as_deref() == Some(order_number)))
    };

    let failed = listed("failProductOrderInfos", |v| {
        v.get("productOrderId").and_then(id_string)
    });
    let succeeded = listed("successProductOrderIds", id_string);
    failed && !succeeded
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl OrderSource for MarketplaceClient {
    async fn fetch_recent_orders(&self) -> Result<Vec<OrderCreate>, MarketplaceError> {
        let token = self.access_token().await?;
        let (from, to) = collection_window(Utc::now(), self.window_hours);

        let response = self
            .client
            .get(self.url(ORDERS_PATH))
            .bearer_auth(&token)
            .query(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("rangeType", "PAYED_DATETIME"),
                ("productOrderStatuses", "PAYED"),
                ("placeOrderStatusType", "OK"),
                ("pageSize", "100"),
                ("page", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token(&token);
            return Err(MarketplaceError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketplaceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| MarketplaceError::InvalidResponse(format!("order listing: {e}")))?;
        let orders = wire::parse_orders(&body);
        tracing::debug!(count = orders.len(), "Fetched marketplace orders");
        Ok(orders)
    }

    async fn mark_dispatched(&self, order_number: &str) -> bool {
        match self.dispatch(order_number).await {
            Ok(()) => {
                tracing::info!(order = %order_number, "Marketplace dispatch confirmed");
                true
            }
            Err(e) => {
                tracing::warn!(order = %order_number, error = %e, "Marketplace dispatch failed");
                false
            }
        }
    }
}

#[async_trait]
impl ProductCatalog for MarketplaceClient {
    async fn search_products(
        &self,
        keyword: Option<&str>,
        page: u32,
    ) -> Result<CatalogPage, MarketplaceError> {
        let token = self.access_token().await?;
        let page = page.max(1);

        let mut body = json!({
            "page": page,
            "size": CATALOG_PAGE_SIZE,
            "productStatusTypes": ["SALE"],
            "orderType": "NO",
        });
        if let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) {
            body["searchQuery"] = json!(keyword);
        }

        let response = self
            .client
            .post(self.url(PRODUCT_SEARCH_PATH))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token(&token);
            return Err(MarketplaceError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketplaceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| MarketplaceError::InvalidResponse(format!("product search: {e}")))?;
        let catalog = wire::parse_catalog(&value, page)
            .map_err(|e| MarketplaceError::InvalidResponse(format!("product search: {e}")))?;
        tracing::debug!(count = catalog.products.len(), page, "Fetched marketplace catalog");
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic_base64() {
        let a = sign_client_secret("client", "secret", 1_700_000_000_000).unwrap();
        let b = sign_client_secret("client", "secret", 1_700_000_000_000).unwrap();
        let c = sign_client_secret("client", "secret", 1_700_000_000_001).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(BASE64.decode(&a).unwrap().len(), 32);
    }

    #[test]
    fn test_dispatch_rejected_body() {
        let failed = r#"{"data":{"failProductOrderInfos":[{"productOrderId":"O-1","code":"X"}],"successProductOrderIds":[]}}"#;
        assert!(dispatch_rejected(failed, "O-1"));
        assert!(!dispatch_rejected(failed, "O-2"));

        let ok = r#"{"data":{"successProductOrderIds":["O-1"]}}"#;
        assert!(!dispatch_rejected(ok, "O-1"));
        assert!(!dispatch_rejected("", "O-1"));
    }

    #[tokio::test]
    async fn test_unconfigured_client_reports_not_configured() {
        let client = MarketplaceClient::new(
            MarketplaceConfig {
                api_url: "http://127.0.0.1:9".into(),
                ..Default::default()
            },
            Duration::from_secs(1),
            24,
        )
        .unwrap();
        let err = client.fetch_recent_orders().await.unwrap_err();
        assert!(matches!(err, MarketplaceError::NotConfigured));
        assert!(!client.mark_dispatched("O-1").await);
    }
}
