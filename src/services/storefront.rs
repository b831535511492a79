use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::AppConfig;
use crate::entities::store;
use crate::errors::ServiceError;
use crate::rate_limiter::StorefrontThrottle;

/// Outbound contract to the storefront platform, which holds the
/// authoritative listed price. Every price change is mirrored there before
/// the catalog is touched, and the platform reports success or failure
/// explicitly; there is no silent partial success.
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    async fn set_price(
        &self,
        store: &store::Model,
        external_id: &str,
        price: Decimal,
    ) -> Result<(), ServiceError>;
}

/// reqwest-backed client for the storefront admin API.
pub struct HttpStorefrontClient {
    client: Client,
    api_version: String,
}

impl HttpStorefrontClient {
    /// Build a client using the configured timeout and API version.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.storefront_api_timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::ExternalApiError(format!(
                    "failed to construct storefront client: {}",
                    e
                ))
            })?;
        Ok(Self::with_client(
            client,
            config.storefront_api_version.clone(),
        ))
    }

    /// Build a client from an existing reqwest client (useful for testing).
    pub fn with_client(client: Client, api_version: String) -> Self {
        Self {
            client,
            api_version,
        }
    }

    fn listing_url(&self, store: &store::Model, external_id: &str) -> String {
        // Domains without a scheme default to https.
        let domain = store.storefront_domain.trim_end_matches('/');
        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        };
        format!(
            "{}/admin/api/{}/listings/{}.json",
            base, self.api_version, external_id
        )
    }

    fn build_headers(&self, access_token: &str) -> Result<HeaderMap, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "X-Storefront-Access-Token",
            HeaderValue::from_str(access_token).map_err(|_| {
                ServiceError::ExternalApiError(
                    "invalid characters in storefront access token".to_string(),
                )
            })?,
        );
        Ok(headers)
    }
}

#[async_trait]
impl StorefrontApi for HttpStorefrontClient {
    #[instrument(skip(self, store), fields(store_id = %store.id))]
    async fn set_price(
        &self,
        store: &store::Model,
        external_id: &str,
        price: Decimal,
    ) -> Result<(), ServiceError> {
        let url = self.listing_url(store, external_id);
        let headers = self.build_headers(&store.storefront_access_token)?;
        let body = json!({
            "listing": {
                "id": external_id,
                "price": price.round_dp(2).to_string(),
            }
        });

        let response = self
            .client
            .put(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalApiError(format!("storefront request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalApiError(format!(
                "storefront rejected price update (status {}): {}",
                status, text
            )));
        }

        debug!(
            "Storefront acknowledged price {} for listing {}",
            price, external_id
        );
        Ok(())
    }
}

/// Routes every storefront call through the shared per-store token bucket.
/// The sweep, the toggles, and undo all hold the same instance, so one call
/// budget covers them all.
pub struct ThrottledStorefront {
    inner: Arc<dyn StorefrontApi>,
    throttle: StorefrontThrottle,
}

impl ThrottledStorefront {
    pub fn new(inner: Arc<dyn StorefrontApi>, throttle: StorefrontThrottle) -> Self {
        Self { inner, throttle }
    }
}

#[async_trait]
impl StorefrontApi for ThrottledStorefront {
    async fn set_price(
        &self,
        store: &store::Model,
        external_id: &str,
        price: Decimal,
    ) -> Result<(), ServiceError> {
        self.throttle.acquire(store.id).await;
        self.inner.set_price(store, external_id, price).await
    }
}
