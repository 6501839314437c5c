//! HTTP client for the remote services.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, info};

use crate::{
    auth::CredentialSource,
    remote::{OrderService, PromotionService, RemoteCart, RemoteError},
    wire::{
        Envelope,
        cart::{AddItemRequest, RemoveItemRequest, ServerCart, UpdateItemRequest},
        orders::{CreateOrderRequest, OrderResponse},
        promotions::{PromoValidation, ValidatePromoRequest},
    },
};

/// `reqwest` implementation of every remote service.
#[derive(Debug, Clone)]
pub struct HttpServices {
    base_url: String,
    http: Client,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpServices {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach the bearer token when one is available.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    /// Attach the bearer token, failing for guest sessions.
    fn require_auth(&self, request: RequestBuilder) -> Result<RequestBuilder, RemoteError> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or(RemoteError::Unauthenticated)?;

        Ok(request.bearer_auth(token.expose()))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthenticated);
        }

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: failure_message(&body),
            });
        }

        debug!(status = status.as_u16(), bytes = body.len(), "remote response");

        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct Acknowledgement {
    #[serde(default = "succeeded")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

fn succeeded() -> bool {
    true
}

/// Decode an enveloped payload.
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str::<Envelope<T>>(body)?
        .into_result()
        .map_err(RemoteError::Rejected)
}

/// Check a mutation response; empty and non-JSON success bodies are accepted.
fn acknowledge(body: &str) -> Result<(), RemoteError> {
    match serde_json::from_str::<Acknowledgement>(body) {
        Ok(Acknowledgement {
            success: false,
            message,
        }) => Err(RemoteError::Rejected(
            message.unwrap_or_else(|| "request was not accepted".to_string()),
        )),
        _ => Ok(()),
    }
}

/// Extract the failure message from an error body, falling back to the raw text.
fn failure_message(body: &str) -> String {
    match serde_json::from_str::<Acknowledgement>(body) {
        Ok(Acknowledgement {
            message: Some(message),
            ..
        }) => message,
        _ => body.trim().to_string(),
    }
}

#[async_trait]
impl RemoteCart for HttpServices {
    #[tracing::instrument(name = "cart.http.fetch", skip(self), err)]
    async fn fetch_cart(&self) -> Result<ServerCart, RemoteError> {
        let request = self.require_auth(self.http.get(self.url("/cart")))?;

        let cart: ServerCart = decode(&self.execute(request).await?)?;

        debug!(items = cart.items.len(), "fetched server cart");

        Ok(cart)
    }

    #[tracing::instrument(
        name = "cart.http.add_item",
        skip(self, request),
        fields(product_id = %request.product_id, pharmacy_id = %request.pharmacy_id),
        err
    )]
    async fn add_item(&self, request: AddItemRequest) -> Result<(), RemoteError> {
        let builder = self.require_auth(self.http.post(self.url("/cart/add")).json(&request))?;

        acknowledge(&self.execute(builder).await?)?;

        info!(quantity = request.quantity, "added item to server cart");

        Ok(())
    }

    #[tracing::instrument(
        name = "cart.http.update_item",
        skip(self, request),
        fields(product_id = %request.product_id, quantity = request.quantity),
        err
    )]
    async fn update_item(&self, request: UpdateItemRequest) -> Result<(), RemoteError> {
        let builder = self.require_auth(self.http.put(self.url("/cart/update")).json(&request))?;

        acknowledge(&self.execute(builder).await?)
    }

    #[tracing::instrument(
        name = "cart.http.remove_item",
        skip(self, request),
        fields(product_id = %request.product_id, pharmacy_id = %request.pharmacy_id),
        err
    )]
    async fn remove_item(&self, request: RemoveItemRequest) -> Result<(), RemoteError> {
        let builder =
            self.require_auth(self.http.delete(self.url("/cart/remove")).json(&request))?;

        acknowledge(&self.execute(builder).await?)
    }

    #[tracing::instrument(name = "cart.http.clear", skip(self), err)]
    async fn clear_cart(&self) -> Result<(), RemoteError> {
        let builder = self.require_auth(self.http.delete(self.url("/cart/clear")))?;

        acknowledge(&self.execute(builder).await?)
    }
}

#[async_trait]
impl PromotionService for HttpServices {
    #[tracing::instrument(
        name = "promotions.http.validate",
        skip(self, request),
        fields(promo_code = %request.promo_code),
        err
    )]
    async fn validate(
        &self,
        request: ValidatePromoRequest,
    ) -> Result<PromoValidation, RemoteError> {
        let builder = self.authorize(
            self.http
                .post(self.url("/promo-codes/validate"))
                .json(&request),
        );

        decode(&self.execute(builder).await?)
    }
}

#[async_trait]
impl OrderService for HttpServices {
    #[tracing::instrument(
        name = "orders.http.create",
        skip(self, request),
        fields(lines = request.items.len(), total = %request.total),
        err
    )]
    async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, RemoteError> {
        let builder = self.authorize(self.http.post(self.url("/orders/")).json(&request));

        let order: OrderResponse = decode(&self.execute(builder).await?)?;

        info!(order_id = ?order.id, "order submitted");

        Ok(order)
    }
}
