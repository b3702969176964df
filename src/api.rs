use crate::coerce::ProcessedRow;
use async_trait::async_trait;
use catalog_types::{CategoriesBody, Category, Empty, Envelope, Product, ProductPatch, ProductsBody};
use derive_more::{Display, Error};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Display, Error)]
pub enum ApiError {
    #[display("Network error: {_0}")]
    Transport(reqwest::Error),
    #[error(ignore)]
    #[display("{message} ({status})")]
    Status { status: u16, message: String },
    #[error(ignore)]
    Rejected(String),
    #[error(ignore)]
    #[display("Unexpected response: {_0}")]
    Decode(String),
}

impl ApiError {
    /// Text surfaced by the backend, used to tell failure causes apart.
    pub fn message(&self) -> String {
        match self {
            Self::Transport(err) => err.to_string(),
            Self::Status { message, .. } => message.clone(),
            Self::Rejected(message) => message.clone(),
            Self::Decode(message) => message.clone(),
        }
    }
}

/// Admin backend, JSON over REST.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, ApiError>;
    async fn active_categories(&self) -> Result<Vec<Category>, ApiError>;
    /// Creates every row in one call; the backend accepts or rejects the batch as a whole.
    async fn bulk_create_products(&self, products: &[ProcessedRow]) -> Result<String, ApiError>;
    async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<(), ApiError>;
    async fn delete_product(&self, id: &str) -> Result<(), ApiError>;
    async fn export_products_csv(&self) -> Result<Vec<u8>, ApiError>;
}

#[derive(Serialize)]
struct BulkCreate<'a> {
    products: &'a [ProcessedRow],
}

pub struct HttpAdminApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpAdminApi {
    pub fn new(client: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Envelope<T>, ApiError> {
        let res = req.send().await.map_err(ApiError::Transport)?;
        let status = res.status().as_u16();
        let text = res.text().await.map_err(ApiError::Transport)?;
        decode_envelope(status, &text)
    }
}

/// Interpret a backend response. Non-2xx statuses and `success: false` bodies
/// become errors carrying the backend's message.
pub fn decode_envelope<T: DeserializeOwned>(
    status: u16,
    text: &str,
) -> Result<Envelope<T>, ApiError> {
    let parsed = serde_json::from_str::<Envelope<T>>(text);
    if !(200..300).contains(&status) {
        let message = match serde_json::from_str::<Envelope<Empty>>(text) {
            Ok(Envelope {
                message: Some(m), ..
            }) => m,
            _ if text.trim().is_empty() => format!("Request failed with status {status}"),
            _ => text.trim().to_string(),
        };
        return Err(ApiError::Status { status, message });
    }
    let envelope = parsed.map_err(|err| ApiError::Decode(err.to_string()))?;
    if !envelope.success {
        return Err(ApiError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "Request was rejected".to_string()),
        ));
    }
    Ok(envelope)
}

#[async_trait]
impl AdminApi for HttpAdminApi {
    async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let res: Envelope<ProductsBody> = self.call(self.request(Method::GET, "/products")).await?;
        Ok(res.body.products)
    }

    async fn active_categories(&self) -> Result<Vec<Category>, ApiError> {
        let res: Envelope<CategoriesBody> = self
            .call(self.request(Method::GET, "/categories/active"))
            .await?;
        Ok(res.body.categories)
    }

    async fn bulk_create_products(&self, products: &[ProcessedRow]) -> Result<String, ApiError> {
        let res: Envelope<Empty> = self
            .call(
                self.request(Method::POST, "/products/bulk")
                    .json(&BulkCreate { products }),
            )
            .await?;
        Ok(res
            .message
            .unwrap_or_else(|| format!("{} products created", products.len())))
    }

    async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<(), ApiError> {
        let _: Envelope<Empty> = self
            .call(
                self.request(Method::PATCH, &format!("/products/{id}"))
                    .json(patch),
            )
            .await?;
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> Result<(), ApiError> {
        let _: Envelope<Empty> = self
            .call(self.request(Method::DELETE, &format!("/products/{id}")))
            .await?;
        Ok(())
    }

    async fn export_products_csv(&self) -> Result<Vec<u8>, ApiError> {
        let res = self
            .request(Method::GET, "/products/export/csv")
            .send()
            .await
            .map_err(ApiError::Transport)?;
        let status = res.status().as_u16();
        if !res.status().is_success() {
            let text = res.text().await.map_err(ApiError::Transport)?;
            return Err(decode_envelope::<Empty>(status, &text)
                .err()
                .unwrap_or(ApiError::Status {
                    status,
                    message: "Export failed".to_string(),
                }));
        }
        let bytes = res.bytes().await.map_err(ApiError::Transport)?;
        Ok(bytes.to_vec())
    }
}
