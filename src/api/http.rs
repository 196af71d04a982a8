// src/api/http.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::api::{IdentityGateway, PermissionStore};
use crate::common::error::AppError;
use crate::models::auth::CurrentUserResponse;
use crate::models::permission::{Permission, PermissionRecord};

/// Chamado quando qualquer requisição volta 401 (o "redirect para o login").
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

// Corpo de erro padrão da API: { "message": "..." }
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            on_unauthorized: None,
        })
    }

    pub fn with_unauthorized_hook(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // Traduz a resposta: 401 vira Unauthorized (e dispara o hook),
    // outros erros viram Rejected com a mensagem do backend.
    async fn check(&self, response: Response) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("🔒 API respondeu 401; sessão inválida");
            if let Some(hook) = &self.on_unauthorized {
                hook();
            }
            return Err(AppError::Unauthorized);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message.or(body.error))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "O servidor recusou a operação ({}).",
                    status.canonical_reason().unwrap_or(status.as_str())
                )
            });

        tracing::warn!("⚠️ API recusou a requisição ({}): {}", status, message);
        Err(AppError::Rejected { message })
    }
}

#[async_trait]
impl IdentityGateway for HttpBackend {
    async fn fetch_current_user(&self) -> Result<CurrentUserResponse, AppError> {
        let response = self
            .authorized(self.client.get(self.url("/auth/me")))
            .send()
            .await?;
        let user = self.check(response).await?.json::<CurrentUserResponse>().await?;
        Ok(user)
    }

    async fn logout(&self) -> Result<(), AppError> {
        let response = self
            .authorized(self.client.post(self.url("/auth/logout")))
            .send()
            .await?;

        // Sessão que já caiu no servidor conta como logout feito
        match self.check(response).await {
            Ok(_) | Err(AppError::Unauthorized) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PermissionStore for HttpBackend {
    async fn submit_permission(&self, record: &PermissionRecord) -> Result<(), AppError> {
        let response = self
            .authorized(self.client.post(self.url("/permissions")))
            .json(record)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn fetch_permissions(&self, user_id: i64) -> Result<Vec<Permission>, AppError> {
        let response = self
            .authorized(self.client.get(self.url("/permissions")))
            .query(&[("userId", user_id)])
            .send()
            .await?;
        let permissions = self.check(response).await?.json::<Vec<Permission>>().await?;
        Ok(permissions)
    }
}
