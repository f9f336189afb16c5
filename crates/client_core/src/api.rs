//! HTTP plumbing shared by every resource gateway.

use std::{sync::Arc, time::Duration};

use reqwest::{
    multipart::{Form, Part},
    Client, Method, RequestBuilder, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::protocol::{ApiEnvelope, LoginRequest, LoginResponse, UploadedImage};
use tracing::{debug, warn};
use url::Url;

use crate::{error::ClientError, session::AuthTokenProvider};

pub const LOGIN_PATH: &str = "/admin/auth/adminLogin";
pub const IMAGE_UPLOAD_PATH: &str = "/admin/image/uploadImage";

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: Arc<dyn AuthTokenProvider>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        auth: Arc<dyn AuthTokenProvider>,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url)?;
        Ok(Self {
            http: Client::new(),
            base_url,
            auth,
        })
    }

    /// Timeouts are a transport concern; without one a hung backend would
    /// keep a screen in `Loading` forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Network(format!("failed to build http client: {err}")))?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{path}", self.base_url))?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.url(path)?;
        debug!(%method, %url, "backend request");
        let builder = self.http.request(method, url);
        Ok(match self.auth.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Sends the request and unwraps the envelope's `data` field.
    async fn send(&self, builder: RequestBuilder) -> Result<serde_json::Value, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned));
            warn!(status = status.as_u16(), message = ?message, "backend request failed");
            return Err(ClientError::from_status(status, message));
        }

        let envelope: ApiEnvelope = serde_json::from_str(&body)
            .map_err(|err| ClientError::Network(format!("malformed response: {err}")))?;
        if envelope.is_failure() {
            let status =
                StatusCode::from_u16(envelope.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            warn!(status = envelope.status, message = %envelope.message, "backend reported failure");
            return Err(ClientError::from_status(status, Some(envelope.message)));
        }
        Ok(envelope.data)
    }

    pub async fn get_data(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, ClientError> {
        let builder = self.request(Method::GET, path)?.query(params);
        self.send(builder).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        decode(self.get_data(path, &[]).await?)
    }

    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path)?.json(body);
        decode(self.send(builder).await?)
    }

    /// Like [`Self::send_json`], but a successful envelope with `data: null`
    /// yields `None` instead of a decode error.
    pub async fn send_json_opt<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path)?.json(body);
        match self.send(builder).await? {
            serde_json::Value::Null => Ok(None),
            data => decode(data).map(Some),
        }
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let builder = self.request(Method::DELETE, path)?;
        self.send(builder).await.map(|_| ())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "email and password are required".into(),
            ));
        }
        self.send_json(
            Method::POST,
            LOGIN_PATH,
            &LoginRequest {
                email: email.trim().to_string(),
                password: password.to_string(),
            },
        )
        .await
    }

    /// Uploads one image; entity payloads then reference the returned id.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<UploadedImage, ClientError> {
        if bytes.is_empty() {
            return Err(ClientError::Validation("image file is empty".into()));
        }
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|err| ClientError::Validation(format!("invalid mime type: {err}")))?;
        let builder = self
            .request(Method::POST, IMAGE_UPLOAD_PATH)?
            .multipart(Form::new().part("image", part));
        decode(self.send(builder).await?)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, ClientError> {
    serde_json::from_value(data)
        .map_err(|err| ClientError::Network(format!("malformed response: {err}")))
}
