//! Resource Gateway: typed request/response functions for one entity kind.

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use shared::{
    domain::{Category, Validate},
    protocol::{ListQuery, ListResult},
};
use tracing::info;

use crate::{
    api::{decode, ApiClient},
    error::ClientError,
    mutation::ConfirmedDelete,
    resource::{Categories, Resource, ResourceRoutes, UpdateMethod, ACTIVE_CATEGORIES_PATH},
};

#[async_trait]
pub trait ResourceGateway<R: Resource>: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<ListResult<R::Entity>, ClientError>;
    async fn get(&self, id: &str) -> Result<R::Entity, ClientError>;
    /// `None` when the backend acknowledges the write without echoing the
    /// record.
    async fn create(&self, payload: &R::Payload) -> Result<Option<R::Entity>, ClientError>;
    async fn update(&self, id: &str, payload: &R::Payload)
        -> Result<Option<R::Entity>, ClientError>;
    /// Only reachable with a delete the user has confirmed.
    async fn remove(&self, confirmed: &ConfirmedDelete) -> Result<(), ClientError>;
    async fn set_status(&self, id: &str, value: bool) -> Result<Option<R::Entity>, ClientError>;
}

pub struct HttpGateway<R: Resource> {
    api: ApiClient,
    routes: ResourceRoutes,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> HttpGateway<R> {
    pub fn new(api: ApiClient) -> Self {
        Self::with_routes(api, R::routes())
    }

    pub fn with_routes(api: ApiClient, routes: ResourceRoutes) -> Self {
        Self {
            api,
            routes,
            _resource: PhantomData,
        }
    }

    fn item_path(
        template: Option<&String>,
        id: &str,
        operation: &'static str,
    ) -> Result<String, ClientError> {
        let template = template.ok_or(ClientError::Unsupported(operation))?;
        check_id(id)?;
        Ok(ResourceRoutes::fill(template, id))
    }

    fn update_method(&self) -> Method {
        match self.routes.update_method {
            UpdateMethod::Put => Method::PUT,
            UpdateMethod::Patch => Method::PATCH,
        }
    }
}

impl HttpGateway<Categories> {
    /// Active categories for the blog and event category pickers.
    pub async fn list_active(&self, search: &str) -> Result<ListResult<Category>, ClientError> {
        let search = search.trim();
        let params = if search.is_empty() {
            Vec::new()
        } else {
            vec![("search".to_string(), search.to_string())]
        };
        let data = self.api.get_data(ACTIVE_CATEGORIES_PATH, &params).await?;
        extract_list(data, Categories::LIST_KEYS)
    }
}

fn check_id(id: &str) -> Result<(), ClientError> {
    if id.trim().is_empty() {
        return Err(ClientError::Validation("id: is required".into()));
    }
    if id.contains('/') || id.contains('?') || id.contains('#') {
        return Err(ClientError::Validation(format!("id: '{id}' is not a valid id")));
    }
    Ok(())
}

/// Reads a list payload: either `{ items | <resource key>: [...], totalCount }`
/// or a bare array.
pub(crate) fn extract_list<T: DeserializeOwned>(
    data: serde_json::Value,
    keys: &[&str],
) -> Result<ListResult<T>, ClientError> {
    match data {
        serde_json::Value::Array(items) => {
            let total_count = items.len() as u64;
            Ok(ListResult {
                items: decode(serde_json::Value::Array(items))?,
                total_count,
            })
        }
        serde_json::Value::Object(mut map) => {
            let Some(items) = std::iter::once("items")
                .chain(keys.iter().copied())
                .find_map(|key| map.remove(key))
            else {
                let found: Vec<&String> = map.keys().collect();
                return Err(ClientError::Network(format!(
                    "malformed response: list payload has none of {:?} (found {found:?})",
                    std::iter::once("items").chain(keys.iter().copied()).collect::<Vec<_>>()
                )));
            };
            let items: Vec<T> = decode(items)?;
            let total_count = map
                .get("totalCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(items.len() as u64);
            Ok(ListResult { items, total_count })
        }
        serde_json::Value::Null => Ok(ListResult::default()),
        other => Err(ClientError::Network(format!(
            "malformed response: unexpected list payload {other}"
        ))),
    }
}

#[async_trait]
impl<R: Resource> ResourceGateway<R> for HttpGateway<R> {
    async fn list(&self, query: &ListQuery) -> Result<ListResult<R::Entity>, ClientError> {
        let data = self.api.get_data(&self.routes.list, &query.to_params()).await?;
        extract_list(data, R::LIST_KEYS)
    }

    async fn get(&self, id: &str) -> Result<R::Entity, ClientError> {
        let path = Self::item_path(self.routes.get.as_ref(), id, "get")?;
        self.api.get_json(&path).await
    }

    async fn create(&self, payload: &R::Payload) -> Result<Option<R::Entity>, ClientError> {
        let path = self
            .routes
            .create
            .as_deref()
            .ok_or(ClientError::Unsupported("create"))?;
        payload.validate()?;
        let created: Option<R::Entity> =
            self.api.send_json_opt(Method::POST, path, payload).await?;
        info!(resource = R::NAME, echoed = created.is_some(), "created");
        Ok(created)
    }

    async fn update(
        &self,
        id: &str,
        payload: &R::Payload,
    ) -> Result<Option<R::Entity>, ClientError> {
        let path = Self::item_path(self.routes.update.as_ref(), id, "update")?;
        payload.validate()?;
        let updated: Option<R::Entity> = self
            .api
            .send_json_opt(self.update_method(), &path, payload)
            .await?;
        info!(resource = R::NAME, id, "updated");
        Ok(updated)
    }

    async fn remove(&self, confirmed: &ConfirmedDelete) -> Result<(), ClientError> {
        let path = Self::item_path(self.routes.delete.as_ref(), confirmed.id(), "delete")?;
        self.api.delete(&path).await?;
        info!(resource = R::NAME, id = confirmed.id(), "deleted");
        Ok(())
    }

    async fn set_status(&self, id: &str, value: bool) -> Result<Option<R::Entity>, ClientError> {
        let field = R::STATUS_FIELD.ok_or(ClientError::Unsupported("status toggle"))?;
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), serde_json::Value::Bool(value));
        let updated: Option<R::Entity> = match &self.routes.status {
            Some(_) => {
                let path = Self::item_path(self.routes.status.as_ref(), id, "status toggle")?;
                self.api.send_json_opt(Method::PUT, &path, &body).await?
            }
            None => {
                let path = Self::item_path(self.routes.update.as_ref(), id, "status toggle")?;
                self.api
                    .send_json_opt(self.update_method(), &path, &body)
                    .await?
            }
        };
        info!(resource = R::NAME, id, field, value, "status changed");
        Ok(updated)
    }
}
