//! List State Machine: owns one screen's query and the last applied page.
//!
//! Every state-affecting change re-issues `list` against the gateway. Each
//! issued request takes the next sequence number and a response is applied
//! only while its number is still the latest, so a slow response to a
//! superseded query can never overwrite fresher state.

use std::sync::Arc;

use shared::{
    error::ApiError,
    protocol::{ListQuery, ListResult, SortOrder},
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    error::ClientError,
    gateway::ResourceGateway,
    notify::{NotificationSink, Toast},
    resource::Resource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListStatus {
    Idle,
    Loading,
    Ready,
    /// Distinct from an empty `Ready` page.
    Error(ApiError),
}

#[derive(Debug, Clone)]
pub struct ListSnapshot<E> {
    pub status: ListStatus,
    pub query: ListQuery,
    pub items: Vec<E>,
    pub total_count: u64,
    /// Sequence number of the most recently issued request.
    pub requested_seq: u64,
    /// Sequence number of the response the items came from.
    pub applied_seq: u64,
}

impl<E> ListSnapshot<E> {
    fn new(query: ListQuery) -> Self {
        Self {
            status: ListStatus::Idle,
            query,
            items: Vec::new(),
            total_count: 0,
            requested_seq: 0,
            applied_seq: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.query.page()
    }

    pub fn total_pages(&self) -> u32 {
        ListResult::<E> {
            items: Vec::new(),
            total_count: self.total_count,
        }
        .total_pages(self.query.limit)
    }

    pub fn has_next(&self) -> bool {
        self.page() < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.query.offset > 0
    }

    pub fn is_loading(&self) -> bool {
        self.status == ListStatus::Loading
    }

    pub fn error(&self) -> Option<&ApiError> {
        match &self.status {
            ListStatus::Error(err) => Some(err),
            _ => None,
        }
    }
}

pub struct ListController<R: Resource> {
    gateway: Arc<dyn ResourceGateway<R>>,
    notifier: Arc<dyn NotificationSink>,
    filter_keys: &'static [&'static str],
    state: watch::Sender<ListSnapshot<R::Entity>>,
}

impl<R: Resource> ListController<R> {
    pub fn new(gateway: Arc<dyn ResourceGateway<R>>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self::with_query(gateway, notifier, ListQuery::new(R::PAGE_SIZE))
    }

    pub fn with_query(
        gateway: Arc<dyn ResourceGateway<R>>,
        notifier: Arc<dyn NotificationSink>,
        query: ListQuery,
    ) -> Self {
        let (state, _) = watch::channel(ListSnapshot::new(query));
        Self {
            gateway,
            notifier,
            filter_keys: R::FILTER_KEYS,
            state,
        }
    }

    pub fn snapshot(&self) -> ListSnapshot<R::Entity> {
        self.state.borrow().clone()
    }

    /// Every applied transition is published here; rendering is a pure
    /// function of the received snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot<R::Entity>> {
        self.state.subscribe()
    }

    /// Controls that trigger fetches stay disabled while this is true.
    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Initial fetch: `Idle -> Loading`.
    pub async fn load(&self) -> ListSnapshot<R::Entity> {
        self.refresh().await
    }

    /// Re-reads the current query in place.
    pub async fn refresh(&self) -> ListSnapshot<R::Entity> {
        self.issue(|_| true).await
    }

    pub async fn set_search(&self, term: impl Into<String>) -> ListSnapshot<R::Entity> {
        let term = term.into();
        self.issue(move |query| {
            if query.search_term == term {
                return false;
            }
            query.search_term = term;
            query.offset = 0;
            true
        })
        .await
    }

    /// Sets one filter; an empty value removes it.
    pub async fn set_filter(
        &self,
        key: &str,
        value: impl Into<String>,
    ) -> Result<ListSnapshot<R::Entity>, ClientError> {
        let key = self.known_filter(key)?;
        let value = value.into();
        Ok(self
            .issue(move |query| {
                let changed = if value.is_empty() {
                    query.filters.remove(key).is_some()
                } else {
                    query.filters.insert(key.to_string(), value.clone()).as_ref() != Some(&value)
                };
                if changed {
                    query.offset = 0;
                }
                changed
            })
            .await)
    }

    pub async fn clear_filter(&self, key: &str) -> Result<ListSnapshot<R::Entity>, ClientError> {
        self.set_filter(key, String::new()).await
    }

    pub async fn set_sort(&self, sort: Option<SortOrder>) -> ListSnapshot<R::Entity> {
        self.issue(move |query| {
            if query.sort == sort {
                return false;
            }
            query.sort = sort;
            query.offset = 0;
            true
        })
        .await
    }

    /// No-op on the last page.
    pub async fn next_page(&self) -> ListSnapshot<R::Entity> {
        let total_pages = self.state.borrow().total_pages();
        self.issue(move |query| {
            if query.page() >= total_pages {
                return false;
            }
            query.offset += query.limit;
            true
        })
        .await
    }

    /// No-op on the first page.
    pub async fn prev_page(&self) -> ListSnapshot<R::Entity> {
        self.issue(|query| {
            if query.offset == 0 {
                return false;
            }
            query.offset = query.offset.saturating_sub(query.limit);
            true
        })
        .await
    }

    fn known_filter(&self, key: &str) -> Result<&'static str, ClientError> {
        self.filter_keys
            .iter()
            .copied()
            .find(|known| *known == key)
            .ok_or_else(|| {
                ClientError::Validation(format!(
                    "unknown filter '{key}' for {}; expected one of {:?}",
                    R::NAME,
                    self.filter_keys
                ))
            })
    }

    /// Applies `change` to the query and, if it reports a change, issues a
    /// new request under the next sequence number.
    async fn issue(
        &self,
        change: impl FnOnce(&mut ListQuery) -> bool,
    ) -> ListSnapshot<R::Entity> {
        let mut issued: Option<(u64, ListQuery)> = None;
        self.state.send_if_modified(|snapshot| {
            let mut query = snapshot.query.clone();
            if !change(&mut query) {
                return false;
            }
            snapshot.requested_seq += 1;
            snapshot.query = query.clone();
            snapshot.status = ListStatus::Loading;
            issued = Some((snapshot.requested_seq, query));
            true
        });

        let Some((seq, query)) = issued else {
            return self.snapshot();
        };

        debug!(resource = R::NAME, seq, page = query.page(), "list requested");
        let result = self.gateway.list(&query).await;
        self.apply(seq, result);
        self.snapshot()
    }

    fn apply(&self, seq: u64, result: Result<ListResult<R::Entity>, ClientError>) {
        let mut failure: Option<ApiError> = None;
        let applied = self.state.send_if_modified(|snapshot| {
            if snapshot.requested_seq != seq {
                return false;
            }
            snapshot.applied_seq = seq;
            match result {
                Ok(page) => {
                    snapshot.items = page.items;
                    snapshot.total_count = page.total_count;
                    snapshot.status = ListStatus::Ready;
                }
                Err(err) => {
                    let err = err.to_api_error();
                    snapshot.status = ListStatus::Error(err.clone());
                    failure = Some(err);
                }
            }
            true
        });

        if !applied {
            debug!(resource = R::NAME, seq, "discarded superseded list response");
            return;
        }
        if let Some(err) = failure {
            warn!(resource = R::NAME, seq, message = %err.message, "list fetch failed");
            self.notifier
                .notify(Toast::error(format!("Failed to load {} list", R::NAME), &err));
        }
    }
}
