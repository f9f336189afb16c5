//! Mutation Coordinator and the confirm-then-act delete flow.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::Entity;
use tracing::{info, warn};

use crate::{
    error::ClientError,
    gateway::ResourceGateway,
    list::ListController,
    notify::{NotificationSink, Toast},
    resource::Resource,
};

/// A delete the user has confirmed. Only [`DeleteConfirmation::confirm`]
/// creates one, and the gateway's `remove` requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedDelete {
    id: String,
}

impl ConfirmedDelete {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeleteConfirmation {
    #[default]
    Idle,
    PendingConfirmation(String),
    Confirmed(String),
    Cancelled(String),
}

impl DeleteConfirmation {
    /// Opens the confirmation prompt for `id`, replacing any earlier one.
    pub fn request(&mut self, id: impl Into<String>) {
        *self = Self::PendingConfirmation(id.into());
    }

    pub fn confirm(&mut self) -> Option<ConfirmedDelete> {
        match std::mem::take(self) {
            Self::PendingConfirmation(id) => {
                *self = Self::Confirmed(id.clone());
                Some(ConfirmedDelete { id })
            }
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Self::PendingConfirmation(id) = std::mem::take(self) {
            *self = Self::Cancelled(id);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::Idle;
    }

    pub fn pending_id(&self) -> Option<&str> {
        match self {
            Self::PendingConfirmation(id) => Some(id),
            _ => None,
        }
    }
}

pub enum MutationIntent<R: Resource> {
    Create(R::Payload),
    Update { id: String, payload: R::Payload },
    Delete(ConfirmedDelete),
    /// Shorthand update flipping the resource's status flag from `current`.
    ToggleStatus { id: String, current: bool },
}

impl<R: Resource> MutationIntent<R> {
    pub fn toggle(entity: &R::Entity) -> Result<Self, ClientError> {
        let current = entity
            .status_flag()
            .ok_or(ClientError::Unsupported("status toggle"))?;
        Ok(Self::ToggleStatus {
            id: entity.id().to_string(),
            current,
        })
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Create(_) => "created",
            Self::Update { .. } => "updated",
            Self::Delete(_) => "deleted",
            Self::ToggleStatus { .. } => "status updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<E> {
    /// Holds the record when the backend echoed it back.
    Created(Option<E>),
    Updated(Option<E>),
    Deleted(String),
}

impl<E> MutationOutcome<E> {
    pub fn entity(&self) -> Option<&E> {
        match self {
            Self::Created(entity) | Self::Updated(entity) => entity.as_ref(),
            Self::Deleted(_) => None,
        }
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MutationCoordinator<R: Resource> {
    gateway: Arc<dyn ResourceGateway<R>>,
    notifier: Arc<dyn NotificationSink>,
    list: Option<Arc<ListController<R>>>,
    in_flight: AtomicBool,
}

impl<R: Resource> MutationCoordinator<R> {
    pub fn new(gateway: Arc<dyn ResourceGateway<R>>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            gateway,
            notifier,
            list: None,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Refreshes `list` in place after every successful mutation.
    pub fn with_list(mut self, list: Arc<ListController<R>>) -> Self {
        self.list = Some(list);
        self
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one mutation: one gateway call, one toast, and on success one
    /// list refresh. A failure leaves the list untouched. A second call while
    /// one is pending is rejected with [`ClientError::Busy`] without touching
    /// the backend.
    pub async fn execute(
        &self,
        intent: MutationIntent<R>,
    ) -> Result<MutationOutcome<R::Entity>, ClientError> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            warn!(resource = R::NAME, "mutation rejected while another is in flight");
            return Err(ClientError::Busy);
        };

        let verb = intent.verb();
        let result = self.dispatch(intent).await;

        match result {
            Ok(outcome) => {
                info!(resource = R::NAME, verb, "mutation succeeded");
                self.notifier.notify(Toast::success(
                    "Success",
                    format!("{} {verb} successfully.", R::NAME),
                ));
                if let Some(list) = &self.list {
                    list.refresh().await;
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(resource = R::NAME, verb, error = %err, "mutation failed");
                self.notifier
                    .notify(Toast::error("Error", &err.to_api_error()));
                Err(err)
            }
        }
    }

    async fn dispatch(
        &self,
        intent: MutationIntent<R>,
    ) -> Result<MutationOutcome<R::Entity>, ClientError> {
        match intent {
            MutationIntent::Create(payload) => self
                .gateway
                .create(&payload)
                .await
                .map(MutationOutcome::Created),
            MutationIntent::Update { id, payload } => self
                .gateway
                .update(&id, &payload)
                .await
                .map(MutationOutcome::Updated),
            MutationIntent::Delete(confirmed) => {
                self.gateway.remove(&confirmed).await?;
                Ok(MutationOutcome::Deleted(confirmed.id))
            }
            MutationIntent::ToggleStatus { id, current } => self
                .gateway
                .set_status(&id, !current)
                .await
                .map(MutationOutcome::Updated),
        }
    }
}
