use std::sync::Arc;

pub mod api;
pub mod error;
pub mod gateway;
pub mod list;
pub mod mutation;
pub mod notify;
pub mod resource;
pub mod session;
pub mod suggest;

pub use api::ApiClient;
pub use error::ClientError;
pub use gateway::{HttpGateway, ResourceGateway};
pub use list::{ListController, ListSnapshot, ListStatus};
pub use mutation::{
    ConfirmedDelete, DeleteConfirmation, MutationCoordinator, MutationIntent, MutationOutcome,
};
pub use notify::{ChannelSink, NotificationSink, Toast, ToastLevel, TracingSink};
pub use resource::{
    Blogs, Categories, Contacts, Events, Gallery, Resource, ResourceRoutes, TeamMembers,
    Volunteers,
};
pub use session::{AuthTokenProvider, NoToken, SessionGuard, SessionStore, StaticToken};
pub use suggest::{
    GeminiGenerator, OpportunitySuggester, SuggestionPanel, SuggestionState, TextGenerator,
};

/// One admin screen: a list controller and the mutation coordinator that
/// refreshes it, both driven by the same gateway.
pub struct AdminScreen<R: Resource> {
    gateway: Arc<dyn ResourceGateway<R>>,
    list: Arc<ListController<R>>,
    mutations: MutationCoordinator<R>,
}

impl<R: Resource> AdminScreen<R> {
    pub fn new(gateway: Arc<dyn ResourceGateway<R>>, notifier: Arc<dyn NotificationSink>) -> Self {
        let list = Arc::new(ListController::new(gateway.clone(), notifier.clone()));
        let mutations = MutationCoordinator::new(gateway.clone(), notifier).with_list(list.clone());
        Self {
            gateway,
            list,
            mutations,
        }
    }

    /// Screen backed by the resource's own backend routes.
    pub fn over_http(api: ApiClient, notifier: Arc<dyn NotificationSink>) -> Self {
        Self::new(Arc::new(HttpGateway::<R>::new(api)), notifier)
    }

    pub fn gateway(&self) -> &Arc<dyn ResourceGateway<R>> {
        &self.gateway
    }

    pub fn list(&self) -> &Arc<ListController<R>> {
        &self.list
    }

    pub fn mutations(&self) -> &MutationCoordinator<R> {
        &self.mutations
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
