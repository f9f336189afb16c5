use super::*;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex as StdMutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{BlogPost, Category, CategoryPayload},
    error::ErrorCode,
    protocol::{ListQuery, ListResult, SortOrder},
};
use tokio::sync::oneshot;

#[derive(Default)]
struct RecordingSink {
    toasts: StdMutex<Vec<Toast>>,
}

impl RecordingSink {
    fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().expect("toasts").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().expect("toasts").push(toast);
    }
}

fn post(id: &str, title: &str) -> BlogPost {
    BlogPost {
        id: id.to_string(),
        title: title.to_string(),
        category: None,
        content: None,
        image: None,
        is_draft: false,
        is_active: true,
        created_at: None,
    }
}

type ListReply = Result<ListResult<BlogPost>, ClientError>;

/// Blog gateway whose list calls stay pending until the test answers them.
#[derive(Default)]
struct GatedGateway {
    calls: StdMutex<Vec<(ListQuery, Option<oneshot::Sender<ListReply>>)>>,
}

impl GatedGateway {
    fn call_count(&self) -> usize {
        self.calls.lock().expect("calls").len()
    }

    fn query(&self, index: usize) -> ListQuery {
        self.calls.lock().expect("calls")[index].0.clone()
    }

    fn answer(&self, index: usize, reply: ListReply) {
        let tx = self.calls.lock().expect("calls")[index]
            .1
            .take()
            .expect("call answered twice");
        let _ = tx.send(reply);
    }

    async fn wait_for_calls(&self, count: usize) {
        for _ in 0..200 {
            if self.call_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} list calls, saw {}", self.call_count());
    }
}

#[async_trait]
impl ResourceGateway<Blogs> for GatedGateway {
    async fn list(&self, query: &ListQuery) -> ListReply {
        let (tx, rx) = oneshot::channel();
        self.calls
            .lock()
            .expect("calls")
            .push((query.clone(), Some(tx)));
        rx.await
            .unwrap_or_else(|_| Err(ClientError::Network("reply dropped".into())))
    }

    async fn get(&self, _id: &str) -> Result<BlogPost, ClientError> {
        Err(ClientError::Unsupported("get"))
    }

    async fn create(
        &self,
        _payload: &shared::domain::BlogPayload,
    ) -> Result<Option<BlogPost>, ClientError> {
        Err(ClientError::Unsupported("create"))
    }

    async fn update(
        &self,
        _id: &str,
        _payload: &shared::domain::BlogPayload,
    ) -> Result<Option<BlogPost>, ClientError> {
        Err(ClientError::Unsupported("update"))
    }

    async fn remove(&self, _confirmed: &ConfirmedDelete) -> Result<(), ClientError> {
        Err(ClientError::Unsupported("delete"))
    }

    async fn set_status(&self, _id: &str, _value: bool) -> Result<Option<BlogPost>, ClientError> {
        Err(ClientError::Unsupported("status toggle"))
    }
}

fn page_of(prefix: &str, count: usize, total: u64) -> ListReply {
    Ok(ListResult {
        items: (0..count)
            .map(|i| post(&format!("{prefix}-{i}"), &format!("{prefix} post {i}")))
            .collect(),
        total_count: total,
    })
}

async fn loaded_blog_list(total: u64) -> (Arc<GatedGateway>, Arc<ListController<Blogs>>, Arc<RecordingSink>) {
    let gateway = Arc::new(GatedGateway::default());
    let sink = Arc::new(RecordingSink::default());
    let list = Arc::new(ListController::<Blogs>::new(gateway.clone(), sink.clone()));
    assert_eq!(list.snapshot().status, ListStatus::Idle);

    let task = tokio::spawn({
        let list = list.clone();
        async move { list.load().await }
    });
    gateway.wait_for_calls(1).await;
    assert!(list.is_busy());
    gateway.answer(0, page_of("p1", 6, total));
    let snapshot = task.await.expect("load task");
    assert_eq!(snapshot.status, ListStatus::Ready);
    (gateway, list, sink)
}

#[tokio::test]
async fn superseded_page_one_response_never_overwrites_page_two() {
    let (gateway, list, _sink) = loaded_blog_list(12).await;

    let page_one = tokio::spawn({
        let list = list.clone();
        async move { list.refresh().await }
    });
    gateway.wait_for_calls(2).await;

    let page_two = tokio::spawn({
        let list = list.clone();
        async move { list.next_page().await }
    });
    gateway.wait_for_calls(3).await;
    assert_eq!(gateway.query(1).offset, 0);
    assert_eq!(gateway.query(2).offset, 6);

    gateway.answer(2, page_of("p2", 6, 12));
    page_two.await.expect("page two task");
    gateway.answer(1, page_of("stale", 6, 12));
    page_one.await.expect("page one task");

    let snapshot = list.snapshot();
    assert_eq!(snapshot.status, ListStatus::Ready);
    assert_eq!(snapshot.page(), 2);
    assert_eq!(snapshot.applied_seq, snapshot.requested_seq);
    assert!(snapshot.items.iter().all(|item| item.id.starts_with("p2-")));
}

#[tokio::test]
async fn filter_search_and_sort_changes_reset_offset() {
    let (gateway, list, _sink) = loaded_blog_list(30).await;

    let task = tokio::spawn({
        let list = list.clone();
        async move { list.next_page().await }
    });
    gateway.wait_for_calls(2).await;
    gateway.answer(1, page_of("p2", 6, 30));
    assert_eq!(task.await.expect("next").query.offset, 6);

    // refresh keeps the page
    let task = tokio::spawn({
        let list = list.clone();
        async move { list.refresh().await }
    });
    gateway.wait_for_calls(3).await;
    assert_eq!(gateway.query(2).offset, 6);
    gateway.answer(2, page_of("p2", 6, 30));
    task.await.expect("refresh");

    let task = tokio::spawn({
        let list = list.clone();
        async move { list.set_search("gala").await }
    });
    gateway.wait_for_calls(4).await;
    assert_eq!(gateway.query(3).offset, 0);
    assert_eq!(gateway.query(3).search_term, "gala");
    gateway.answer(3, page_of("gala", 6, 30));
    task.await.expect("search");

    // move off page one again, then change the sort
    let task = tokio::spawn({
        let list = list.clone();
        async move { list.next_page().await }
    });
    gateway.wait_for_calls(5).await;
    gateway.answer(4, page_of("gala2", 6, 30));
    task.await.expect("next");

    let task = tokio::spawn({
        let list = list.clone();
        async move { list.set_sort(Some(SortOrder::TitleAsc)).await }
    });
    gateway.wait_for_calls(6).await;
    assert_eq!(gateway.query(5).offset, 0);
    assert_eq!(gateway.query(5).sort, Some(SortOrder::TitleAsc));
    gateway.answer(5, page_of("sorted", 6, 30));
    task.await.expect("sort");

    let task = tokio::spawn({
        let list = list.clone();
        async move { list.set_filter("category", "News").await }
    });
    gateway.wait_for_calls(7).await;
    assert_eq!(
        gateway.query(6).filters.get("category").map(String::as_str),
        Some("News")
    );
    gateway.answer(6, page_of("news", 6, 30));
    task.await.expect("filter task").expect("filter");

    // unchanged search is not a state change
    let before = list.snapshot().requested_seq;
    let snapshot = list.set_search("gala").await;
    assert_eq!(snapshot.requested_seq, before);
    assert_eq!(gateway.call_count(), 7);
}

#[tokio::test]
async fn unknown_filter_key_is_rejected_without_fetching() {
    let (gateway, list, _sink) = loaded_blog_list(6).await;

    let err = list
        .set_filter("memberType", "Asset")
        .await
        .expect_err("blogs have no memberType filter");
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn paging_stops_at_both_ends() {
    let (gateway, list, _sink) = loaded_blog_list(6).await;

    let snapshot = list.prev_page().await;
    assert_eq!(snapshot.page(), 1);
    let snapshot = list.next_page().await;
    assert_eq!(snapshot.page(), 1);
    assert!(!snapshot.has_next());
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn failed_fetch_is_an_error_state_not_an_empty_page() {
    let (gateway, list, sink) = loaded_blog_list(6).await;

    let task = tokio::spawn({
        let list = list.clone();
        async move { list.refresh().await }
    });
    gateway.wait_for_calls(2).await;
    gateway.answer(1, Err(ClientError::Network("connection refused".into())));
    let snapshot = task.await.expect("refresh");

    let err = snapshot.error().expect("error status");
    assert_eq!(err.code, ErrorCode::Network);
    assert_eq!(err.message, "connection refused");
    assert!(!snapshot.is_loading());

    let toasts = sink.toasts();
    assert_eq!(toasts.len(), 1);
    assert!(toasts[0].is_error());
}

/// In-memory category backend.
#[derive(Default)]
struct MemoryGateway {
    rows: StdMutex<Vec<Category>>,
    list_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    fail_writes: bool,
    hold_create: StdMutex<Option<oneshot::Receiver<()>>>,
}

impl MemoryGateway {
    fn with_rows(rows: Vec<Category>) -> Self {
        Self {
            rows: StdMutex::new(rows),
            ..Self::default()
        }
    }

    fn failing_writes(rows: Vec<Category>) -> Self {
        Self {
            rows: StdMutex::new(rows),
            fail_writes: true,
            ..Self::default()
        }
    }
}

fn category(id: &str, name: &str, is_active: bool) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        is_active,
        created_at: None,
    }
}

#[async_trait]
impl ResourceGateway<Categories> for MemoryGateway {
    async fn list(&self, query: &ListQuery) -> Result<ListResult<Category>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().expect("rows");
        let matching: Vec<Category> = rows
            .iter()
            .filter(|row| {
                row.name
                    .to_lowercase()
                    .contains(&query.search_term.to_lowercase())
            })
            .cloned()
            .collect();
        Ok(ListResult {
            total_count: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .collect(),
        })
    }

    async fn get(&self, id: &str) -> Result<Category, ClientError> {
        self.rows
            .lock()
            .expect("rows")
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("category {id} not found")))
    }

    async fn create(&self, payload: &CategoryPayload) -> Result<Option<Category>, ClientError> {
        let hold = self.hold_create.lock().expect("hold").take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        if self.fail_writes {
            return Err(ClientError::Validation("name already exists".into()));
        }
        let mut rows = self.rows.lock().expect("rows");
        let created = category(&format!("c{}", rows.len() + 1), &payload.name, true);
        rows.push(created.clone());
        Ok(Some(created))
    }

    async fn update(
        &self,
        id: &str,
        payload: &CategoryPayload,
    ) -> Result<Option<Category>, ClientError> {
        if self.fail_writes {
            return Err(ClientError::Validation("name already exists".into()));
        }
        let mut rows = self.rows.lock().expect("rows");
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("category {id} not found")))?;
        row.name = payload.name.clone();
        Ok(Some(row.clone()))
    }

    async fn remove(&self, confirmed: &ConfirmedDelete) -> Result<(), ClientError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().expect("rows");
        let before = rows.len();
        rows.retain(|row| row.id != confirmed.id());
        if rows.len() == before {
            return Err(ClientError::NotFound("category not found".into()));
        }
        Ok(())
    }

    async fn set_status(&self, id: &str, value: bool) -> Result<Option<Category>, ClientError> {
        let mut rows = self.rows.lock().expect("rows");
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("category {id} not found")))?;
        row.is_active = value;
        Ok(Some(row.clone()))
    }
}

fn category_screen(
    gateway: Arc<MemoryGateway>,
) -> (AdminScreen<Categories>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (AdminScreen::new(gateway, sink.clone()), sink)
}

#[tokio::test]
async fn toggling_status_twice_restores_original_state() {
    let gateway = Arc::new(MemoryGateway::with_rows(vec![category("c1", "Tech", true)]));
    let (screen, _sink) = category_screen(gateway.clone());

    let original = gateway.get("c1").await.expect("row");
    let intent = MutationIntent::<Categories>::toggle(&original).expect("toggle intent");
    let flipped = screen
        .mutations()
        .execute(intent)
        .await
        .expect("first toggle");
    let flipped = flipped.entity().expect("entity").clone();
    assert!(!flipped.is_active);

    let restored = screen
        .mutations()
        .execute(MutationIntent::toggle(&flipped).expect("toggle intent"))
        .await
        .expect("second toggle");
    assert_eq!(restored.entity(), Some(&original));
}

#[tokio::test]
async fn delete_runs_only_after_confirmation_and_refreshes_list() {
    let gateway = Arc::new(MemoryGateway::with_rows(vec![
        category("c1", "Tech", true),
        category("c2", "News", true),
    ]));
    let (screen, sink) = category_screen(gateway.clone());
    screen.list().load().await;
    assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 1);

    let mut flow = DeleteConfirmation::default();
    flow.request("c1");
    flow.cancel();
    assert!(flow.confirm().is_none());
    assert_eq!(gateway.remove_calls.load(Ordering::SeqCst), 0);

    flow.request("c1");
    let confirmed = flow.confirm().expect("confirmed");
    let outcome = screen
        .mutations()
        .execute(MutationIntent::Delete(confirmed))
        .await
        .expect("delete");

    assert_eq!(outcome, MutationOutcome::Deleted("c1".to_string()));
    assert_eq!(gateway.remove_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 2);

    let snapshot = screen.list().snapshot();
    assert_eq!(snapshot.total_count, 1);
    assert_eq!(snapshot.items[0].id, "c2");

    let toasts = sink.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Success);
}

#[tokio::test]
async fn failed_mutation_leaves_list_untouched_and_notifies() {
    let gateway = Arc::new(MemoryGateway::failing_writes(vec![category("c1", "Tech", true)]));
    let (screen, sink) = category_screen(gateway.clone());
    let before = screen.list().load().await;

    let err = screen
        .mutations()
        .execute(MutationIntent::Update {
            id: "c1".into(),
            payload: CategoryPayload {
                name: "Updates".into(),
            },
        })
        .await
        .expect_err("update must fail");
    assert!(matches!(err, ClientError::Validation(_)));

    let after = screen.list().snapshot();
    assert_eq!(after.applied_seq, before.applied_seq);
    assert_eq!(after.items, before.items);
    assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 1);

    let toasts = sink.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].description, "name already exists");
    assert!(!screen.mutations().is_busy());
}

#[tokio::test]
async fn second_mutation_while_one_is_in_flight_is_rejected() {
    let gateway = Arc::new(MemoryGateway::default());
    let (release, hold) = oneshot::channel();
    *gateway.hold_create.lock().expect("hold") = Some(hold);
    let (screen, _sink) = category_screen(gateway.clone());
    let screen = Arc::new(screen);

    let first = tokio::spawn({
        let screen = screen.clone();
        async move {
            screen
                .mutations()
                .execute(MutationIntent::Create(CategoryPayload {
                    name: "Fundraiser".into(),
                }))
                .await
        }
    });
    for _ in 0..200 {
        if screen.mutations().is_busy() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(screen.mutations().is_busy());

    let second = screen
        .mutations()
        .execute(MutationIntent::Create(CategoryPayload {
            name: "Duplicate".into(),
        }))
        .await;
    assert_eq!(second.expect_err("busy"), ClientError::Busy);

    release.send(()).expect("release");
    let created = first.await.expect("task").expect("create");
    assert_eq!(created.entity().map(|c| c.name.as_str()), Some("Fundraiser"));
    assert_eq!(gateway.rows.lock().expect("rows").len(), 1);
}

struct TimeoutGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for TimeoutGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::Generation("suggestion request timed out".into()))
    }
}

struct CannedGenerator(&'static str);

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ClientError> {
        assert!(prompt.contains("I like teaching kids to code"));
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn timed_out_suggestion_fails_once_and_notifies() {
    let generator = Arc::new(TimeoutGenerator {
        calls: AtomicUsize::new(0),
    });
    let sink = Arc::new(RecordingSink::default());
    let panel = SuggestionPanel::new(OpportunitySuggester::new(generator.clone()), sink.clone());

    let state = panel.generate("I like teaching kids to code").await;

    match state {
        SuggestionState::Failed(err) => assert_eq!(err.code, ErrorCode::Generation),
        other => panic!("unexpected state: {other:?}"),
    }
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    let toasts = sink.toasts();
    assert_eq!(toasts.len(), 1);
    assert!(toasts[0].is_error());
}

#[tokio::test]
async fn suggestion_panel_renders_generated_list() {
    let sink = Arc::new(RecordingSink::default());
    let panel = SuggestionPanel::new(
        OpportunitySuggester::new(Arc::new(CannedGenerator(
            r#"{"suggestedOpportunities":["Coding club mentor","Robotics workshop assistant","Homework helper"]}"#,
        ))),
        sink.clone(),
    );

    let state = panel.generate("I like teaching kids to code").await;
    assert_eq!(
        state,
        SuggestionState::Ready(vec![
            "Coding club mentor".to_string(),
            "Robotics workshop assistant".to_string(),
            "Homework helper".to_string(),
        ])
    );
    assert!(sink.toasts().is_empty());

    panel.reset();
    assert_eq!(panel.state(), SuggestionState::Idle);
}

#[tokio::test]
async fn blank_message_never_reaches_the_generator() {
    let generator = Arc::new(TimeoutGenerator {
        calls: AtomicUsize::new(0),
    });
    let suggester = OpportunitySuggester::new(generator.clone());

    let err = suggester.suggest("   ").await.expect_err("blank input");
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}
