//! Event dispatch.
//!
//! The host feeds the worker one [`Event`] at a time. [`Worker::plan`] is a
//! pure decision step that turns the event into an [`Action`];
//! [`Worker::execute`] carries the action out against store, queue and
//! network. [`Worker::dispatch`] does both.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use url::Url;

use tether_core::cache::request_key;
use tether_core::{AppConfig, CacheDb, CacheStore, Error, Method, NewSubmission, Request, Response, SubmissionQueue};

use crate::classify::{Category, classify};
use crate::fetch::{FetchClient, FetchConfig, Network, Scope, resolve};
use crate::lifecycle::{ActivationReport, InstallReport, Lifecycle, LifecycleEvent, WorkerState};
use crate::strategy::{Limits, StrategyEngine, placeholder};
use crate::sync::{self, DrainReport};

/// Something the host asks the worker to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Reconnect { tag: String },
}

/// How an intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Out of scope or a non-mutating non-GET: straight to the network.
    Passthrough,
    /// Mutating request: network, queued on failure.
    Mutation,
    Strategy(Category),
}

/// The decision taken for an event, before any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Install,
    Activate,
    Respond { route: Route, request: Request },
    Drain,
    Ignore { tag: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Responded(Response),
    Drained(DrainReport),
    Ignored,
}

/// Request interception and offline resilience for one deployed version.
pub struct Worker {
    scope: Scope,
    sync_tag: String,
    skip_waiting: bool,
    engine: StrategyEngine,
    lifecycle: Lifecycle,
    queue: Arc<dyn SubmissionQueue>,
    network: Arc<dyn Network>,
    drain_lock: Mutex<()>,
}

impl Worker {
    /// Build a worker from configuration and injected capabilities.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn CacheStore>,
        queue: Arc<dyn SubmissionQueue>,
        network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let namespaces = config.namespaces();

        let manifest = config
            .precache
            .iter()
            .map(|path| resolve(&origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        let mut engine = StrategyEngine::new(
            Arc::clone(&store),
            Arc::clone(&network),
            namespaces.clone(),
            Limits::from(config),
        );
        if let Some(page) = &config.offline_page {
            let url = resolve(&origin, page).map_err(|e| Error::InvalidUrl(format!("{page}: {e}")))?;
            engine = engine.with_offline_page(request_key(Method::Get, &url));
        }

        let lifecycle = Lifecycle::new(store, Arc::clone(&network), config.version(), namespaces.app_shell, manifest)
            .with_owner_prefix(config.owner_prefix.clone());

        Ok(Self {
            scope: Scope::new(origin, config.allowed_hosts.iter().cloned()),
            sync_tag: config.sync_tag.clone(),
            skip_waiting: config.skip_waiting,
            engine,
            lifecycle,
            queue,
            network,
            drain_lock: Mutex::new(()),
        })
    }

    /// Wire the SQLite store and queue and the reqwest client from configuration.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let db = Arc::new(CacheDb::open(&config.db_path).await?);
        let network = Arc::new(FetchClient::new(FetchConfig::from(config))?);
        tracing::info!(db = %config.db_path.display(), version = %config.version_tag, "worker opened");
        Self::new(config, db.clone(), db, network)
    }

    /// Decide what to do with an event. Performs no I/O.
    pub fn plan(&self, event: Event) -> Action {
        match event {
            Event::Install => Action::Install,
            Event::Activate => Action::Activate,
            Event::Fetch(request) => Action::Respond { route: self.route(&request), request },
            Event::Reconnect { tag } if tag == self.sync_tag => Action::Drain,
            Event::Reconnect { tag } => Action::Ignore { tag },
        }
    }

    /// Carry out a planned action.
    pub async fn execute(&self, action: Action) -> Result<Outcome, Error> {
        match action {
            Action::Install => self.on_install().await.map(Outcome::Installed),
            Action::Activate => self.on_activate().await.map(Outcome::Activated),
            Action::Respond { route, request } => self.respond(route, request).await.map(Outcome::Responded),
            Action::Drain => self.drain().await.map(Outcome::Drained),
            Action::Ignore { tag } => {
                tracing::debug!(%tag, "ignoring reconnect signal");
                Ok(Outcome::Ignored)
            }
        }
    }

    pub async fn dispatch(&self, event: Event) -> Result<Outcome, Error> {
        let action = self.plan(event);
        self.execute(action).await
    }

    /// Route a request; out-of-scope URLs are never cached or queued.
    pub fn route(&self, request: &Request) -> Route {
        if !self.scope.admits(&request.url) {
            Route::Passthrough
        } else if request.method.is_mutating() {
            Route::Mutation
        } else if request.method != Method::Get {
            Route::Passthrough
        } else {
            Route::Strategy(classify(request))
        }
    }

    /// Serve an intercepted request.
    pub async fn handle(&self, request: Request) -> Result<Response, Error> {
        let route = self.route(&request);
        self.respond(route, request).await
    }

    /// Install, then activate straight away when `skip_waiting` is set.
    ///
    /// A failed early activation does not undo the install: it is logged,
    /// published as `ActivationFailed`, and the worker stays `Installed`
    /// until the host sends `Activate`.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let report = self.lifecycle.install().await?;
        if self.skip_waiting
            && let Err(e) = self.lifecycle.activate().await
        {
            tracing::warn!(error = %e, "skip-waiting activation failed, waiting for activate");
        }
        Ok(report)
    }

    pub async fn on_activate(&self) -> Result<ActivationReport, Error> {
        self.lifecycle.activate().await
    }

    /// Drain the queue if `tag` is the configured sync tag.
    pub async fn on_reconnect(&self, tag: &str) -> Result<Option<DrainReport>, Error> {
        if tag != self.sync_tag {
            tracing::debug!(tag, "ignoring reconnect signal");
            return Ok(None);
        }
        self.drain().await.map(Some)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    async fn respond(&self, route: Route, request: Request) -> Result<Response, Error> {
        tracing::debug!(method = %request.method, url = %request.url, ?route, "intercepted");
        match route {
            Route::Passthrough => self.network.fetch(&request).await,
            Route::Mutation => self.mutate(&request).await,
            Route::Strategy(category) => self.engine.run(category, &request).await,
        }
    }

    /// Send a write; capture it for later replay when the origin is unreachable.
    async fn mutate(&self, request: &Request) -> Result<Response, Error> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_network() => {
                let pending = self.queue.enqueue(NewSubmission::from_request(request)).await?;
                tracing::info!(id = pending.id, url = %request.url, error = %e, "write queued for replay");
                Ok(placeholder::queued(pending.id))
            }
            Err(e) => Err(e),
        }
    }

    /// Concurrent reconnect signals drain one at a time.
    async fn drain(&self) -> Result<DrainReport, Error> {
        let _guard = self.drain_lock.lock().await;
        sync::drain(self.queue.as_ref(), self.network.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, FaultyStore};
    use tether_core::{MemoryQueue, MemoryStore};

    const ORIGIN: &str = "https://portfolio.example";

    struct Harness {
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        network: Arc<FakeNetwork>,
        worker: Worker,
    }

    fn config() -> AppConfig {
        AppConfig {
            origin: ORIGIN.into(),
            version_tag: "v2".into(),
            precache: vec!["/".into(), "/index.html".into()],
            ..Default::default()
        }
    }

    fn harness_with(config: AppConfig) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let network = Arc::new(FakeNetwork::new());
        for path in &config.precache {
            network.route(&format!("{ORIGIN}{path}"), Response::new(200, format!("shell {path}")));
        }
        let worker = Worker::new(&config, store.clone(), queue.clone(), network.clone()).unwrap();
        Harness { store, queue, network, worker }
    }

    fn harness() -> Harness {
        harness_with(config())
    }

    fn request(method: Method, path: &str) -> Request {
        Request::new(method, Url::parse(&format!("{ORIGIN}{path}")).unwrap())
    }

    #[test]
    fn test_new_rejects_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = Worker::new(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryQueue::new()),
            Arc::new(FakeNetwork::new()),
        );
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_plan_routes() {
        let h = harness();
        let html = request(Method::Get, "/about").with_header("Accept", "text/html");
        assert_eq!(
            h.worker.plan(Event::Fetch(html.clone())),
            Action::Respond { route: Route::Strategy(Category::Document), request: html }
        );

        let post = request(Method::Post, "/api/contact");
        assert!(matches!(h.worker.plan(Event::Fetch(post)), Action::Respond { route: Route::Mutation, .. }));

        let head = request(Method::Head, "/index.html");
        assert!(matches!(h.worker.plan(Event::Fetch(head)), Action::Respond { route: Route::Passthrough, .. }));

        let tracker = Request::get(Url::parse("https://tracker.example.net/pixel.gif").unwrap());
        assert!(matches!(h.worker.plan(Event::Fetch(tracker)), Action::Respond { route: Route::Passthrough, .. }));

        let font = Request::get(Url::parse("https://fonts.gstatic.com/s/inter.woff2").unwrap());
        assert!(matches!(
            h.worker.plan(Event::Fetch(font)),
            Action::Respond { route: Route::Strategy(Category::StaticAsset), .. }
        ));
    }

    #[test]
    fn test_plan_reconnect_tags() {
        let h = harness();
        assert_eq!(h.worker.plan(Event::Reconnect { tag: "pending-writes".into() }), Action::Drain);
        assert_eq!(
            h.worker.plan(Event::Reconnect { tag: "content-refresh".into() }),
            Action::Ignore { tag: "content-refresh".into() }
        );
        assert_eq!(h.worker.plan(Event::Install), Action::Install);
    }

    #[tokio::test]
    async fn test_passthrough_is_never_cached() {
        let h = harness();
        let url = "https://tracker.example.net/pixel.gif";
        h.network.route(url, Response::new(200, "GIF89a"));

        let resp = h.worker.handle(Request::get(Url::parse(url).unwrap())).await.unwrap();
        assert_eq!(resp.body.as_ref(), b"GIF89a");
        assert!(h.store.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_scope_write_is_not_queued() {
        let h = harness();
        h.network.set_offline(true);
        let req = Request::new(Method::Post, Url::parse("https://tracker.example.net/collect").unwrap());

        assert!(h.worker.handle(req).await.is_err());
        assert_eq!(h.queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mutation_offline_is_queued() {
        let h = harness();
        h.network.set_offline(true);
        let req = request(Method::Post, "/form/contact")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("name=Ada");

        let resp = h.worker.handle(req).await.unwrap();
        assert_eq!(resp.status, 202);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["queued"], true);

        let pending = h.queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(body["id"], pending[0].id);
        assert_eq!(pending[0].content_type.as_deref(), Some("application/x-www-form-urlencoded"));
        assert!(h.store.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_online_returns_origin_response() {
        let h = harness();
        h.network.route(&format!("{ORIGIN}/api/contact"), Response::new(422, "invalid"));

        let resp = h.worker.handle(request(Method::Post, "/api/contact")).await.unwrap();
        assert_eq!(resp.status, 422);
        assert_eq!(h.queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_write_then_reconnect_delivers() {
        let h = harness();
        h.network.set_offline(true);
        for path in ["/api/a", "/api/b", "/api/c"] {
            h.worker.handle(request(Method::Post, path)).await.unwrap();
        }
        assert_eq!(h.queue.len().await.unwrap(), 3);

        h.network.set_offline(false);
        for path in ["/api/a", "/api/b", "/api/c"] {
            h.network.route(&format!("{ORIGIN}{path}"), Response::new(200, "ok"));
        }

        assert_eq!(h.worker.on_reconnect("other-tag").await.unwrap(), None);
        assert_eq!(h.queue.len().await.unwrap(), 3);

        let report = h.worker.on_reconnect("pending-writes").await.unwrap().unwrap();
        assert_eq!(report, DrainReport { succeeded: 3, failed: 0 });

        let outcome = h.worker.dispatch(Event::Reconnect { tag: "pending-writes".into() }).await.unwrap();
        assert_eq!(outcome, Outcome::Drained(DrainReport::default()));
    }

    #[tokio::test]
    async fn test_install_then_activate_cleans_old_versions() {
        let h = harness();
        for ns in ["v1-static", "v1-dynamic"] {
            h.store.put(ns, "k", &Response::new(200, "old")).await.unwrap();
        }
        let mut events = h.worker.subscribe();

        let outcome = h.worker.dispatch(Event::Install).await.unwrap();
        let Outcome::Installed(report) = outcome else { panic!("expected install outcome") };
        assert_eq!(report.cached.len(), 2);
        assert!(matches!(events.recv().await.unwrap(), LifecycleEvent::Installed { .. }));

        let Outcome::Activated(report) = h.worker.dispatch(Event::Activate).await.unwrap() else {
            panic!("expected activation outcome")
        };
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(h.store.namespaces().await.unwrap(), vec!["v2-static"]);
        assert_eq!(h.worker.state().await, WorkerState::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_after_install() {
        let h = harness_with(AppConfig { skip_waiting: true, ..config() });
        h.worker.on_install().await.unwrap();
        assert_eq!(h.worker.state().await, WorkerState::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_activation_failure_keeps_install() {
        let config = AppConfig { skip_waiting: true, ..config() };
        let store = Arc::new(FaultyStore::new());
        store.fail_namespaces();
        let network = Arc::new(FakeNetwork::new());
        for path in &config.precache {
            network.route(&format!("{ORIGIN}{path}"), Response::new(200, "shell"));
        }
        let worker = Worker::new(&config, store.clone(), Arc::new(MemoryQueue::new()), network).unwrap();
        let mut events = worker.subscribe();

        let report = worker.on_install().await.unwrap();
        assert_eq!(report.cached.len(), 2);
        assert_eq!(worker.state().await, WorkerState::Installed);
        assert_eq!(store.keys("v2-static").await.unwrap().len(), 2);
        assert!(matches!(events.recv().await.unwrap(), LifecycleEvent::Installed { .. }));
        assert!(matches!(events.recv().await.unwrap(), LifecycleEvent::ActivationFailed { .. }));
    }

    #[tokio::test]
    async fn test_static_asset_cached_after_first_fetch() {
        let h = harness();
        h.worker.on_install().await.unwrap();
        h.network.set_offline(true);
        let calls = h.network.calls();

        let resp = h.worker.handle(request(Method::Get, "/js/app.js")).await;
        assert!(resp.is_err());

        h.network.set_offline(false);
        h.network.route(&format!("{ORIGIN}/js/app.js"), Response::new(200, "app()"));
        h.worker.handle(request(Method::Get, "/js/app.js")).await.unwrap();
        h.network.set_offline(true);

        let resp = h.worker.handle(request(Method::Get, "/js/app.js")).await.unwrap();
        assert_eq!(resp.body.as_ref(), b"app()");
        assert_eq!(h.network.calls(), calls + 2);
    }

    #[tokio::test]
    async fn test_offline_document_uses_configured_offline_page() {
        let config = AppConfig {
            precache: vec!["/".into(), "/offline.html".into()],
            offline_page: Some("/offline.html".into()),
            ..config()
        };
        let h = harness_with(config);
        h.worker.on_install().await.unwrap();
        h.network.set_offline(true);

        let req = request(Method::Get, "/projects/unknown").with_header("Accept", "text/html");
        let resp = h.worker.handle(req).await.unwrap();
        assert_eq!(resp.body.as_ref(), b"shell /offline.html");
    }

    #[tokio::test]
    async fn test_open_wires_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { db_path: dir.path().join("cache.sqlite"), ..config() };

        let worker = Worker::open(&config).await.unwrap();
        assert_eq!(worker.state().await, WorkerState::Parsed);
        assert_eq!(worker.on_reconnect("pending-writes").await.unwrap(), Some(DrainReport::default()));
    }
}
