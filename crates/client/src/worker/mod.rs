//! Worker lifecycle: `Installing → Active → Superseded`.
//!
//! A [`Worker`] owns one version label and its cache generation. It only
//! handles requests while `Active`. The [`Registration`] serializes deploys
//! through a command queue and routes every request to the worker currently
//! in control.

mod lifecycle;
mod registration;

pub use registration::{Deployment, Registration, Status};

use crate::classify::{RequestClass, classify};
use crate::fetch::{CacheMode, Network};
use crate::origin::{OriginClass, Scope};
use crate::request::Request;
use crate::strategy::{Outcome, Revalidator, Source, cache_first, network_first};
use boitage_core::{AppConfig, CacheDb, Error, Generation, RequestIdentity};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// Lifecycle phase of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Generation created, manifest being precached. Not serving yet.
    Installing,
    /// In control and serving requests.
    Active,
    /// Replaced by a newer version. Never serves again.
    Superseded,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Installing => "installing",
            Phase::Active => "active",
            Phase::Superseded => "superseded",
        };
        f.write_str(name)
    }
}

/// Static settings shared by every worker of a registration.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub scope: Scope,
    pub cache_prefix: String,
    /// Scope-relative URLs precached on install, in order.
    pub manifest: Vec<String>,
    /// Scope-relative URL of the home document.
    pub fallback_document: String,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self {
            scope: Scope::parse(&config.scope)?,
            cache_prefix: config.cache_prefix.clone(),
            manifest: config.manifest.clone(),
            fallback_document: config.fallback_document.clone(),
        })
    }

    pub fn generation_name(&self, version: &str) -> String {
        format!("{}-{}", self.cache_prefix, version)
    }
}

/// Routing decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Interception {
    Bypass,
    Html(Url),
    Asset(Url),
}

/// One deployed version and its cache generation.
pub struct Worker {
    version: String,
    settings: Arc<WorkerSettings>,
    db: CacheDb,
    generation: Generation,
    fallback: RequestIdentity,
    network: Arc<dyn Network>,
    phase: watch::Sender<Phase>,
    revalidator: Revalidator,
}

impl Worker {
    /// Create a worker for `version`, opening (creating) its generation.
    pub async fn create(
        version: &str, settings: Arc<WorkerSettings>, db: CacheDb, network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        let fallback = settings
            .scope
            .resolve(&settings.fallback_document)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", settings.fallback_document)))?;
        let generation = db.open_generation(&settings.generation_name(version)).await?;
        let (phase, _) = watch::channel(Phase::Installing);

        Ok(Self {
            version: version.to_string(),
            fallback: RequestIdentity::get(&fallback),
            settings,
            db,
            generation,
            network,
            phase,
            revalidator: Revalidator::new(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Wait for every background revalidation spawned so far.
    pub async fn settle(&self) {
        self.revalidator.settle().await;
    }

    /// Cancel pending background revalidations. Served responses are unaffected.
    pub fn abort_revalidations(&self) {
        self.revalidator.abort_all();
    }

    /// Handle one request.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotActive` outside of the `Active` phase. Every other
    /// failure is folded into the returned [`Outcome`].
    pub async fn handle(&self, request: Request) -> Result<Outcome, Error> {
        let phase = self.phase();
        if phase != Phase::Active {
            return Err(Error::NotActive { version: self.version.clone(), phase: phase.to_string() });
        }

        let outcome = match self.intercept(&request) {
            Interception::Bypass => passthrough(self.network.as_ref(), &self.settings.scope, &request).await,
            Interception::Html(url) => {
                let identity = RequestIdentity::get(&url);
                network_first::respond(
                    self.network.as_ref(),
                    &self.generation,
                    &request.with_url(&url),
                    &identity,
                    &self.fallback,
                )
                .await
            }
            Interception::Asset(url) => {
                let identity = RequestIdentity::get(&url);
                cache_first::respond(&self.network, &self.generation, &self.revalidator, &request.with_url(&url), &identity)
                    .await
            }
        };

        Ok(outcome)
    }

    fn intercept(&self, request: &Request) -> Interception {
        if request.method != Method::GET {
            return Interception::Bypass;
        }
        let OriginClass::SameOrigin(url) = self.settings.scope.classify(&request.url) else {
            return Interception::Bypass;
        };
        match classify(request) {
            RequestClass::Html => Interception::Html(url),
            RequestClass::Asset => Interception::Asset(url),
        }
    }
}

/// Fetch a request the worker does not intercept: no cache reads or writes.
pub(crate) async fn passthrough(network: &dyn Network, scope: &Scope, request: &Request) -> Outcome {
    let request = match scope.resolve(&request.url) {
        Ok(url) => request.with_url(&url),
        Err(_) => request.clone(),
    };
    match network.fetch(&request, CacheMode::Default).await {
        Ok(response) => Outcome::served(response, Source::Passthrough),
        Err(e) => Outcome::NetworkError(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SCOPE, ScriptedNetwork};
    use reqwest::header::{ACCEPT, HeaderValue};

    fn settings(manifest: &[&str]) -> Arc<WorkerSettings> {
        Arc::new(WorkerSettings {
            scope: Scope::parse(SCOPE).unwrap(),
            cache_prefix: "boitage-tel".into(),
            manifest: manifest.iter().map(|s| s.to_string()).collect(),
            fallback_document: "./index.html".into(),
        })
    }

    fn url(path: &str) -> String {
        format!("{SCOPE}{path}")
    }

    async fn active_worker(db: &CacheDb, network: Arc<ScriptedNetwork>, manifest: &[&str]) -> Worker {
        let worker = Worker::create("v1", settings(manifest), db.clone(), network).await.unwrap();
        worker.install().await.unwrap();
        worker.activate(true).await.unwrap();
        worker
    }

    #[test]
    fn test_settings_from_config() {
        let settings = WorkerSettings::from_config(&AppConfig::default()).unwrap();
        assert_eq!(settings.scope.base().as_str(), "http://localhost:8080/");
        assert_eq!(settings.generation_name("2025.10.19-01"), "boitage-tel-2025.10.19-01");
        assert_eq!(settings.manifest.len(), 17);
    }

    #[tokio::test]
    async fn test_installing_worker_rejects_requests() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::create("v1", settings(&[]), db, ScriptedNetwork::new()).await.unwrap();

        let result = worker.handle(Request::get(url("app.js"))).await;
        assert!(matches!(result, Err(Error::NotActive { phase, .. }) if phase == "installing"));
    }

    #[tokio::test]
    async fn test_cross_origin_bypasses_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        let worker = active_worker(&db, network.clone(), &[]).await;
        let cdn = "https://cdn.example/html2pdf.bundle.min.js";
        network.respond(cdn, 200, "lib");

        let outcome = worker.handle(Request::get(cdn)).await.unwrap();

        assert_eq!(outcome.source(), Some(Source::Passthrough));
        assert_eq!(outcome.response().unwrap().text(), "lib");
        assert_eq!(worker.generation().entry_count().await.unwrap(), 0);
        worker.settle().await;
        assert_eq!(network.count(cdn), 1);
    }

    #[tokio::test]
    async fn test_cross_origin_failure_is_network_error_without_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        let worker = active_worker(&db, network.clone(), &["./index.html"]).await;
        network.respond(&url("index.html"), 200, "home");

        let outcome = worker.handle(Request::navigate("https://elsewhere.example/")).await.unwrap();
        assert!(matches!(outcome, Outcome::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_non_get_never_touches_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&url("index.html"), 200, "home");
        let worker = active_worker(&db, network.clone(), &["./index.html"]).await;
        network.go_offline();
        let before = worker.generation().entry_count().await.unwrap();

        for method in [Method::POST, Method::PUT, Method::DELETE] {
            let request = Request::new(method, url("index.html"))
                .with_header(ACCEPT, HeaderValue::from_static("text/html"));
            let outcome = worker.handle(request).await.unwrap();
            assert!(matches!(outcome, Outcome::NetworkError(_)));
        }

        network.respond(&url("index.html"), 200, "posted");
        let outcome = worker.handle(Request::new(Method::POST, "./index.html")).await.unwrap();
        assert_eq!(outcome.source(), Some(Source::Passthrough));
        assert_eq!(worker.generation().entry_count().await.unwrap(), before);
        let cached = worker
            .generation()
            .match_request(&RequestIdentity::get(&Url::parse(&url("index.html")).unwrap()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.body, b"home");
        let last = network.calls().pop().unwrap();
        assert_eq!(last.method, Method::POST);
        assert_eq!(last.url, url("index.html"));
    }

    #[tokio::test]
    async fn test_navigation_offline_returns_prior_copy() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&url("index.html"), 200, "installed home");
        let worker = active_worker(&db, network.clone(), &["./index.html"]).await;
        network.go_offline();

        let outcome = worker.handle(Request::navigate("./index.html")).await.unwrap();

        assert_eq!(outcome.source(), Some(Source::Cache));
        assert_eq!(outcome.response().unwrap().text(), "installed home");
    }

    #[tokio::test]
    async fn test_unknown_navigation_offline_falls_back_to_home() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&url("index.html"), 200, "installed home");
        let worker = active_worker(&db, network.clone(), &["./index.html"]).await;
        network.go_offline();

        let outcome = worker.handle(Request::navigate("./letter_rurale.html?nom=Durand")).await.unwrap();

        assert_eq!(outcome.source(), Some(Source::Fallback));
        assert_eq!(outcome.response().unwrap().text(), "installed home");
    }

    #[tokio::test]
    async fn test_html_online_updates_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&url("index.html"), 200, "v1 home");
        let worker = active_worker(&db, network.clone(), &["./index.html"]).await;
        network.respond(&url("index.html"), 200, "v2 home");

        let outcome = worker.handle(Request::navigate(url("index.html"))).await.unwrap();

        assert_eq!(outcome.source(), Some(Source::Network));
        assert_eq!(outcome.response().unwrap().text(), "v2 home");
        let stored = worker
            .generation()
            .match_request(&RequestIdentity::get(&Url::parse(&url("index.html")).unwrap()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body, b"v2 home");
    }

    #[tokio::test]
    async fn test_asset_fetch_is_cache_first_and_revalidates() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&url("styles.css?v=7"), 200, "old css");
        let worker = active_worker(&db, network.clone(), &["./styles.css?v=7"]).await;
        network.respond(&url("styles.css?v=7"), 200, "new css");

        let first = worker.handle(Request::get("./styles.css?v=7")).await.unwrap();
        assert_eq!(first.source(), Some(Source::Cache));
        assert_eq!(first.response().unwrap().text(), "old css");

        worker.settle().await;

        let second = worker.handle(Request::get("./styles.css?v=7")).await.unwrap();
        assert_eq!(second.source(), Some(Source::Cache));
        assert_eq!(second.response().unwrap().text(), "new css");
        worker.settle().await;
    }

    #[tokio::test]
    async fn test_aborted_revalidation_keeps_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&url("app.js"), 200, "old js");
        let worker = active_worker(&db, network.clone(), &["./app.js"]).await;
        network.respond(&url("app.js"), 200, "new js");
        let _gate = network.hold();

        let outcome = worker.handle(Request::get("./app.js")).await.unwrap();
        assert_eq!(outcome.response().unwrap().text(), "old js");

        worker.abort_revalidations();
        worker.settle().await;

        let identity = RequestIdentity::get(&Url::parse(&url("app.js")).unwrap());
        let stored = worker.generation().match_request(&identity).await.unwrap().unwrap();
        assert_eq!(stored.body, b"old js");
    }

    #[tokio::test]
    async fn test_fragment_does_not_split_identity() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&url("app.js"), 200, "js");
        let worker = active_worker(&db, network.clone(), &["./app.js"]).await;
        network.go_offline();

        let outcome = worker.handle(Request::get("./app.js#main")).await.unwrap();
        assert_eq!(outcome.source(), Some(Source::Cache));
        worker.settle().await;
    }
}
