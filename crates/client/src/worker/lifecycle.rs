//! Install, activate and supersede transitions.

use super::{Phase, Worker};
use crate::fetch::CacheMode;
use crate::request::Request;
use boitage_core::{Error, RequestIdentity, StoredResponse};
use futures_util::future::try_join_all;

impl Worker {
    /// Precache the manifest into this worker's generation.
    ///
    /// All manifest URLs are fetched concurrently. Any transport failure or
    /// non-OK status fails the whole install and nothing is written.
    /// Returns the number of entries stored.
    pub async fn install(&self) -> Result<usize, Error> {
        let fetches = self.settings.manifest.iter().map(|entry| self.precache(entry));
        let entries = try_join_all(fetches).await?;
        let count = entries.len();

        self.generation.put_all(entries).await?;

        tracing::info!(version = %self.version, generation = self.generation.name(), entries = count, "installed");
        Ok(count)
    }

    async fn precache(&self, entry: &str) -> Result<(RequestIdentity, StoredResponse), Error> {
        let url = self
            .settings
            .scope
            .resolve(entry)
            .map_err(|e| Error::ManifestFetchFailed { url: entry.to_string(), reason: e.to_string() })?;

        let response = self
            .network
            .fetch(&Request::get(url.as_str()), CacheMode::NoStore)
            .await
            .map_err(|e| Error::ManifestFetchFailed { url: url.to_string(), reason: e.to_string() })?;

        if !response.is_ok() {
            return Err(Error::ManifestFetchFailed {
                url: url.to_string(),
                reason: format!("status {}", response.status.as_u16()),
            });
        }

        Ok((RequestIdentity::get(&url), response.to_stored()))
    }

    /// Purge every other generation and start serving.
    ///
    /// `complete` records whether install finished; only complete
    /// generations are marked activated, so an incomplete one is installed
    /// again on the next start. Returns the names of the purged generations.
    pub async fn activate(&self, complete: bool) -> Result<Vec<String>, Error> {
        if self.phase() == Phase::Superseded {
            return Err(Error::NotActive { version: self.version.clone(), phase: Phase::Superseded.to_string() });
        }

        // Restores the row if the generation was deleted while installing.
        self.db.open_generation(self.generation.name()).await?;

        let mut purged = Vec::new();
        for name in self.db.generations().await? {
            if name != self.generation.name() {
                self.db.delete_generation(&name).await?;
                purged.push(name);
            }
        }

        if complete {
            self.db.mark_activated(self.generation.name()).await?;
        }

        self.phase.send_replace(Phase::Active);
        tracing::info!(
            version = %self.version,
            generation = self.generation.name(),
            purged = purged.len(),
            complete,
            "activated"
        );
        Ok(purged)
    }

    /// Take an already activated generation back into service without refetching.
    pub(crate) fn resume(&self) {
        self.phase.send_replace(Phase::Active);
        tracing::info!(version = %self.version, generation = self.generation.name(), "resumed");
    }

    /// Retire this worker and cancel its pending revalidations.
    pub fn supersede(&self) {
        self.phase.send_replace(Phase::Superseded);
        self.abort_revalidations();
        tracing::debug!(version = %self.version, "superseded");
    }
}

#[cfg(test)]
mod tests {
    use super::super::WorkerSettings;
    use super::*;
    use crate::fetch::Network;
    use crate::origin::Scope;
    use crate::testing::{SCOPE, ScriptedNetwork};
    use boitage_core::CacheDb;
    use std::sync::Arc;
    use url::Url;

    fn settings(manifest: &[&str]) -> Arc<WorkerSettings> {
        Arc::new(WorkerSettings {
            scope: Scope::parse(SCOPE).unwrap(),
            cache_prefix: "boitage-tel".into(),
            manifest: manifest.iter().map(|s| s.to_string()).collect(),
            fallback_document: "./index.html".into(),
        })
    }

    fn id(path: &str) -> RequestIdentity {
        RequestIdentity::get(&Url::parse(&format!("{SCOPE}{path}")).unwrap())
    }

    async fn worker(db: &CacheDb, version: &str, manifest: &[&str], network: Arc<dyn Network>) -> Worker {
        Worker::create(version, settings(manifest), db.clone(), network).await.unwrap()
    }

    #[tokio::test]
    async fn test_install_stores_manifest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&format!("{SCOPE}index.html"), 200, "<html>home</html>");
        network.respond(&format!("{SCOPE}app.js"), 200, "app()");
        let worker = worker(&db, "v1", &["/app/index.html", "/app/app.js"], network.clone()).await;

        assert_eq!(worker.install().await.unwrap(), 2);

        let generation = worker.generation();
        assert_eq!(generation.match_request(&id("index.html")).await.unwrap().unwrap().body, b"<html>home</html>");
        assert_eq!(generation.match_request(&id("app.js")).await.unwrap().unwrap().body, b"app()");
        assert!(network.calls().iter().all(|c| c.cache == CacheMode::NoStore));
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&format!("{SCOPE}index.html"), 200, "home");
        network.fail(&format!("{SCOPE}app.js"));
        let worker = worker(&db, "v1", &["./index.html", "./app.js"], network).await;

        let result = worker.install().await;

        assert!(matches!(result, Err(Error::ManifestFetchFailed { ref url, .. }) if url.ends_with("app.js")));
        assert_eq!(worker.generation().entry_count().await.unwrap(), 0);
        assert_eq!(worker.phase(), Phase::Installing);
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&format!("{SCOPE}index.html"), 404, "gone");
        let worker = worker(&db, "v1", &["./index.html"], network).await;

        let result = worker.install().await;
        assert!(matches!(result, Err(Error::ManifestFetchFailed { ref reason, .. }) if reason == "status 404"));
    }

    #[tokio::test]
    async fn test_install_keys_by_full_query() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&format!("{SCOPE}app.js?v=1"), 200, "one");
        network.respond(&format!("{SCOPE}app.js?v=2"), 200, "two");
        let worker = worker(&db, "v1", &["./app.js?v=1", "./app.js?v=2"], network).await;

        worker.install().await.unwrap();

        let generation = worker.generation();
        assert_eq!(generation.match_request(&id("app.js?v=1")).await.unwrap().unwrap().body, b"one");
        assert_eq!(generation.match_request(&id("app.js?v=2")).await.unwrap().unwrap().body, b"two");
        assert!(generation.match_request(&id("app.js")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activate_purges_all_other_generations() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("boitage-tel-g1").await.unwrap();
        db.open_generation("boitage-tel-g2").await.unwrap();
        db.open_generation("unrelated-cache").await.unwrap();
        let worker = worker(&db, "current", &[], ScriptedNetwork::new()).await;

        let mut purged = worker.activate(true).await.unwrap();
        purged.sort();

        assert_eq!(purged, vec!["boitage-tel-g1", "boitage-tel-g2", "unrelated-cache"]);
        assert_eq!(db.generations().await.unwrap(), vec!["boitage-tel-current".to_string()]);
        assert_eq!(worker.phase(), Phase::Active);
        assert_eq!(db.activated_generation().await.unwrap(), Some("boitage-tel-current".to_string()));
    }

    #[tokio::test]
    async fn test_activate_recreates_deleted_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&format!("{SCOPE}app.js"), 200, "js");
        let worker = worker(&db, "v2", &["./app.js"], network).await;
        db.open_generation("boitage-tel-v1").await.unwrap();
        db.delete_generation("boitage-tel-v2").await.unwrap();

        assert!(worker.install().await.is_err());
        worker.activate(false).await.unwrap();

        assert_eq!(db.generations().await.unwrap(), vec!["boitage-tel-v2".to_string()]);
        worker.install().await.unwrap();
        assert_eq!(worker.generation().entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_activation_is_not_recorded() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = worker(&db, "partial", &[], ScriptedNetwork::new()).await;

        worker.activate(false).await.unwrap();

        assert_eq!(worker.phase(), Phase::Active);
        assert_eq!(db.activated_generation().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_superseded_worker_cannot_activate_or_serve() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = worker(&db, "v1", &[], ScriptedNetwork::new()).await;
        worker.activate(true).await.unwrap();

        worker.supersede();

        assert_eq!(worker.phase(), Phase::Superseded);
        assert!(matches!(worker.activate(true).await, Err(Error::NotActive { .. })));
        assert!(matches!(worker.handle(Request::get("./app.js")).await, Err(Error::NotActive { .. })));
    }
}
