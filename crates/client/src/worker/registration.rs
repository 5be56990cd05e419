//! Registration: the single entry point for requests and deploys.
//!
//! Deploys are commands on a queue drained by one lifecycle task, so two
//! versions never install at once. Requests read the controller, clone the
//! worker handle and release the lock: a request started before a swap
//! finishes on the worker it started with.

use super::{Phase, Worker, WorkerSettings, passthrough};
use crate::fetch::Network;
use crate::request::Request;
use crate::strategy::Outcome;
use boitage_core::cache::GenerationInfo;
use boitage_core::{CacheDb, Error};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, oneshot};

const COMMAND_QUEUE_DEPTH: usize = 8;

type Controller = Arc<RwLock<Option<Arc<Worker>>>>;

/// Summary of a finished deploy.
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    pub version: String,
    pub generation: String,
    pub precached: usize,
    pub purged: Vec<String>,
}

/// Snapshot of the registration state.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub version: Option<String>,
    pub generation: Option<String>,
    pub phase: Option<Phase>,
    pub generations: Vec<GenerationInfo>,
}

enum Command {
    Deploy { version: String, reply: oneshot::Sender<Result<Deployment, Error>> },
    Purge { generation: String, reply: oneshot::Sender<Result<(), Error>> },
}

/// State owned by the lifecycle task.
struct Lifecycle {
    controller: Controller,
    settings: Arc<WorkerSettings>,
    db: CacheDb,
    network: Arc<dyn Network>,
}

impl Lifecycle {
    async fn run(self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Deploy { version, reply } => {
                    let result = self.deploy(&version).await;
                    if reply.send(result).is_err() {
                        tracing::debug!(version, "deploy finished after its caller went away");
                    }
                }
                Command::Purge { generation, reply } => {
                    let result = self.purge(&generation).await;
                    if reply.send(result).is_err() {
                        tracing::debug!(generation, "purge finished after its caller went away");
                    }
                }
            }
        }
        tracing::debug!("lifecycle queue closed");
    }

    async fn deploy(&self, version: &str) -> Result<Deployment, Error> {
        let worker =
            Arc::new(Worker::create(version, self.settings.clone(), self.db.clone(), self.network.clone()).await?);
        tracing::info!(version, generation = worker.generation().name(), "installing");

        let installed = worker.install().await;
        if let Err(e) = &installed {
            tracing::error!(version, error = %e, "install failed; activating anyway");
        }

        let purged = worker.activate(installed.is_ok()).await?;

        let previous = self.controller.write().await.replace(worker.clone());
        if let Some(previous) = previous
            && !Arc::ptr_eq(&previous, &worker)
        {
            previous.supersede();
        }

        let precached = installed?;
        Ok(Deployment {
            version: version.to_string(),
            generation: worker.generation().name().to_string(),
            precached,
            purged,
        })
    }

    async fn purge(&self, generation: &str) -> Result<(), Error> {
        if let Some(worker) = self.controller.read().await.as_ref()
            && worker.generation().name() == generation
        {
            return Err(Error::InvalidInput(format!("{generation} is the current generation")));
        }
        if !self.db.delete_generation(generation).await? {
            return Err(Error::CacheMiss(format!("generation {generation}")));
        }
        tracing::info!(generation, "purged");
        Ok(())
    }
}

/// Routes requests to the controlling worker and queues deploys.
pub struct Registration {
    controller: Controller,
    commands: mpsc::Sender<Command>,
    settings: Arc<WorkerSettings>,
    db: CacheDb,
    network: Arc<dyn Network>,
}

impl Registration {
    /// Start the lifecycle task and bring `version` into control.
    ///
    /// A version whose generation was already activated is resumed without
    /// touching the network. Otherwise it is installed and activated; an
    /// incomplete install is logged and the version serves anyway.
    ///
    /// # Errors
    ///
    /// Returns store errors and invalid settings. Manifest fetch failures
    /// are not returned here, see [`Registration::deploy`].
    pub async fn register(
        settings: WorkerSettings, version: &str, db: CacheDb, network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        let settings = Arc::new(settings);
        let controller: Controller = Arc::new(RwLock::new(None));
        let (commands, queue) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let lifecycle = Lifecycle {
            controller: controller.clone(),
            settings: settings.clone(),
            db: db.clone(),
            network: network.clone(),
        };
        tokio::spawn(lifecycle.run(queue));

        let registration = Self { controller, commands, settings, db, network };

        let generation = registration.settings.generation_name(version);
        if registration.db.activated_generation().await?.as_deref() == Some(generation.as_str()) {
            let worker = Worker::create(
                version,
                registration.settings.clone(),
                registration.db.clone(),
                registration.network.clone(),
            )
            .await?;
            worker.resume();
            *registration.controller.write().await = Some(Arc::new(worker));
            return Ok(registration);
        }

        match registration.deploy(version).await {
            Ok(_) => {}
            Err(e @ Error::ManifestFetchFailed { .. }) => {
                tracing::error!(version, error = %e, "initial install incomplete; it will be retried on next start");
            }
            Err(e) => return Err(e),
        }

        Ok(registration)
    }

    /// Install and activate a version, replacing the current controller.
    ///
    /// # Errors
    ///
    /// Returns `Error::ManifestFetchFailed` when precaching failed. The
    /// version has still been activated and is in control.
    pub async fn deploy(&self, version: &str) -> Result<Deployment, Error> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Deploy { version: version.to_string(), reply })
            .await
            .map_err(|_| Error::NotActive { version: version.to_string(), phase: "unregistered".into() })?;
        response
            .await
            .map_err(|_| Error::NotActive { version: version.to_string(), phase: "unregistered".into() })?
    }

    /// The worker currently in control.
    pub async fn controller(&self) -> Option<Arc<Worker>> {
        self.controller.read().await.clone()
    }

    /// Resolve a request through the controlling worker.
    ///
    /// Without a controller the request goes straight to the network.
    pub async fn fetch(&self, request: Request) -> Outcome {
        // One retry covers a controller swap between reading and handling.
        for _ in 0..2 {
            let Some(worker) = self.controller().await else {
                break;
            };
            match worker.handle(request.clone()).await {
                Ok(outcome) => return outcome,
                Err(e) => tracing::debug!(error = %e, "controller changed mid-request"),
            }
        }
        passthrough(self.network.as_ref(), &self.settings.scope, &request).await
    }

    /// Fetch a URL and return its body as text.
    ///
    /// # Errors
    ///
    /// Returns `Error::NetworkFailure` when nothing could be served and
    /// `Error::HttpError` for a non-OK status.
    pub async fn fetch_text(&self, url: &str) -> Result<String, Error> {
        let (response, source) = self.fetch(Request::get(url)).await.into_result()?;
        if !response.is_ok() {
            return Err(Error::HttpError(format!("{} returned status {} ({source})", url, response.status.as_u16())));
        }
        Ok(response.text())
    }

    /// Current version, phase and persisted generations.
    pub async fn status(&self) -> Result<Status, Error> {
        let worker = self.controller().await;
        Ok(Status {
            version: worker.as_ref().map(|w| w.version().to_string()),
            generation: worker.as_ref().map(|w| w.generation().name().to_string()),
            phase: worker.as_ref().map(|w| w.phase()),
            generations: self.db.generation_info().await?,
        })
    }

    /// Delete a generation other than the current one.
    ///
    /// Queued behind any pending deploy, so a generation being installed
    /// is current by the time the purge runs.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for the current generation and
    /// `Error::CacheMiss` when no such generation exists.
    pub async fn purge(&self, generation: &str) -> Result<(), Error> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Purge { generation: generation.to_string(), reply })
            .await
            .map_err(|_| Error::NotActive { version: generation.to_string(), phase: "unregistered".into() })?;
        response
            .await
            .map_err(|_| Error::NotActive { version: generation.to_string(), phase: "unregistered".into() })?
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }
}
