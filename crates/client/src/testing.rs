//! Scripted network used by the unit tests.

use crate::fetch::{CacheMode, Network};
use crate::request::{Request, Response};
use async_trait::async_trait;
use boitage_core::Error;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub(crate) const SCOPE: &str = "https://letters.example/app/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub method: Method,
    pub url: String,
    pub cache: CacheMode,
}

#[derive(Clone)]
enum Route {
    Respond { status: u16, body: String },
    Fail,
}

/// Answers from a table of routes; unknown URLs behave like being offline.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<Call>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Respond { status, body: body.to_string() });
    }

    pub fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Fail);
    }

    /// Drop every route: the network is now fully offline.
    pub fn go_offline(&self) {
        self.routes.lock().unwrap().clear();
    }

    /// Make later fetches wait until the returned semaphore gets permits.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.url == url).count()
    }
}

fn content_type(url: &str) -> &'static str {
    if url.ends_with(".html") || url.ends_with('/') {
        "text/html; charset=utf-8"
    } else if url.ends_with(".css") {
        "text/css"
    } else {
        "application/octet-stream"
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request, cache: CacheMode) -> Result<Response, Error> {
        self.calls
            .lock()
            .unwrap()
            .push(Call { method: request.method.clone(), url: request.url.clone(), cache });

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.map_err(|e| Error::NetworkFailure(e.to_string()))?.forget();
        }

        let route = self.routes.lock().unwrap().get(&request.url).cloned();
        match route {
            Some(Route::Respond { status, body }) => {
                let url = Url::parse(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type(&request.url)));
                Ok(Response {
                    url,
                    status: StatusCode::from_u16(status).map_err(|e| Error::HttpError(e.to_string()))?,
                    headers,
                    body: Bytes::from(body),
                })
            }
            Some(Route::Fail) | None => Err(Error::NetworkFailure(format!("offline: {}", request.url))),
        }
    }
}
