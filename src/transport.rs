//! Transport abstraction over provider HTTP exchanges.
//!
//! Providers describe an exchange as a [`ProviderRequest`]; a [`Transport`]
//! carries it out. [`HttpTransport`] is the reqwest-backed implementation.

use std::future::Future;
use std::path::Path;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{MusicNetError, Result};

/// HTTP method of a provider exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Provider-neutral description of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Form-encoded body, for POST requests.
    pub form: Option<Vec<(String, String)>>,
}

impl ProviderRequest {
    /// A plain GET request.
    pub fn get<S: Into<String>>(url: S) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            form: None,
        }
    }

    /// A POST request with a form-encoded body.
    pub fn post_form<S: Into<String>>(url: S, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            form: Some(form),
        }
    }

    /// Add a request header.
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Carries out provider exchanges.
///
/// Implementations are cheap to clone; every query cycle owns its own clone.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Perform the exchange and return the raw response body.
    fn execute(&self, request: ProviderRequest) -> impl Future<Output = Result<Bytes>> + Send;

    /// Fetch `url` into `path`, returning the number of bytes written.
    fn download(&self, url: &str, path: &Path) -> impl Future<Output = Result<u64>> + Send {
        let request = ProviderRequest::get(url);
        let path = path.to_path_buf();
        async move {
            let bytes = self.execute(request).await?;
            tokio::fs::write(&path, &bytes).await?;
            Ok(bytes.len() as u64)
        }
    }
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport that identifies itself with `user_agent`.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| MusicNetError::Provider(format!("Failed to create client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: ProviderRequest) -> impl Future<Output = Result<Bytes>> + Send {
        async move {
            debug!("{:?} {}", request.method, request.url);

            let mut builder = match request.method {
                Method::Get => self.client.get(&request.url),
                Method::Post => self.client.post(&request.url),
            };
            for (key, value) in &request.headers {
                builder = builder.header(key.as_str(), value.as_str());
            }
            if let Some(form) = &request.form {
                builder = builder.form(form);
            }

            let response = builder.send().await?.error_for_status()?;
            Ok(response.bytes().await?)
        }
    }

    fn download(&self, url: &str, path: &Path) -> impl Future<Output = Result<u64>> + Send {
        async move {
            debug!("Downloading {} to {:?}", url, path);

            let response = self.client.get(url).send().await?.error_for_status()?;
            let mut file = tokio::fs::File::create(path).await?;
            let mut stream = response.bytes_stream();
            let mut written = 0u64;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;

            Ok(written)
        }
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! In-memory transport serving canned bodies keyed by URL fragment.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;

    #[derive(Clone)]
    enum Reply {
        Body(String),
        Fail(String),
    }

    #[derive(Clone, Default)]
    pub(crate) struct StubTransport {
        routes: Arc<Mutex<Vec<(String, Reply)>>>,
        holds: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
        requests: Arc<Mutex<Vec<ProviderRequest>>>,
    }

    impl StubTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Serve `body` to any request whose URL contains `fragment`.
        pub(crate) fn route(self, fragment: &str, body: &str) -> Self {
            self.routes
                .lock()
                .unwrap()
                .push((fragment.to_string(), Reply::Body(body.to_string())));
            self
        }

        /// Fail any request whose URL contains `fragment`.
        pub(crate) fn fail(self, fragment: &str, message: &str) -> Self {
            self.routes
                .lock()
                .unwrap()
                .push((fragment.to_string(), Reply::Fail(message.to_string())));
            self
        }

        /// Hold replies for `fragment` until the returned handle is notified.
        pub(crate) fn hold(&self, fragment: &str) -> Arc<Notify> {
            let notify = Arc::new(Notify::new());
            self.holds
                .lock()
                .unwrap()
                .insert(fragment.to_string(), notify.clone());
            notify
        }

        pub(crate) fn requests(&self) -> Vec<ProviderRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, request: ProviderRequest) -> impl Future<Output = Result<Bytes>> + Send {
            async move {
                self.requests.lock().unwrap().push(request.clone());

                let hold = self
                    .holds
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                    .map(|(_, notify)| notify.clone());
                if let Some(notify) = hold {
                    notify.notified().await;
                }

                let reply = self
                    .routes
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                    .map(|(_, reply)| reply.clone());

                match reply {
                    Some(Reply::Body(body)) => Ok(Bytes::from(body)),
                    Some(Reply::Fail(message)) => Err(MusicNetError::Provider(message)),
                    None => Err(MusicNetError::Provider(format!(
                        "no stub route for {}",
                        request.url
                    ))),
                }
            }
        }
    }
}
