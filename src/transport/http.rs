//! SPARQL 1.1 protocol over HTTP.
//!
//! Queries and updates are POSTed form-encoded (`query=` / `update=`), the
//! way Fuseki and most stores accept them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};

use super::{update_accepted, Bindings, Transport, SPARQL_RESULTS_JSON};
use crate::config::StoreConfig;
use crate::{Error, Result};

/// Longest slice of an error body carried into the error message.
const ERROR_BODY_SNIPPET: usize = 200;

/// HTTP transport. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    query_endpoint: String,
    update_endpoint: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            query_endpoint: config.query_endpoint.clone(),
            update_endpoint: config.update_endpoint.clone(),
            timeout: config.timeout,
        })
    }

    fn send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Transport(format!("no answer within {:?}: {e}", self.timeout))
        } else if e.is_connect() {
            Error::Transport(format!("connection failed: {e}"))
        } else {
            Error::Transport(e.to_string())
        }
    }
}

async fn status_error(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(ERROR_BODY_SNIPPET).collect();
    Error::Protocol(format!("HTTP {status}: {snippet}"))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn select(&self, query: &str) -> Result<Bindings> {
        let response = self
            .client
            .post(&self.query_endpoint)
            .header(header::ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response.text().await.map_err(|e| self.send_error(e))?;
        Bindings::from_json(&body)
    }

    async fn update(&self, payload: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.update_endpoint)
            .form(&[("update", payload)])
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if update_accepted(response.status().as_u16()) {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}
