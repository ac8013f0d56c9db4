use std::cell::Cell;
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::signer::RequestSigner;
use super::{CloudError, CloudResult};

const NEXT_PAGE_HEADER: &str = "opc-next-page";
const REQUEST_ID_HEADER: &str = "opc-request-id";
const RETRY_TOKEN_HEADER: &str = "opc-retry-token";

/// Bounded retry with exponential backoff for transient failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Doubling delays from `base_delay`, capped at `max_delay`. The attempt
    /// count, not elapsed time, ends the retries.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verb {
    Get,
    Post,
    Delete,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        }
    }
}

struct Reply {
    status: u16,
    next_page: Option<String>,
    request_id: Option<String>,
    body: String,
}

/// List responses are either a bare JSON array (identity) or an `items`
/// collection (generative AI agents).
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Page<T> {
    Bare(Vec<T>),
    Collection { items: Vec<T> },
}

impl<T> Page<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Page::Bare(items) | Page::Collection { items } => items,
        }
    }
}

#[derive(serde::Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Signed JSON-over-HTTPS access to one OCI service endpoint.
pub struct HttpTransport {
    agent: ureq::Agent,
    signer: RequestSigner,
    endpoint: String,
    host: String,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(
        endpoint: &str,
        signer: RequestSigner,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let host = host_of(&endpoint)?;
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Ok(Self {
            agent,
            signer,
            endpoint,
            host,
            retry,
        })
    }

    pub(crate) fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> CloudResult<T> {
        let reply = self.execute(Verb::Get, operation, &path_with_query(path, query), None)?;
        decode(operation, &reply.body)
    }

    /// Follow `opc-next-page` until the listing is exhausted.
    pub(crate) fn list_all<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> CloudResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let mut params = query.to_vec();
            if let Some(token) = page.as_deref() {
                params.push(("page", token));
            }
            let reply = self.execute(Verb::Get, operation, &path_with_query(path, &params), None)?;
            let chunk: Page<T> = decode(operation, &reply.body)?;
            items.extend(chunk.into_items());
            match reply.next_page {
                Some(next) if !next.is_empty() => page = Some(next),
                _ => break,
            }
        }
        Ok(items)
    }

    pub(crate) fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> CloudResult<T> {
        let bytes = serde_json::to_vec(body).map_err(|source| CloudError::Decode {
            operation: operation.to_string(),
            source,
        })?;
        let reply = self.execute(Verb::Post, operation, path, Some(bytes.as_slice()))?;
        decode(operation, &reply.body)
    }

    pub(crate) fn delete(&self, operation: &str, path: &str) -> CloudResult<()> {
        self.execute(Verb::Delete, operation, path, None)?;
        Ok(())
    }

    fn execute(
        &self,
        verb: Verb,
        operation: &str,
        path_and_query: &str,
        body: Option<&[u8]>,
    ) -> CloudResult<Reply> {
        let retry_token = (verb == Verb::Post).then(|| uuid::Uuid::new_v4().to_string());
        let max_attempts = self.retry.max_attempts.max(1);
        let attempts = Cell::new(0u32);
        let result = backoff::retry_notify(
            self.retry.backoff(),
            || {
                let attempt = attempts.get() + 1;
                attempts.set(attempt);
                self.send(verb, operation, path_and_query, body, retry_token.as_deref())
                    .and_then(|reply| check_status(operation, reply))
                    .map_err(|err| {
                        if err.is_retryable() && attempt < max_attempts {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
            },
            |err: CloudError, delay: Duration| {
                let attempt = attempts.get();
                warn!(operation, attempt, ?delay, error = %err, "retrying request");
            },
        );
        result.map_err(|err| match err {
            backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
        })
    }

    fn send(
        &self,
        verb: Verb,
        operation: &str,
        path_and_query: &str,
        body: Option<&[u8]>,
        retry_token: Option<&str>,
    ) -> CloudResult<Reply> {
        let url = format!("{}{}", self.endpoint, path_and_query);
        let signed = self
            .signer
            .sign(verb.as_str(), &self.host, path_and_query, body);
        debug!(operation, method = verb.as_str(), %url, "sending request");

        let result = match verb {
            Verb::Post => {
                let (Some(bytes), Some(headers)) = (body, signed.body.as_ref()) else {
                    return Err(CloudError::Signing(format!("{operation}: POST without a body")));
                };
                self.agent
                    .post(&url)
                    .header("date", signed.date.as_str())
                    .header("authorization", signed.authorization.as_str())
                    .header("content-type", headers.content_type)
                    .header("x-content-sha256", headers.content_sha256.as_str())
                    .header(RETRY_TOKEN_HEADER, retry_token.unwrap_or_default())
                    .header("accept", "application/json")
                    .send(bytes)
            }
            Verb::Delete => self
                .agent
                .delete(&url)
                .header("date", signed.date.as_str())
                .header("authorization", signed.authorization.as_str())
                .header("accept", "application/json")
                .call(),
            Verb::Get => self
                .agent
                .get(&url)
                .header("date", signed.date.as_str())
                .header("authorization", signed.authorization.as_str())
                .header("accept", "application/json")
                .call(),
        };

        let transport = |source: ureq::Error| CloudError::Transport {
            operation: operation.to_string(),
            source: Box::new(source),
        };
        let mut response = result.map_err(transport)?;
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let status = response.status().as_u16();
        let next_page = header(NEXT_PAGE_HEADER);
        let request_id = header(REQUEST_ID_HEADER);
        let body = response.body_mut().read_to_string().map_err(transport)?;
        debug!(operation, status, request_id = request_id.as_deref(), "received response");
        Ok(Reply {
            status,
            next_page,
            request_id,
            body,
        })
    }
}

fn check_status(operation: &str, reply: Reply) -> CloudResult<Reply> {
    if (200..300).contains(&reply.status) {
        return Ok(reply);
    }
    let parsed: ErrorBody = serde_json::from_str(&reply.body).unwrap_or_default();
    Err(CloudError::Service {
        operation: operation.to_string(),
        status: reply.status,
        code: parsed.code,
        message: if parsed.message.is_empty() {
            reply.body
        } else {
            parsed.message
        },
        request_id: reply.request_id,
    })
}

fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> CloudResult<T> {
    serde_json::from_str(body).map_err(|source| CloudError::Decode {
        operation: operation.to_string(),
        source,
    })
}

pub(crate) fn path_with_query(path: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let pairs = query
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{pairs}")
}

pub(crate) fn encode_segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

fn host_of(endpoint: &str) -> anyhow::Result<String> {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .ok_or_else(|| anyhow::anyhow!("endpoint must start with http:// or https://: {endpoint}"))?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(anyhow::anyhow!("endpoint has no host: {endpoint}"));
    }
    Ok(host.to_string())
}
