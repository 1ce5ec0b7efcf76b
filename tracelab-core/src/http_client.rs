use std::time::{Duration, Instant};

use http::header::USER_AGENT;
use http::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::config::HttpCfg;
use crate::error::{CoreResult, TraceLabError};

/// Request context carries the correlation id forwarded as a header.
#[derive(Clone, Copy, Default)]
pub struct RequestCtx<'a> {
    pub trace_id: Option<&'a str>,
}

/// Thin wrapper around reqwest::Client with defaults and helpers.
/// `service` labels every error this client produces ("ollama", "langfuse").
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
    service: String,
}

impl HttpClient {
    pub fn new(service: &str, cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.request_timeout_ms));
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder.build().map_err(|e| {
            TraceLabError::Other(anyhow::anyhow!("http client build failed: {e}"))
        })?;
        Ok(Self {
            inner,
            user_agent: format!("tracelab/{}", env!("CARGO_PKG_VERSION")),
            service: service.to_string(),
        })
    }

    pub fn new_default(service: &str) -> CoreResult<Self> {
        Self::new(service, &HttpCfg::default())
    }

    /// POST a JSON body and decode a JSON reply.
    /// Returns the decoded body and the latency in ms.
    pub async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<(R, u32)> {
        let start = Instant::now();
        let mut req = self
            .inner
            .post(url)
            .json(body)
            .header(USER_AGENT, &self.user_agent);

        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        if let Some(tid) = ctx.trace_id {
            req = req.header("X-Trace-Id", tid);
        }

        let resp = req.send().await.map_err(|e| {
            tracing::debug!(service = %self.service, url, error = %e, "request failed to send");
            TraceLabError::Unavailable {
                service: self.service.clone(),
                endpoint: url.to_string(),
            }
        })?;

        let latency = start.elapsed().as_millis() as u32;
        let status = resp.status();
        let headers = resp.headers().clone();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let ra = parse_retry_after(&headers);
            return Err(map_http_error(&self.service, url, status, ra, &text));
        }

        let parsed = resp
            .json::<R>()
            .await
            .map_err(|e| TraceLabError::Upstream {
                service: self.service.clone(),
                code: status.as_u16().to_string(),
                message: format!("json decode error: {e}"),
            })?;
        Ok((parsed, latency))
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    if let Some(v) = headers.get("retry-after")
        && let Ok(s) = v.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Some(secs);
    }
    // HTTP-date forms are ignored.
    None
}

fn map_http_error(
    service: &str,
    url: &str,
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> TraceLabError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => TraceLabError::RateLimited {
            service: service.to_string(),
            retry_after,
        },
        s if s.is_server_error() => TraceLabError::Unavailable {
            service: service.to_string(),
            endpoint: url.to_string(),
        },
        s => TraceLabError::Upstream {
            service: service.to_string(),
            code: s.as_u16().to_string(),
            message: truncate(body, 300),
        },
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut t = s[..end].to_string();
        t.push_str("...");
        t
    } else {
        s.to_string()
    }
}
