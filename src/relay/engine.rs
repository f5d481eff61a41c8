//! Relay engine: performs the outbound call and drives the encoder.
//!
//! # State Machine
//! ```text
//! Idle → Connecting → HeadersSent → AwaitingStatus → StreamingBody → Completed
//!   └──────────┴────────────┴──────────────┴───────────────┴──→ Failed
//! ```
//!
//! # Design Decisions
//! - The only waits are connect, response head and body reads
//! - Output is flushed at each milestone: headers received, every pause of
//!   the upstream body, completion
//! - A pause is detected by polling for the next body frame once without
//!   waiting; only then is the reparse trigger emitted
//! - Connections are never kept idle, so nothing is reused across calls
//! - Every redirect hop must pass the same access policy as the first URL

use std::time::{Duration, Instant};

use futures_util::FutureExt;
use reqwest::redirect;
use thiserror::Error;

use crate::config::RelayConfig;
use crate::observability::metrics;
use crate::relay::decode::{split_chunks, BodyDecoder, MAX_CHUNK_CHARS};
use crate::relay::error::{FailureKind, RelayError, RelayFailure, SetupError};
use crate::relay::event::ResponseEvent;
use crate::relay::validator::{RequestCandidate, RequestValidator, ValidationError};
use crate::relay::writer::ScriptWriter;
use crate::security::headers::header_text;
use crate::security::{ForwardingPolicy, UrlPolicy};

/// How a relay operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream answered and its body was streamed to the end.
    Completed { status: u16 },
    /// A failure was reported in-band.
    Failed { kind: FailureKind },
}

impl RelayOutcome {
    /// Status the client object ends up with.
    pub fn status(&self) -> u16 {
        match self {
            RelayOutcome::Completed { status } => *status,
            RelayOutcome::Failed { kind } => kind.status(),
        }
    }
}

/// Shared, read-only relay machinery. One instance serves every request.
pub struct RelayEngine {
    validator: RequestValidator,
    forwarding: ForwardingPolicy,
    client: reqwest::Client,
}

/// Outbound client settings.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub max_redirects: usize,
}

impl RelayEngine {
    pub fn new(
        validator: RequestValidator,
        forwarding: ForwardingPolicy,
        options: &ClientOptions,
    ) -> Result<Self, SetupError> {
        let redirects = redirect_policy(validator.policy().clone(), options.max_redirects);

        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .referer(false)
            .redirect(redirects);
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            validator,
            forwarding,
            client: builder.build()?,
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, SetupError> {
        let relay = &config.relay;
        let validator = RequestValidator::new(
            UrlPolicy::from_config(relay.url_whitelist.as_deref())?,
            relay.require_data_type,
        );
        let forwarding = ForwardingPolicy::new(&relay.user_agent, &relay.extra_denied_headers)?;
        let options = ClientOptions {
            connect_timeout: config.timeouts.connect_secs.map(Duration::from_secs),
            request_timeout: config.timeouts.request_secs.map(Duration::from_secs),
            max_redirects: relay.max_redirects,
        };
        Self::new(validator, forwarding, &options)
    }

    /// Run one relay operation to completion.
    ///
    /// Never fails: problems are written to `out` as a failure report, and
    /// the output always ends with the DONE milestone.
    pub async fn relay(&self, candidate: RequestCandidate, out: &mut ScriptWriter) -> RelayOutcome {
        let start = Instant::now();

        let outcome = match self.perform(candidate, out).await {
            Ok(status) => RelayOutcome::Completed { status },
            Err(err) => {
                let failure = RelayFailure::from_error(&err);
                tracing::warn!(
                    category = %failure.category,
                    status = failure.kind.status(),
                    error = %err,
                    cause = ?failure.trace,
                    "Relay failed"
                );
                let kind = failure.kind;
                out.emit(&ResponseEvent::Failure(failure));
                RelayOutcome::Failed { kind }
            }
        };
        out.flush().await;

        let label = match outcome {
            RelayOutcome::Completed { .. } => "completed",
            RelayOutcome::Failed { kind: FailureKind::BadGateway } => "transport_error",
            RelayOutcome::Failed { .. } => "rejected",
        };
        metrics::record_relay(label, outcome.status(), start);

        tracing::info!(
            outcome = label,
            status = outcome.status(),
            bytes_out = out.bytes_written(),
            elapsed = ?start.elapsed(),
            "Relay finished"
        );
        outcome
    }

    async fn perform(
        &self,
        candidate: RequestCandidate,
        out: &mut ScriptWriter,
    ) -> Result<u16, RelayError> {
        let request = self.validator.validate(candidate)?;
        let headers = self.forwarding.outbound_headers(
            &request.client,
            &request.headers,
            request.content_type.as_deref(),
        )?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            headers = headers.len(),
            has_body = request.body.is_some(),
            "Sending upstream request"
        );

        let mut builder = self
            .client
            .request(request.method.to_http(), request.url)
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let mut response = builder.send().await.map_err(send_error)?;
        let status = response.status().as_u16();
        emit_head(&response, out);
        out.flush().await;

        if status != 200 {
            tracing::debug!(status, "Streaming upstream diagnostic body");
        }
        stream_body(&mut response, out).await?;
        Ok(status)
    }
}

/// A redirect pointed somewhere the access policy refuses.
#[derive(Debug, Error)]
#[error("redirect to {0} not allowed")]
struct RedirectDenied(String);

/// Follow at most `max` redirects, each to a URL the policy allows.
fn redirect_policy(policy: UrlPolicy, max: usize) -> redirect::Policy {
    if max == 0 {
        return redirect::Policy::none();
    }
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            let hops = attempt.previous().len();
            attempt.error(format!("too many redirects ({hops})"))
        } else if !policy.allows(attempt.url().as_str()) {
            let url = attempt.url().to_string();
            attempt.error(RedirectDenied(url))
        } else {
            attempt.follow()
        }
    })
}

/// A refused redirect is an access error, everything else is transport.
fn send_error(err: reqwest::Error) -> RelayError {
    let mut cause = std::error::Error::source(&err);
    while let Some(e) = cause {
        if let Some(denied) = e.downcast_ref::<RedirectDenied>() {
            return ValidationError::AccessDenied(denied.0.clone()).into();
        }
        cause = e.source();
    }
    RelayError::Transport(err)
}

/// Status line, every header, then the HEADERS_RECEIVED milestone.
fn emit_head(response: &reqwest::Response, out: &mut ScriptWriter) {
    out.emit(&ResponseEvent::StatusReceived {
        code: response.status().as_u16(),
        reason: reason_phrase(response),
    });

    let headers = response.headers();
    for name in headers.keys() {
        let value = headers
            .get_all(name)
            .iter()
            .map(header_text)
            .collect::<Vec<_>>()
            .join(", ");
        out.emit(&ResponseEvent::HeaderReceived {
            name: name.as_str().to_string(),
            value,
        });
    }

    out.emit(&ResponseEvent::HeadersComplete);
}

/// The reason phrase the server actually sent, or the canonical one.
fn reason_phrase(response: &reqwest::Response) -> String {
    if let Some(reason) = response.extensions().get::<hyper::ext::ReasonPhrase>() {
        return String::from_utf8_lossy(reason.as_bytes()).into_owned();
    }
    response
        .status()
        .canonical_reason()
        .unwrap_or_default()
        .to_string()
}

async fn stream_body(
    response: &mut reqwest::Response,
    out: &mut ScriptWriter,
) -> Result<(), RelayError> {
    let mut decoder = BodyDecoder::for_headers(response.headers());
    let mut started = false;
    // Text emitted since the last reparse trigger.
    let mut unparsed = false;
    let mut received: u64 = 0;

    let mut next = response.chunk().await?;
    while let Some(bytes) = next {
        received += bytes.len() as u64;
        let text = decoder.decode(&bytes).map_err(RelayError::Decode)?;
        unparsed |= emit_text(out, &text, &mut started).await;

        next = match response.chunk().now_or_never() {
            Some(ready) => ready?,
            None => {
                // Upstream paused: let the client catch up.
                if unparsed {
                    out.emit(&ResponseEvent::Reparse);
                    unparsed = false;
                }
                out.flush().await;
                response.chunk().await?
            }
        };
    }

    let tail = decoder.finish().map_err(RelayError::Decode)?;
    emit_text(out, &tail, &mut started).await;
    if started {
        out.emit(&ResponseEvent::Reparse);
    }
    out.emit(&ResponseEvent::StreamEnded);

    metrics::record_body_bytes(received);
    tracing::debug!(coding = ?decoder.coding(), bytes_in = received, "Upstream body complete");
    Ok(())
}

/// Emit decoded text as body chunks. Returns false when there was none.
async fn emit_text(out: &mut ScriptWriter, text: &str, started: &mut bool) -> bool {
    if text.is_empty() {
        return false;
    }
    if !*started {
        out.emit(&ResponseEvent::BodyStarted);
        out.flush().await;
        *started = true;
    }
    for piece in split_chunks(text, MAX_CHUNK_CHARS) {
        out.emit(&ResponseEvent::BodyChunk {
            text: piece.to_string(),
        });
    }
    true
}
