use crate::config::Config;
use crate::digest::{self, DigestTriple};
use crate::reputation::{HostResolver, ListingResult, ReputationChecker, SystemResolver};
use bytes::Bytes;
use indymilter::{
    run, Actions, Callbacks, Config as IndyConfig, Context, ContextActions, EomContext, Status,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::UnixListener;

/// Milter that annotates each message with its iXhash digests and the
/// zones listing them. It never rejects; the MTA's filter decides.
pub struct Milter<R: HostResolver = SystemResolver> {
    checker: ReputationChecker<R>,
    zones: Arc<Vec<String>>,
    header_prefix: Arc<String>,
    max_body_bytes: usize,
}

/// Body collected for the message in progress.
#[derive(Debug, Default)]
pub struct MessageBody {
    bytes: Vec<u8>,
    oversized: bool,
}

impl MessageBody {
    /// Appends a chunk unless that would take the body past `limit` bytes.
    ///
    /// Past the limit the collected bytes are dropped and the body is
    /// marked oversized; later chunks are ignored.
    pub fn append(&mut self, chunk: &[u8], limit: usize) {
        if self.oversized {
            return;
        }
        if self.bytes.len() + chunk.len() > limit {
            log::info!(
                "Message body exceeds {} bytes - skipping iXhash digests",
                limit
            );
            self.oversized = true;
            self.bytes = Vec::new();
            return;
        }
        self.bytes.extend_from_slice(chunk);
    }

    pub fn is_oversized(&self) -> bool {
        self.oversized
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Milter<SystemResolver> {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let checker = ReputationChecker::from_system_conf()?.with_timeout(config.dns_timeout());
        Ok(Milter::with_checker(config, checker))
    }
}

impl<R: HostResolver> Milter<R> {
    pub fn with_checker(config: &Config, checker: ReputationChecker<R>) -> Self {
        Milter {
            checker,
            zones: Arc::new(config.zones.clone()),
            header_prefix: Arc::new(config.milter.header_prefix.clone()),
            max_body_bytes: config.milter.max_body_bytes,
        }
    }

    /// Digests a body and looks it up, returning the headers to add.
    pub async fn annotate(&self, body: &[u8]) -> Vec<(String, String)> {
        annotate(&self.checker, &self.zones, &self.header_prefix, body).await
    }

    pub async fn run(&self, socket_path: &str) -> anyhow::Result<()> {
        log::info!("Starting milter on: {}", socket_path);
        // Remove existing socket if it exists
        if std::path::Path::new(socket_path).exists() {
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;

        // Per-connection data is the body collected so far
        let checker = self.checker.clone();
        let zones = self.zones.clone();
        let header_prefix = self.header_prefix.clone();
        let max_body_bytes = self.max_body_bytes;
        let callbacks: Callbacks<MessageBody> = Callbacks::new()
            .on_body(move |ctx, body_chunk| {
                Box::pin(handle_body(ctx, body_chunk, max_body_bytes))
            })
            .on_eom(move |ctx| {
                Box::pin(handle_eom(
                    ctx,
                    checker.clone(),
                    zones.clone(),
                    header_prefix.clone(),
                ))
            })
            .on_abort(|ctx| Box::pin(handle_abort(ctx)));

        let config = IndyConfig {
            actions: Actions::ADD_HEADER,
            ..Default::default()
        };

        run(listener, callbacks, config, tokio::signal::ctrl_c()).await?;
        Ok(())
    }
}

async fn handle_body(ctx: &mut Context<MessageBody>, body_chunk: Bytes, limit: usize) -> Status {
    ctx.data
        .get_or_insert_with(MessageBody::default)
        .append(&body_chunk, limit);
    Status::Continue
}

async fn handle_eom<R: HostResolver>(
    ctx: &mut EomContext<MessageBody>,
    checker: ReputationChecker<R>,
    zones: Arc<Vec<String>>,
    header_prefix: Arc<String>,
) -> Status {
    let body = ctx.data.take().unwrap_or_default();
    if body.is_oversized() {
        return Status::Accept;
    }
    log::debug!("End of message - hashing {} body bytes", body.len());

    let headers = annotate(&checker, &zones, &header_prefix, &body.bytes).await;
    for (name, value) in headers {
        if let Err(e) = ctx.actions.add_header(name.clone(), value).await {
            log::error!("Failed to add header {}: {}", name, e);
        }
    }
    Status::Accept
}

async fn handle_abort(ctx: &mut Context<MessageBody>) -> Status {
    ctx.data = None;
    Status::Continue
}

async fn annotate<R: HostResolver>(
    checker: &ReputationChecker<R>,
    zones: &[String],
    header_prefix: &str,
    body: &[u8],
) -> Vec<(String, String)> {
    let triple = digest::all(body);
    let mut headers = vec![(format!("{header_prefix}-Digests"), triple.to_string())];

    if triple.is_empty() {
        log::info!("No iXhash digest could be computed for this message");
        return headers;
    }

    let results = checker.check(zones, &triple).await;
    headers.extend(
        listed_headers(&results)
            .into_iter()
            .map(|value| (format!("{header_prefix}-Listed"), value)),
    );
    log_outcome(&triple, &results);
    headers
}

/// One `<zone> <stage numbers>` value per zone with at least one hit.
fn listed_headers(results: &[ListingResult]) -> Vec<String> {
    let mut hits: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for result in results.iter().filter(|r| r.is_listed()) {
        hits.entry(result.zone.as_str())
            .or_default()
            .push(result.stage.to_string());
    }
    hits.into_iter()
        .map(|(zone, stages)| format!("{zone} {}", stages.join(",")))
        .collect()
}

fn log_outcome(triple: &DigestTriple, results: &[ListingResult]) {
    let listed = results.iter().filter(|r| r.is_listed()).count();
    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    log::info!(
        "iXhash digests {} - {} listed, {} lookups failed",
        triple,
        listed,
        failed
    );
}
