use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::digest::{DigestTriple, Stage};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("DNS resolution failed: {0}")]
    Resolve(String),
    #[error("DNS lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("Failed to create DNS resolver: {0}")]
    ResolverInit(String),
}

/// What the resolver said about a hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The name resolved to this many addresses.
    Addresses(usize),
    /// NXDOMAIN, or the name exists without address records.
    NoSuchHost,
    /// Anything else: server failure, refused, network trouble.
    Failed(String),
}

/// Name resolution seam; the production implementation is [`SystemResolver`].
pub trait HostResolver: Send + Sync + 'static {
    fn resolve(&self, host: &str) -> impl Future<Output = Resolution> + Send;
}

/// Resolver backed by hickory, normally built from `/etc/resolv.conf`.
pub struct SystemResolver {
    inner: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn from_system_conf() -> Result<Self, LookupError> {
        let inner = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| LookupError::ResolverInit(e.to_string()))?;
        Ok(SystemResolver { inner })
    }

    /// Resolver for explicit name servers instead of the system ones.
    pub fn new(config: ResolverConfig, opts: ResolverOpts) -> Self {
        SystemResolver {
            inner: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Resolution {
        match self.inner.lookup_ip(host).await {
            Ok(response) => Resolution::Addresses(response.iter().count()),
            Err(e) => match e.kind() {
                // hickory also reports SERVFAIL, REFUSED and friends as
                // NoRecordsFound; only NXDOMAIN and empty NOERROR mean absent
                ResolveErrorKind::NoRecordsFound { response_code, .. }
                    if is_negative_answer(*response_code) =>
                {
                    Resolution::NoSuchHost
                }
                _ => Resolution::Failed(e.to_string()),
            },
        }
    }
}

/// Response codes that say the name has no addresses.
fn is_negative_answer(code: ResponseCode) -> bool {
    matches!(code, ResponseCode::NXDomain | ResponseCode::NoError)
}

/// Hostname queried for `digest` in `zone`.
pub fn lookup_host(zone: &str, digest: &str) -> String {
    format!("{digest}.{}", zone.trim_end_matches('.'))
}

/// One (zone, stage) lookup and its outcome.
#[derive(Debug, Clone)]
pub struct ListingResult {
    pub zone: String,
    pub stage: Stage,
    pub digest: String,
    pub outcome: Result<bool, LookupError>,
}

impl ListingResult {
    pub fn is_listed(&self) -> bool {
        matches!(self.outcome, Ok(true))
    }
}

/// Checks digests against DNS reputation zones.
///
/// There is no retry and no caching. A deadline only applies when the
/// caller sets one with [`ReputationChecker::with_timeout`].
pub struct ReputationChecker<R: HostResolver = SystemResolver> {
    resolver: Arc<R>,
    timeout: Option<Duration>,
}

impl<R: HostResolver> Clone for ReputationChecker<R> {
    fn clone(&self) -> Self {
        ReputationChecker {
            resolver: Arc::clone(&self.resolver),
            timeout: self.timeout,
        }
    }
}

impl ReputationChecker<SystemResolver> {
    pub fn from_system_conf() -> Result<Self, LookupError> {
        Ok(Self::new(SystemResolver::from_system_conf()?))
    }
}

impl<R: HostResolver> ReputationChecker<R> {
    pub fn new(resolver: R) -> Self {
        ReputationChecker {
            resolver: Arc::new(resolver),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reports whether `digest` is listed in `zone`.
    ///
    /// `Ok(false)` only when the resolver says the name does not exist.
    /// Every other failure is an error and must not be read as "not listed".
    pub async fn lookup(&self, zone: &str, digest: &str) -> Result<bool, LookupError> {
        lookup_with(self.resolver.as_ref(), self.timeout, zone, digest).await
    }

    /// Looks up every computed digest of `triple` in every zone, concurrently.
    ///
    /// Results come back in zone order, then stage order.
    pub async fn check(&self, zones: &[String], triple: &DigestTriple) -> Vec<ListingResult> {
        let mut set = JoinSet::new();
        let mut slot = 0;
        for zone in zones {
            for (stage, digest) in triple.computed() {
                let resolver = Arc::clone(&self.resolver);
                let timeout = self.timeout;
                let zone = zone.clone();
                let digest = digest.to_string();
                let index = slot;
                set.spawn(async move {
                    let outcome = lookup_with(resolver.as_ref(), timeout, &zone, &digest).await;
                    (
                        index,
                        ListingResult {
                            zone,
                            stage,
                            digest,
                            outcome,
                        },
                    )
                });
                slot += 1;
            }
        }

        let mut results: Vec<(usize, ListingResult)> = Vec::with_capacity(slot);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => log::error!("Reputation lookup task failed: {e}"),
            }
        }
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

async fn lookup_with<R: HostResolver>(
    resolver: &R,
    timeout: Option<Duration>,
    zone: &str,
    digest: &str,
) -> Result<bool, LookupError> {
    if digest.is_empty() {
        return Err(LookupError::InvalidQuery("empty digest".to_string()));
    }
    if zone.trim_end_matches('.').is_empty() {
        return Err(LookupError::InvalidQuery("empty zone".to_string()));
    }

    let host = lookup_host(zone, digest);
    let resolution = match timeout {
        Some(limit) => match tokio::time::timeout(limit, resolver.resolve(&host)).await {
            Ok(resolution) => resolution,
            Err(_) => {
                log::warn!("DNS lookup timed out for {host} after {limit:?}");
                return Err(LookupError::Timeout(limit));
            }
        },
        None => resolver.resolve(&host).await,
    };

    match resolution {
        Resolution::Addresses(count) if count > 0 => {
            log::debug!("{host} is listed ({count} addresses)");
            Ok(true)
        }
        Resolution::Addresses(_) | Resolution::NoSuchHost => {
            log::debug!("{host} is not listed");
            Ok(false)
        }
        Resolution::Failed(reason) => {
            log::warn!("DNS lookup failed for {host}: {reason}");
            Err(LookupError::Resolve(reason))
        }
    }
}
