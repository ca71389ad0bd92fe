//! Shared HTTP client for the inbound leg.
//!
//! Wraps a `reqwest::Client` with a TTL-based DNS cache and connection
//! ceilings (total and per host) enforced with semaphores.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::Url;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

/// Default size of a single local write: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Connection policy for remote resources.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Maximum silence between two body chunks before a download is
    /// considered stalled. There is no overall deadline.
    pub idle_read_timeout: Duration,
    /// Timeout for the HEAD probes used by validation and metadata lookup.
    pub probe_timeout: Duration,
    /// Concurrent connections across all hosts.
    pub max_connections: usize,
    /// Concurrent connections to a single host.
    pub max_connections_per_host: usize,
    /// How long resolved addresses are reused.
    pub dns_cache_ttl: Duration,
    /// Bytes buffered before each write to disk.
    pub chunk_size: usize,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            idle_read_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(30),
            max_connections: 100,
            max_connections_per_host: 30,
            dns_cache_ttl: Duration::from_secs(300),
            chunk_size: DEFAULT_CHUNK_SIZE,
            user_agent: concat!("linkrelay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP client used by validation, probing and downloading.
pub struct FetchClient {
    http: reqwest::Client,
    settings: HttpSettings,
    limiter: ConnectionLimiter,
}

impl FetchClient {
    /// Builds a client from the given connection policy.
    pub fn new(settings: HttpSettings) -> Result<Self, reqwest::Error> {
        let resolver = Arc::new(CachingResolver::new(settings.dns_cache_ttl));
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(settings.max_connections_per_host)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(settings.user_agent.clone())
            .dns_resolver(resolver)
            .build()?;

        let limiter = ConnectionLimiter::new(
            settings.max_connections,
            settings.max_connections_per_host,
        );

        Ok(Self {
            http,
            settings,
            limiter,
        })
    }

    /// Returns the connection policy.
    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Waits for a connection slot for the URL's host.
    pub(crate) async fn acquire(&self, url: &Url) -> ConnectionPermit {
        self.limiter.acquire(url.host_str().unwrap_or_default()).await
    }
}

/// Held for the lifetime of one request; releases both slots on drop.
pub(crate) struct ConnectionPermit {
    _host: Option<OwnedSemaphorePermit>,
    _total: Option<OwnedSemaphorePermit>,
}

struct ConnectionLimiter {
    total: Arc<Semaphore>,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
    per_host_limit: usize,
}

impl ConnectionLimiter {
    fn new(total: usize, per_host: usize) -> Self {
        Self {
            total: Arc::new(Semaphore::new(total.max(1))),
            per_host: Mutex::new(HashMap::new()),
            per_host_limit: per_host.max(1),
        }
    }

    async fn acquire(&self, host: &str) -> ConnectionPermit {
        let host_slots = {
            let mut map = self.per_host.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries no request is holding.
            map.retain(|_, sem| Arc::strong_count(sem) > 1);
            Arc::clone(
                map.entry(host.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit))),
            )
        };

        // Host slot first so a saturated host never parks global slots.
        // The semaphores are never closed, so `ok()` only guards the impossible case.
        let host_permit = host_slots.acquire_owned().await.ok();
        let total_permit = Arc::clone(&self.total).acquire_owned().await.ok();
        trace!(host, "connection slot acquired");

        ConnectionPermit {
            _host: host_permit,
            _total: total_permit,
        }
    }
}

struct CachedAddrs {
    addrs: Vec<SocketAddr>,
    resolved_at: Instant,
}

type DnsCache = Arc<Mutex<HashMap<String, CachedAddrs>>>;
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// DNS resolver that reuses lookups for a fixed TTL.
struct CachingResolver {
    ttl: Duration,
    cache: DnsCache,
}

impl CachingResolver {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Resolve for CachingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;

        Box::pin(async move {
            if let Some(addrs) = cached_lookup(&cache, &host, ttl, Instant::now()) {
                trace!(host = %host, "dns cache hit");
                let addrs: Addrs = Box::new(addrs.into_iter());
                return Ok::<Addrs, BoxError>(addrs);
            }

            let resolved: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();
            debug!(host = %host, count = resolved.len(), "resolved host");

            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    host,
                    CachedAddrs {
                        addrs: resolved.clone(),
                        resolved_at: Instant::now(),
                    },
                );

            let addrs: Addrs = Box::new(resolved.into_iter());
            Ok::<Addrs, BoxError>(addrs)
        })
    }
}

/// Returns cached addresses for `host` if they are younger than `ttl`.
fn cached_lookup(
    cache: &Mutex<HashMap<String, CachedAddrs>>,
    host: &str,
    ttl: Duration,
    now: Instant,
) -> Option<Vec<SocketAddr>> {
    let mut map = cache.lock().unwrap_or_else(PoisonError::into_inner);
    let fresh = map
        .get(host)
        .map(|entry| now.saturating_duration_since(entry.resolved_at) < ttl)?;

    if fresh {
        map.get(host).map(|entry| entry.addrs.clone())
    } else {
        map.remove(host);
        None
    }
}
