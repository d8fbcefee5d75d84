use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use ixhash::{all, HostResolver, LookupError, ReputationChecker, Resolution, SystemResolver};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

/// Resolver for a zone with no records at all.
struct EmptyZone;

impl HostResolver for EmptyZone {
    async fn resolve(&self, _host: &str) -> Resolution {
        Resolution::NoSuchHost
    }
}

/// Resolver whose upstream servers are unreachable.
struct Outage;

impl HostResolver for Outage {
    async fn resolve(&self, host: &str) -> Resolution {
        Resolution::Failed(format!("no connections available for {host}"))
    }
}

const DIGEST: &str = "5eb74156843818e24d5b0b97c94a04c0";

#[tokio::test]
async fn test_missing_record_is_not_listed() {
    let checker = ReputationChecker::new(EmptyZone);
    assert_eq!(checker.lookup("generic.ixhash.net", DIGEST).await, Ok(false));
}

#[tokio::test]
async fn test_outage_is_distinct_from_not_listed() {
    let checker = ReputationChecker::new(Outage);
    let result = checker.lookup("generic.ixhash.net", DIGEST).await;
    match result {
        Err(LookupError::Resolve(reason)) => assert!(reason.contains(DIGEST)),
        other => panic!("expected a resolution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_check_reports_every_pair() {
    let triple = all(include_bytes!("data/ixhash_sample.eml"));
    let zones = vec!["one.example".to_string(), "two.example".to_string()];

    let results = ReputationChecker::new(Outage).check(&zones, &triple).await;
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r.outcome.is_err() && !r.is_listed()));
}

const SERVFAIL: u8 = 2;
const NXDOMAIN: u8 = 3;
const REFUSED: u8 = 5;

/// Reply to `query` with no records and the given response code.
fn reply_with_rcode(query: &[u8], rcode: u8) -> Option<Vec<u8>> {
    if query.len() < 12 {
        return None;
    }
    // Skip the question name, then QTYPE and QCLASS
    let mut end = 12;
    loop {
        let len = *query.get(end)? as usize;
        end += 1;
        if len == 0 {
            break;
        }
        end += len;
    }
    end += 4;
    if end > query.len() {
        return None;
    }

    let mut reply = Vec::with_capacity(end);
    reply.extend_from_slice(&query[..2]);
    // QR set, opcode and RD echoed
    reply.push(0x80 | (query[2] & 0x79));
    // RA set
    reply.push(0x80 | (rcode & 0x0f));
    reply.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);
    reply.extend_from_slice(&query[12..end]);
    Some(reply)
}

/// Starts a name server on localhost that answers everything with `rcode`.
async fn fixed_rcode_server(rcode: u8) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            if let Some(reply) = reply_with_rcode(&buf[..len], rcode) {
                let _ = socket.send_to(&reply, peer).await;
            }
        }
    });
    addr
}

fn resolver_for(server: SocketAddr) -> SystemResolver {
    let config = ResolverConfig::from_parts(
        None,
        vec![],
        NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true),
    );
    let mut opts = ResolverOpts::default();
    opts.attempts = 1;
    opts.cache_size = 0;
    opts.timeout = Duration::from_secs(2);
    opts.use_hosts_file = false;
    SystemResolver::new(config, opts)
}

async fn lookup_against(rcode: u8) -> Result<bool, LookupError> {
    let server = fixed_rcode_server(rcode).await;
    ReputationChecker::new(resolver_for(server))
        .with_timeout(Duration::from_secs(5))
        .lookup("generic.ixhash.net", DIGEST)
        .await
}

#[tokio::test]
async fn test_server_failure_is_an_error() {
    match lookup_against(SERVFAIL).await {
        Err(LookupError::Resolve(_)) => {}
        other => panic!("SERVFAIL must be a resolution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refused_is_an_error() {
    match lookup_against(REFUSED).await {
        Err(LookupError::Resolve(_)) => {}
        other => panic!("REFUSED must be a resolution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nxdomain_is_not_listed() {
    assert_eq!(lookup_against(NXDOMAIN).await, Ok(false));
}

/// The reference digests are permanently listed on the public iXhash zone.
#[tokio::test]
#[ignore = "needs network access"]
async fn test_public_zone_lookup() {
    let checker = ReputationChecker::from_system_conf()
        .unwrap()
        .with_timeout(std::time::Duration::from_secs(10));
    let listed = checker
        .lookup("generic.ixhash.net", "cbdc00eaaf002aad4448b75f47a9784f")
        .await;
    assert_eq!(listed, Ok(true));
}
