//! IP scanner stage: sweeps configured IPv4 ranges looking for reachable,
//! Turkish-content web servers.

use crate::config::CrawlerConfig;
use crate::net::{build_http_client, fetch, FetchOutcome};
use crate::stages::StopFlag;
use crate::storage::{IpDomainRecord, SqliteStorage, Storage};
use crate::validate::validate;
use chrono::Utc;
use rand::seq::SliceRandom;
use reqwest::Client;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// An inclusive octet range, e.g. `(1, 254)`.
#[derive(Debug, Clone, Copy)]
pub struct OctetRange(pub u8, pub u8);

/// The IPv4 space to enumerate, one range per octet.
#[derive(Debug, Clone, Copy)]
pub struct IpRangeDescriptor {
    pub a: OctetRange,
    pub b: OctetRange,
    pub c: OctetRange,
    pub d: OctetRange,
}

/// A contiguous slice of the last octet, sharing the same `a.b.c` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpChunk {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d_start: u8,
    pub d_end: u8,
}

impl IpChunk {
    pub fn canonical_ip(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.a, self.b, self.c, self.d_start)
    }

    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (self.d_start..=self.d_end).map(move |d| Ipv4Addr::new(self.a, self.b, self.c, d))
    }
}

/// Splits `descriptor` into `chunk_size`-wide slices along the last octet.
/// `chunk_size` must divide 256 and lie in `[1, 256]`.
pub fn generate_chunks(descriptor: &IpRangeDescriptor, chunk_size: u32) -> Vec<IpChunk> {
    let mut chunks = Vec::new();
    for a in descriptor.a.0..=descriptor.a.1 {
        for b in descriptor.b.0..=descriptor.b.1 {
            for c in descriptor.c.0..=descriptor.c.1 {
                let mut d = descriptor.d.0;
                loop {
                    let d_end = d.saturating_add((chunk_size - 1) as u8).min(descriptor.d.1);
                    chunks.push(IpChunk { a, b, c, d_start: d, d_end });
                    if d_end >= descriptor.d.1 {
                        break;
                    }
                    d = d_end + 1;
                }
            }
        }
    }
    chunks
}

/// A reserved IPv4 block expressed as network address + prefix length.
#[derive(Debug, Clone, Copy)]
pub struct ReservedBlock {
    pub network: Ipv4Addr,
    pub prefix_len: u8,
}

impl ReservedBlock {
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        if self.prefix_len == 0 {
            return true;
        }
        let mask = u32::MAX << (32 - self.prefix_len);
        u32::from(self.network) & mask == u32::from(ip) & mask
    }
}

/// Always-reserved blocks, at minimum `0.0.0.0/8`.
pub fn default_reserved_blocks() -> Vec<ReservedBlock> {
    vec![ReservedBlock {
        network: Ipv4Addr::new(0, 0, 0, 0),
        prefix_len: 8,
    }]
}

pub fn is_reserved(ip: Ipv4Addr, blocks: &[ReservedBlock]) -> bool {
    blocks.iter().any(|b| b.contains(ip))
}

/// Distributes `chunks` across machines: a chunk belongs to this machine iff
/// `chunk_index mod total_machines == machine_id`.
pub fn chunks_for_machine(chunks: Vec<IpChunk>, machine_id: u32, total_machines: u32) -> crate::Result<Vec<IpChunk>> {
    if machine_id >= total_machines {
        return Err(crate::SumiError::InvalidMachineId {
            machine_id,
            total_machines,
        });
    }
    Ok(chunks
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i as u32 % total_machines == machine_id)
        .map(|(_, c)| c)
        .collect())
}

/// Splits `chunks` round-robin into `workers` disjoint slices, one per
/// parallel worker.
fn split_into_workers(chunks: Vec<IpChunk>, workers: usize) -> Vec<Vec<IpChunk>> {
    let workers = workers.max(1);
    let mut slices: Vec<Vec<IpChunk>> = vec![Vec::new(); workers];
    for (i, chunk) in chunks.into_iter().enumerate() {
        slices[i % workers].push(chunk);
    }
    slices
}

fn probe_url(ip: Ipv4Addr, port: u16) -> String {
    let scheme = if port == 443 { "https" } else { "http" };
    format!("{scheme}://{ip}:{port}")
}

/// Status codes the scanner accepts as a successful probe. Not part of the
/// configuration schema; the spec fixes the default and offers no override.
pub fn default_accepted_status_codes() -> Vec<u16> {
    vec![200]
}

/// Runs one scanner pass over `descriptor`.
///
/// The machine's assigned chunks are split round-robin into `parallelism`
/// disjoint slices, one per independently-spawned worker; each worker opens
/// its own connection to `db_path` and walks its slice of chunks
/// sequentially, honoring `stop` between chunks. Within a chunk, every
/// IP/port probe is gated by `Semaphore(max_workers.ip_search)` so the
/// network fan-out is bounded but concurrent.
pub async fn run(
    db_path: &Path,
    config: &CrawlerConfig,
    machine_id: u32,
    total_machines: u32,
    descriptor: &IpRangeDescriptor,
    reserved_blocks: &[ReservedBlock],
    stop: &StopFlag,
) -> crate::Result<()> {
    if 256 % config.chunk_size != 0 || config.chunk_size == 0 || config.chunk_size > 256 {
        return Err(crate::SumiError::InvalidChunkSize {
            chunk_size: config.chunk_size,
        });
    }

    let mut chunks = generate_chunks(descriptor, config.chunk_size);
    chunks.retain(|c| !is_reserved(c.canonical_ip(), reserved_blocks));
    let mut chunks = chunks_for_machine(chunks, machine_id, total_machines)?;

    if config.shuffle_chunks {
        chunks.shuffle(&mut rand::thread_rng());
    }

    let client = build_http_client(&config.user_agent, config.req_timeout)?;
    let semaphore = Arc::new(Semaphore::new(config.max_workers.ip_search.max(1)));
    let worker_slices = split_into_workers(chunks, config.parallelism as usize);

    let mut workers = JoinSet::new();
    for slice in worker_slices {
        let db_path = db_path.to_path_buf();
        let client = client.clone();
        let ports = config.ports.clone();
        let semaphore = semaphore.clone();
        let stop = stop.clone();
        workers.spawn(async move {
            let mut storage = SqliteStorage::new(&db_path)?;
            for chunk in slice {
                if stop.is_stopped() {
                    break;
                }
                scan_chunk(&mut storage, &client, &chunk, &ports, &semaphore).await;
            }
            Ok::<(), crate::SumiError>(())
        });
    }

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "ip scanner worker failed"),
            Err(e) => warn!(error = %e, "ip scanner worker panicked"),
        }
    }

    Ok(())
}

async fn scan_chunk(
    storage: &mut SqliteStorage,
    client: &Client,
    chunk: &IpChunk,
    ports: &[u16],
    semaphore: &Arc<Semaphore>,
) {
    let accepted_status_codes = default_accepted_status_codes();
    let mut probes = JoinSet::new();

    for ip in chunk.addresses() {
        for &port in ports {
            let client = client.clone();
            let accepted_status_codes = accepted_status_codes.clone();
            let semaphore = semaphore.clone();
            probes.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                probe_one(&client, ip, port, &accepted_status_codes).await
            });
        }
    }

    while let Some(joined) = probes.join_next().await {
        let Ok(Some((ip, response))) = joined else { continue };
        let domain = reverse_dns_lookup(ip).unwrap_or_else(|| response.url.clone());

        let record = IpDomainRecord {
            domain,
            ip: ip.to_string(),
            reserved: false,
            scanned_at: Some(Utc::now().to_rfc3339()),
            resolved_host: None,
        };

        if let Err(e) = storage.upsert_ip_domain(&record) {
            warn!(ip = %ip, error = %e, "failed to commit ip scan result");
        }
    }

    info!(canonical_ip = %chunk.canonical_ip(), "chunk scanned");
}

async fn probe_one(
    client: &Client,
    ip: Ipv4Addr,
    port: u16,
    accepted_status_codes: &[u16],
) -> Option<(Ipv4Addr, crate::net::UniformResponse)> {
    let url = probe_url(ip, port);
    let response = match fetch(client, &url).await {
        FetchOutcome::Success(r) => r,
        FetchOutcome::NetworkError(_) => return None,
    };

    if !validate(&response, accepted_status_codes).is_empty() {
        return None;
    }

    Some((ip, response))
}

/// Best-effort reverse DNS. The standard library and this crate's dependency
/// set have no PTR-record resolver, so this always reports unavailable; the
/// caller falls back to the response's final URL per the scanner's contract.
fn reverse_dns_lookup(_ip: Ipv4Addr) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_chunks_splits_last_octet_by_chunk_size() {
        let descriptor = IpRangeDescriptor {
            a: OctetRange(1, 1),
            b: OctetRange(1, 1),
            c: OctetRange(1, 1),
            d: OctetRange(0, 255),
        };
        let chunks = generate_chunks(&descriptor, 16);
        assert_eq!(chunks.len(), 16);
        assert_eq!(chunks[0].d_start, 0);
        assert_eq!(chunks[0].d_end, 15);
        assert_eq!(chunks[15].d_start, 240);
        assert_eq!(chunks[15].d_end, 255);
    }

    #[test]
    fn reserved_block_drops_0_0_0_0_8() {
        let blocks = default_reserved_blocks();
        assert!(is_reserved(Ipv4Addr::new(0, 1, 2, 3), &blocks));
        assert!(!is_reserved(Ipv4Addr::new(1, 2, 3, 4), &blocks));
    }

    #[test]
    fn chunks_for_machine_partitions_by_modulo() {
        let descriptor = IpRangeDescriptor {
            a: OctetRange(1, 1),
            b: OctetRange(1, 1),
            c: OctetRange(1, 1),
            d: OctetRange(0, 255),
        };
        let chunks = generate_chunks(&descriptor, 64);
        let mine = chunks_for_machine(chunks, 1, 2).unwrap();
        assert_eq!(mine.len(), 2);
    }

    #[test]
    fn machine_id_over_total_is_fatal() {
        let chunks = vec![];
        assert!(chunks_for_machine(chunks, 2, 2).is_err());
    }

    #[test]
    fn probe_url_uses_https_scheme_for_port_443() {
        assert_eq!(probe_url(Ipv4Addr::new(1, 1, 1, 1), 443), "https://1.1.1.1:443");
        assert_eq!(probe_url(Ipv4Addr::new(1, 1, 1, 1), 80), "http://1.1.1.1:80");
    }

    #[test]
    fn split_into_workers_distributes_round_robin_and_disjoint() {
        let descriptor = IpRangeDescriptor {
            a: OctetRange(1, 1),
            b: OctetRange(1, 1),
            c: OctetRange(1, 1),
            d: OctetRange(0, 255),
        };
        let chunks = generate_chunks(&descriptor, 32);
        let slices = split_into_workers(chunks.clone(), 3);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices.iter().map(|s| s.len()).sum::<usize>(), chunks.len());

        let mut seen = std::collections::HashSet::new();
        for slice in &slices {
            for chunk in slice {
                assert!(seen.insert(*chunk), "chunk assigned to more than one worker");
            }
        }
    }

    #[test]
    fn split_into_workers_handles_zero_workers_as_one() {
        let chunks = generate_chunks(
            &IpRangeDescriptor {
                a: OctetRange(1, 1),
                b: OctetRange(1, 1),
                c: OctetRange(1, 1),
                d: OctetRange(0, 255),
            },
            64,
        );
        let slices = split_into_workers(chunks.clone(), 0);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), chunks.len());
    }
}
