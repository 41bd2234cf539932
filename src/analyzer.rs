//! Backlink analyzer: recomputes domain authority from cross-domain backlinks.

use crate::storage::Storage;
use crate::url::{base_url, last_two_labels};
use std::collections::HashMap;
use tracing::{info, warn};

/// Runs one analyzer pass: dedupes IP/domain rows, zeroes every score, then
/// walks every backlink crediting the target domain unless it is same-domain
/// or same-registered-subdomain as the source.
pub fn run(storage: &mut impl Storage) -> crate::Result<()> {
    let removed = storage.remove_duplicate_ip_domains()?;
    if removed > 0 {
        info!(removed, "removed duplicate ip/domain rows before analysis");
    }

    storage.reset_domain_authority()?;

    let backlinks = storage.get_all_backlinks()?;
    let mut increments: HashMap<String, f64> = HashMap::new();

    for link in backlinks {
        let (source_base, target_base) = match (base_url(&link.source_url), base_url(&link.target_url)) {
            (Ok(s), Ok(t)) => (s, t),
            _ => continue,
        };

        if source_base == target_base {
            continue;
        }

        let source_host = source_base.rsplit("://").next().unwrap_or(&source_base);
        let target_host = target_base.rsplit("://").next().unwrap_or(&target_base);
        if last_two_labels(source_host) == last_two_labels(target_host) {
            continue;
        }

        match storage.get_ip_domain(&target_base)? {
            Some(_) => {
                *increments.entry(target_base).or_insert(0.0) += 1.0;
            }
            None => continue,
        }
    }

    for (domain, increment) in increments {
        let current = storage.get_domain_authority(&domain)?;
        if let Err(e) = storage.set_domain_authority(&domain, current + increment) {
            warn!(domain = %domain, error = %e, "failed to commit domain authority update");
        }
    }

    Ok(())
}
