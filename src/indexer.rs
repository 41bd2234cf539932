//! Indexer: wipes and rebuilds the inverted document index.

use crate::extract::{aggregate_tokens, default_tag_weights, tokenize};
use crate::storage::{DocumentIndexRecord, Storage};
use tracing::{info, warn};

/// Wipes `DocumentIndex` and rebuilds it from every page with a non-null
/// body, committing after each page.
pub fn run(storage: &mut impl Storage, max_document_length: usize) -> crate::Result<()> {
    storage.clear_document_index()?;

    let pages = storage.all_page_urls_with_body()?;
    info!(page_count = pages.len(), "indexer pass starting");

    let tag_weights = default_tag_weights();
    for (url, body) in pages {
        let text = String::from_utf8_lossy(&body).into_owned();
        let tokens = tokenize(&text, &tag_weights, max_document_length);
        let (frequency, details) = aggregate_tokens(&tokens);

        let mut rows = Vec::new();
        for (word, occurrences) in details {
            let freq = frequency.get(&word).copied().unwrap_or(0);
            for (location, tag) in occurrences {
                rows.push(DocumentIndexRecord {
                    document_url: url.clone(),
                    word: word.clone(),
                    location: location as u64,
                    tag,
                    frequency: freq,
                });
            }
        }

        if let Err(e) = storage.insert_document_index_rows(&rows) {
            warn!(url = %url, error = %e, "failed to commit document index rows");
        }
    }

    Ok(())
}
