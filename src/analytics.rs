//! Pageview analytics helpers

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::model::PageCount;

/// Pages listed in the summary
pub const TOP_PAGES_LIMIT: usize = 10;

/// Hex chars kept from the address digest
const IP_HASH_LEN: usize = 32;

/// Count views per page: most viewed first, ties by page name
pub fn top_pages<'a, I>(pages: I, limit: usize) -> Vec<PageCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for page in pages {
        *counts.entry(page).or_insert(0) += 1;
    }

    let mut ranked: Vec<PageCount> = counts
        .into_iter()
        .map(|(page, views)| PageCount {
            page: page.to_string(),
            views,
        })
        .collect();
    ranked.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.page.cmp(&b.page)));
    ranked.truncate(limit);
    ranked
}

/// One-way digest of a client address; raw addresses are never stored
pub fn hash_ip(addr: &str) -> String {
    if addr.is_empty() {
        return String::new();
    }
    let digest = Sha256::digest(addr.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(IP_HASH_LEN);
    hex
}
