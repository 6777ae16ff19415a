//! Hint maps: associations from a build-time identifier (e.g. an import path)
//! to the repository URLs a build of that identifier needed.

use std::collections::{BTreeMap, HashSet};

/// Identifier to repository URLs. Ordered so persisted documents are stable.
pub type HintMap = BTreeMap<String, Vec<String>>;

/// Merge `update` into `target`, replacing the URL list of every identifier
/// present in `update`. Identifiers absent from `update` are left untouched.
pub fn overwrite(target: &mut HintMap, update: HintMap) {
    for (id, urls) in update {
        target.insert(id, urls);
    }
}

/// Remove duplicate URLs, keeping the first occurrence of each.
pub fn dedup_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for url in urls {
        let url = url.into();
        if seen.insert(url.clone()) {
            out.push(url);
        }
    }
    out
}

/// Associate every identifier in `ids` with the same list of `urls`.
pub fn associate(ids: &[String], urls: &[String]) -> HintMap {
    let urls = dedup_urls(urls.iter().cloned());
    ids.iter()
        .map(|id| (id.clone(), urls.clone()))
        .collect()
}

/// All URLs associated with any of `ids`, in identifier order, without duplicates.
pub fn lookup(map: &HintMap, ids: &[String]) -> Vec<String> {
    dedup_urls(
        ids.iter()
            .filter_map(|id| map.get(id))
            .flat_map(|urls| urls.iter().cloned()),
    )
}
