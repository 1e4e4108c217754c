//! In-process tool-result cache.
//!
//! Entries are idempotent within their ttl, so concurrent writes to the same
//! key resolve last-write-wins and readers never need coordination beyond
//! the lock. Expired entries are reaped lazily on lookup.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::types::{ToolInvocation, ToolResult};

struct CacheEntry {
    result: ToolResult,
    expires_at: Instant,
}

#[derive(Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key: tool, user, channel, and the canonical sorted-parameter
    /// JSON — so `{a,b}` and `{b,a}` invocations share an entry.
    pub fn key(invocation: &ToolInvocation) -> String {
        let sorted: BTreeMap<&String, &serde_json::Value> = invocation.params.iter().collect();
        format!(
            "{}:{}:{}:{}",
            invocation.tool.as_str(),
            invocation.user_id,
            invocation.channel.as_str(),
            serde_json::to_string(&sorted).unwrap_or_default()
        )
    }

    /// A hit comes back with `cached = true`. Expired entries are removed.
    pub async fn get(&self, key: &str) -> Option<ToolResult> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    let mut result = entry.result.clone();
                    result.cached = true;
                    return Some(result);
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.entries.write().await.remove(key);
        }
        None
    }

    pub async fn put(&self, key: String, result: &ToolResult, ttl_secs: u64) {
        let entry = CacheEntry {
            result: result.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.entries.write().await.insert(key, entry);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
