use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{records_to_value, Record, RecordFilter, RecordId, RequestKey};
use crate::storage::{seed, Collection, PersistentMirror, ResponseCache};

/// Where the value returned by an operation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Network,
    Cache,
    Mirror,
    Seed,
    /// A write recorded only in the local mirror.
    LocalWrite,
    /// Nothing had data; the caller got an empty collection.
    Empty,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataOrigin::Network => "network",
            DataOrigin::Cache => "cache",
            DataOrigin::Mirror => "mirror",
            DataOrigin::Seed => "seed",
            DataOrigin::LocalWrite => "local-write",
            DataOrigin::Empty => "empty",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub origin: DataOrigin,
}

/// Which records a local source should hand back.
#[derive(Debug, Clone)]
pub enum Selector {
    All(RecordFilter),
    ById(RecordId),
}

impl Selector {
    fn select(&self, records: &[Record]) -> Option<Value> {
        match self {
            Selector::All(filter) => Some(records_to_value(&filter.apply(records))),
            Selector::ById(id) => records
                .iter()
                .find(|r| r.has_id(id))
                .cloned()
                .map(Record::into_value),
        }
    }
}

/// One rung of the fallback ladder. `lookup` returns `None` when the source
/// has nothing for the request, passing the call to the next rung.
#[async_trait]
pub trait FallbackSource: Send + Sync {
    fn origin(&self) -> DataOrigin;
    async fn lookup(&self) -> Option<Value>;
}

pub struct CacheSource<'a> {
    pub cache: &'a ResponseCache,
    pub key: &'a RequestKey,
}

#[async_trait]
impl<'a> FallbackSource for CacheSource<'a> {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Cache
    }

    async fn lookup(&self) -> Option<Value> {
        self.cache.get(self.key)
    }
}

/// Answers whenever the mirror holds anything for the collection, even if
/// the selector matches nothing, so seed data never masks local records.
pub struct MirrorSource<'a> {
    pub mirror: &'a PersistentMirror,
    pub collection: Collection,
    pub selector: Selector,
}

#[async_trait]
impl<'a> FallbackSource for MirrorSource<'a> {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Mirror
    }

    async fn lookup(&self) -> Option<Value> {
        let records = self.mirror.load(self.collection).await;
        if records.is_empty() {
            return None;
        }
        self.selector.select(&records)
    }
}

/// Seed records minus ids deleted locally.
pub struct SeedSource {
    pub collection: Collection,
    pub selector: Selector,
    pub hidden: Vec<RecordId>,
}

#[async_trait]
impl FallbackSource for SeedSource {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Seed
    }

    async fn lookup(&self) -> Option<Value> {
        let records: Vec<Record> = seed::seed(self.collection)
            .into_iter()
            .filter(|r| !r.id().is_some_and(|id| self.hidden.contains(&id)))
            .collect();
        self.selector.select(&records)
    }
}

/// A fixed value, such as the seed statistics snapshot.
pub struct ConstantSource(pub Value);

#[async_trait]
impl FallbackSource for ConstantSource {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Seed
    }

    async fn lookup(&self) -> Option<Value> {
        Some(self.0.clone())
    }
}

/// Ordered fallback policy applied after a network attempt.
#[derive(Default)]
pub struct FallbackChain<'a> {
    sources: Vec<Box<dyn FallbackSource + 'a>>,
}

impl<'a> FallbackChain<'a> {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    pub fn then(mut self, source: impl FallbackSource + 'a) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Network success wins; errors that are not connectivity failures
    /// propagate; otherwise the first local source with data answers.
    /// `Ok(None)` means every source came up empty.
    pub async fn resolve(&self, context: &str, network: Result<Value>) -> Result<Option<Resolved>> {
        let failure = match network {
            Ok(value) => {
                return Ok(Some(Resolved {
                    value,
                    origin: DataOrigin::Network,
                }));
            }
            Err(e) if e.is_fallback_eligible() => e,
            Err(e) => return Err(e),
        };

        for source in &self.sources {
            if let Some(value) = source.lookup().await {
                info!(
                    context = context,
                    origin = %source.origin(),
                    error = %failure,
                    "Serving fallback data"
                );
                return Ok(Some(Resolved {
                    value,
                    origin: source.origin(),
                }));
            }
            debug!(context = context, origin = %source.origin(), "Fallback source empty");
        }

        info!(context = context, error = %failure, "No fallback data available");
        Ok(None)
    }
}
