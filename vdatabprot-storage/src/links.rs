//! # Link Graph
//!
//! Directed, typed, weighted edges between vectors, persisted in `links.log`
//! as one adjacency list per source id.
//!
//! Links reference ids, not records: either end may never have been written.
//! Adding the same link twice stores it twice.

use std::path::Path;

use tracing::{debug, warn};

use vdatabprot_core::config::StorageConfig;
use vdatabprot_core::error::{Error, Result};
use vdatabprot_core::types::{ContextType, Link, VectorId};

use crate::durable::DurableMap;

pub struct LinkGraph {
    adjacency: DurableMap<Vec<Link>>,
}

impl LinkGraph {
    pub fn open(path: impl AsRef<Path>, config: &StorageConfig) -> Result<Self> {
        Ok(Self {
            adjacency: DurableMap::open(path, config, "links")?,
        })
    }

    /// Append `link` to its source's list. Self links are rejected and
    /// leave the graph unchanged.
    pub fn add_link(&self, link: Link) -> Result<()> {
        if link.is_self_loop() {
            warn!(id = %link.source_vector_id, "Rejecting self link");
            return Err(Error::SelfLinkRejected {
                id: link.source_vector_id.into_string(),
            });
        }

        debug!(
            source = %link.source_vector_id,
            target = %link.target_vector_id,
            context = %link.context_type,
            strength = link.strength_score,
            "Adding link"
        );
        let source = link.source_vector_id.clone();
        self.adjacency.update(source.as_str(), move |links| {
            links.push(link);
            Ok(())
        })
    }

    /// Add `source -> target` and `target -> source` with the same type and strength
    pub fn add_bidirectional(
        &self,
        source: &VectorId,
        target: &VectorId,
        context_type: ContextType,
        strength_score: f32,
    ) -> Result<()> {
        let forward = Link::new(source.clone(), target.clone(), context_type, strength_score);
        let backward = forward.reversed();
        self.add_link(forward)?;
        self.add_link(backward)
    }

    /// Outgoing links of `id` in insertion order; empty if it has none
    pub fn links_for(&self, id: &VectorId) -> Vec<Link> {
        self.adjacency.get(id.as_str()).unwrap_or_default()
    }

    /// Every adjacency list, ordered by source id
    pub fn all_links(&self) -> Vec<(VectorId, Vec<Link>)> {
        let mut all: Vec<_> = self
            .adjacency
            .snapshot()
            .into_iter()
            .map(|(source, links)| (VectorId::from(source), links))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Total number of stored links, duplicates included
    pub fn link_count(&self) -> usize {
        self.adjacency
            .snapshot()
            .iter()
            .map(|(_, links)| links.len())
            .sum()
    }

    pub fn sync(&self) -> Result<()> {
        self.adjacency.sync()
    }
}
