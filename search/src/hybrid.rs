use std::collections::{HashMap, HashSet};

use memento_storage::Repository;
use uuid::Uuid;

use crate::dsl::{classify_query_shape, weight_profile_for, SearchFilters, SearchOptions};
use crate::error::SearchError;
use crate::fusion::{fuse, FusionOptions};
use crate::lexical::LexicalEngine;
use crate::semantic::{SemanticEngine, SemanticOutcome};

const MAX_CHUNKS_PER_ITEM: usize = 3;
const FUSION_K: u32 = 60;
const CANONICAL_BOOST: f32 = 0.1;
const PINNED_BOOST: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct HybridChunkResult {
    pub chunk_id: Uuid,
    pub version_id: Uuid,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct HybridItemResult {
    pub item_id: Uuid,
    pub chunks: Vec<HybridChunkResult>,
    pub top_score: f32,
}

pub struct HybridSearch {
    lexical: LexicalEngine,
    semantic: SemanticEngine,
    repo: Repository,
}

impl HybridSearch {
    pub fn new(lexical: LexicalEngine, semantic: SemanticEngine, repo: Repository) -> Self {
        Self {
            lexical,
            semantic,
            repo,
        }
    }

    pub async fn search(
        &self,
        project_id: Uuid,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<HybridItemResult>, SearchError> {
        let shape = classify_query_shape(query);
        let weights = weight_profile_for(shape);

        let options = SearchOptions {
            top_k,
            ..SearchOptions::default()
        };

        let (lexical_result, semantic_result) = tokio::join!(
            self.lexical.search(project_id, query, filters, options),
            self.semantic.search(project_id, query, filters, top_k)
        );

        let lexical_matches = lexical_result?;
        let semantic_matches = match semantic_result? {
            SemanticOutcome::Matches(m) => m,
            SemanticOutcome::Empty { .. } => Vec::new(),
        };

        let item_ids: HashSet<Uuid> = lexical_matches
            .iter()
            .map(|m| m.item_id)
            .chain(semantic_matches.iter().map(|m| m.item_id))
            .collect();

        let (canonical_item_ids, pinned_item_ids) =
            self.lookup_boost_sets(project_id, &item_ids).await?;

        let fusion_options = FusionOptions {
            k: FUSION_K,
            weights,
            canonical_boost: CANONICAL_BOOST,
            pinned_boost: PINNED_BOOST,
        };

        let fused = fuse(
            &lexical_matches,
            &semantic_matches,
            &canonical_item_ids,
            &pinned_item_ids,
            fusion_options,
        );

        Ok(group_by_item(fused))
    }

    async fn lookup_boost_sets(
        &self,
        project_id: Uuid,
        item_ids: &HashSet<Uuid>,
    ) -> Result<(HashSet<Uuid>, HashSet<Uuid>), SearchError> {
        let mut canonical = HashSet::new();
        let mut pinned = HashSet::new();
        for item_id in item_ids {
            let item = self.repo.get_item(project_id, *item_id).await?;
            if item.canonical_key.is_some() {
                canonical.insert(*item_id);
            }
            if item.pinned {
                pinned.insert(*item_id);
            }
        }
        Ok((canonical, pinned))
    }
}

fn group_by_item(fused: Vec<crate::fusion::FusedResult>) -> Vec<HybridItemResult> {
    let mut by_item: HashMap<Uuid, Vec<HybridChunkResult>> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();

    for result in fused {
        let entry = by_item.entry(result.item_id).or_insert_with(|| {
            order.push(result.item_id);
            Vec::new()
        });
        if entry.len() < MAX_CHUNKS_PER_ITEM {
            entry.push(HybridChunkResult {
                chunk_id: result.chunk_id,
                version_id: result.version_id,
                score: result.score,
            });
        }
    }

    let mut items: Vec<HybridItemResult> = order
        .into_iter()
        .map(|item_id| {
            let chunks = by_item.remove(&item_id).unwrap_or_default();
            let top_score = chunks.first().map(|c| c.score).unwrap_or(0.0);
            HybridItemResult {
                item_id,
                chunks,
                top_score,
            }
        })
        .collect();

    items.sort_by(|a, b| {
        b.top_score
            .partial_cmp(&a.top_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.item_id.cmp(&b.item_id))
    });

    items
}
