use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::dsl::WeightProfile;
use crate::lexical::LexicalMatch;
use crate::semantic::SemanticMatch;

#[derive(Debug, Clone, Copy)]
pub struct FusionOptions {
    pub k: u32,
    pub weights: WeightProfile,
    pub canonical_boost: f32,
    pub pinned_boost: f32,
}

#[derive(Debug, Clone)]
pub struct FusedResult {
    pub chunk_id: Uuid,
    pub item_id: Uuid,
    pub version_id: Uuid,
    pub score: f32,
}

#[derive(Clone)]
struct ChunkInfo {
    item_id: Uuid,
    version_id: Uuid,
}

/// Weighted reciprocal-rank fusion over lexical, semantic and trigram ranked lists, plus two
/// synthetic boost lists (canonical, pinned) ordered stably by chunk_id for determinism.
pub fn fuse(
    lexical: &[LexicalMatch],
    semantic: &[SemanticMatch],
    canonical_item_ids: &HashSet<Uuid>,
    pinned_item_ids: &HashSet<Uuid>,
    options: FusionOptions,
) -> Vec<FusedResult> {
    let mut scores: HashMap<Uuid, f32> = HashMap::new();
    let mut info: HashMap<Uuid, ChunkInfo> = HashMap::new();

    for m in lexical {
        info.entry(m.chunk_id).or_insert(ChunkInfo {
            item_id: m.item_id,
            version_id: m.version_id,
        });
    }
    for m in semantic {
        info.entry(m.chunk_id).or_insert(ChunkInfo {
            item_id: m.item_id,
            version_id: m.version_id,
        });
    }

    add_ranked_list(
        &mut scores,
        sorted_by_desc(lexical, |m| m.lexical_score, |m| m.chunk_id),
        options.weights.lexical,
        options.k,
    );
    add_ranked_list(
        &mut scores,
        sorted_by_asc_distance(semantic),
        options.weights.semantic,
        options.k,
    );

    let trigram_ranked: Vec<Uuid> = sorted_by_desc(
        &lexical.iter().filter(|m| m.trigram_score > 0.0).cloned().collect::<Vec<_>>(),
        |m| m.trigram_score,
        |m| m.chunk_id,
    );
    add_ranked_list(&mut scores, trigram_ranked, options.weights.trigram, options.k);

    let mut all_chunk_ids: Vec<Uuid> = info.keys().copied().collect();
    all_chunk_ids.sort();

    let canonical_ranked: Vec<Uuid> = all_chunk_ids
        .iter()
        .copied()
        .filter(|id| info.get(id).map(|i| canonical_item_ids.contains(&i.item_id)).unwrap_or(false))
        .collect();
    add_ranked_list(&mut scores, canonical_ranked, options.canonical_boost, options.k);

    let pinned_ranked: Vec<Uuid> = all_chunk_ids
        .iter()
        .copied()
        .filter(|id| info.get(id).map(|i| pinned_item_ids.contains(&i.item_id)).unwrap_or(false))
        .collect();
    add_ranked_list(&mut scores, pinned_ranked, options.pinned_boost, options.k);

    let mut results: Vec<FusedResult> = scores
        .into_iter()
        .filter_map(|(chunk_id, score)| {
            info.get(&chunk_id).map(|i| FusedResult {
                chunk_id,
                item_id: i.item_id,
                version_id: i.version_id,
                score,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.item_id.cmp(&b.item_id))
            .then(a.chunk_id.cmp(&b.chunk_id))
    });

    results
}

fn sorted_by_desc<T, F, G>(items: &[T], score_of: F, id_of: G) -> Vec<Uuid>
where
    T: Clone,
    F: Fn(&T) -> f32,
    G: Fn(&T) -> Uuid,
{
    let mut indexed: Vec<(Uuid, f32)> = items.iter().map(|i| (id_of(i), score_of(i))).collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    indexed.into_iter().map(|(id, _)| id).collect()
}

fn sorted_by_asc_distance(semantic: &[SemanticMatch]) -> Vec<Uuid> {
    let mut indexed: Vec<(Uuid, f32)> = semantic.iter().map(|m| (m.chunk_id, m.distance)).collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    indexed.into_iter().map(|(id, _)| id).collect()
}

fn add_ranked_list(scores: &mut HashMap<Uuid, f32>, ranked: Vec<Uuid>, weight: f32, k: u32) {
    if weight == 0.0 {
        return;
    }
    for (rank, chunk_id) in ranked.into_iter().enumerate() {
        let contribution = weight / (k as f32 + rank as f32 + 1.0);
        *scores.entry(chunk_id).or_insert(0.0) += contribution;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexical_match(chunk_id: Uuid, item_id: Uuid, score: f32) -> LexicalMatch {
        LexicalMatch {
            chunk_id,
            item_id,
            version_id: Uuid::new_v4(),
            heading_path: vec![],
            section_anchor: None,
            excerpt: String::new(),
            lexical_score: score,
            trigram_score: 0.0,
        }
    }

    fn semantic_match(chunk_id: Uuid, item_id: Uuid, distance: f32) -> SemanticMatch {
        SemanticMatch {
            chunk_id,
            item_id,
            version_id: Uuid::new_v4(),
            heading_path: vec![],
            section_anchor: None,
            distance,
            score: 1.0 - distance,
        }
    }

    #[test]
    fn fusion_favors_chunk_ranked_highly_in_both_lists() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let item_a = Uuid::new_v4();
        let item_b = Uuid::new_v4();
        let item_c = Uuid::new_v4();

        let lexical = vec![lexical_match(a, item_a, 2.0), lexical_match(b, item_b, 1.0)];
        let semantic = vec![semantic_match(b, item_b, 0.1), semantic_match(c, item_c, 0.2)];

        let options = FusionOptions {
            k: 60,
            weights: WeightProfile {
                lexical: 0.5,
                semantic: 0.35,
                trigram: 0.15,
            },
            canonical_boost: 0.1,
            pinned_boost: 0.1,
        };

        let fused = fuse(&lexical, &semantic, &HashSet::new(), &HashSet::new(), options);
        assert_eq!(fused[0].chunk_id, b);
    }

    #[test]
    fn fusion_is_deterministic() {
        let a = Uuid::new_v4();
        let item_a = Uuid::new_v4();
        let lexical = vec![lexical_match(a, item_a, 1.0)];
        let options = FusionOptions {
            k: 60,
            weights: WeightProfile {
                lexical: 0.5,
                semantic: 0.35,
                trigram: 0.15,
            },
            canonical_boost: 0.1,
            pinned_boost: 0.1,
        };

        let first = fuse(&lexical, &[], &HashSet::new(), &HashSet::new(), options);
        let second = fuse(&lexical, &[], &HashSet::new(), &HashSet::new(), options);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].chunk_id, second[0].chunk_id);
        assert!((first[0].score - second[0].score).abs() < 1e-9);
    }
}
