use memento_core::model::Distance;
use sha1::{Digest, Sha1};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::RepoError;

fn opclass_for(distance: Distance) -> &'static str {
    match distance {
        Distance::Cosine => "vector_cosine_ops",
        Distance::L2 => "vector_l2_ops",
        Distance::Ip => "vector_ip_ops",
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HnswParams {
    pub m: u32,
    pub ef_construction: u32,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 64,
        }
    }
}

/// Deterministic index name: `chunk_embeddings_hnsw_<first 10 hex chars of sha1(profile_id)>`.
pub fn index_name(profile_id: Uuid) -> String {
    let mut hasher = Sha1::new();
    hasher.update(profile_id.as_bytes());
    let digest = hasher.finalize();
    format!("chunk_embeddings_hnsw_{}", &hex::encode(digest)[..10])
}

pub struct VectorIndexManager {
    pool: PgPool,
}

struct ExistingIndexDef {
    opclass: String,
    predicate_profile_id: Option<Uuid>,
    m: Option<u32>,
    ef_construction: Option<u32>,
}

impl VectorIndexManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn existing_index(&self, name: &str) -> Result<Option<ExistingIndexDef>, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT indexdef FROM pg_indexes WHERE indexname = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let indexdef: String = row.try_get("indexdef")?;
        Ok(Some(parse_indexdef(&indexdef)))
    }

    /// Dimension of the vectors actually stored for `profile_id`, read from a live row via
    /// pgvector's `vector_dims`. The `chunk_embeddings.embedding_vector` column has no fixed
    /// type modifier (profiles can disagree on dims), so this is the only place dims can be
    /// observed — `indexdef` never mentions it. `None` when the profile has no embedded rows
    /// yet, meaning there is nothing for a new index to disagree with.
    async fn stored_dims(&self, profile_id: Uuid) -> Result<Option<i32>, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT vector_dims(embedding_vector) AS dims
            FROM chunk_embeddings
            WHERE embedding_profile_id = $1
            LIMIT 1
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_get::<i32, _>("dims")).transpose().map_err(RepoError::from)
    }

    /// Ensures an ANN index over `chunk_embeddings` for this profile exists with the
    /// distance-appropriate opclass, dims, and HNSW parameters; drops and recreates
    /// CONCURRENTLY on any disagreement.
    pub async fn ensure_index(
        &self,
        profile_id: Uuid,
        dims: i32,
        distance: Distance,
        params: HnswParams,
    ) -> Result<String, RepoError> {
        let name = index_name(profile_id);
        let opclass = opclass_for(distance);

        if let Some(existing) = self.existing_index(&name).await? {
            let dims_match = self
                .stored_dims(profile_id)
                .await?
                .map(|stored| stored == dims)
                .unwrap_or(true);
            let predicate_matches = existing
                .predicate_profile_id
                .map(|id| id == profile_id)
                .unwrap_or(true);
            let matches = existing.opclass == opclass
                && dims_match
                && predicate_matches
                && existing.m.map(|m| m == params.m).unwrap_or(true)
                && existing
                    .ef_construction
                    .map(|ef| ef == params.ef_construction)
                    .unwrap_or(true);
            if matches {
                return Ok(name);
            }
            let drop_sql = format!(r#"DROP INDEX CONCURRENTLY IF EXISTS "{name}""#);
            sqlx::query(&drop_sql).execute(&self.pool).await?;
        }

        let create_sql = format!(
            r#"CREATE INDEX CONCURRENTLY "{name}" ON chunk_embeddings
               USING hnsw (embedding_vector {opclass}) WITH (m = {}, ef_construction = {})
               WHERE embedding_profile_id = '{profile_id}'"#,
            params.m, params.ef_construction
        );
        sqlx::query(&create_sql).execute(&self.pool).await?;

        Ok(name)
    }

    pub async fn drop_index(&self, profile_id: Uuid) -> Result<(), RepoError> {
        let name = index_name(profile_id);
        let drop_sql = format!(r#"DROP INDEX CONCURRENTLY IF EXISTS "{name}""#);
        sqlx::query(&drop_sql).execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_indexdef(indexdef: &str) -> ExistingIndexDef {
    let opclass = ["vector_cosine_ops", "vector_l2_ops", "vector_ip_ops"]
        .iter()
        .find(|op| indexdef.contains(**op))
        .map(|s| s.to_string())
        .unwrap_or_default();

    let m = extract_param(indexdef, "m");
    let ef_construction = extract_param(indexdef, "ef_construction");
    let predicate_profile_id = extract_predicate_profile_id(indexdef);

    ExistingIndexDef {
        opclass,
        predicate_profile_id,
        m,
        ef_construction,
    }
}

fn extract_param(indexdef: &str, key: &str) -> Option<u32> {
    let needle = format!("{key} = '");
    let start = indexdef.find(&needle)? + needle.len();
    let rest = &indexdef[start..];
    let end = rest.find('\'')?;
    rest[..end].parse().ok()
}

/// Pulls the bound profile id out of the partial index's `WHERE embedding_profile_id = '...'`
/// predicate, so `ensure_index` can detect an index left over from a different profile sharing
/// this hash bucket or a predicate rewritten by hand.
fn extract_predicate_profile_id(indexdef: &str) -> Option<Uuid> {
    let needle = "embedding_profile_id = '";
    let start = indexdef.find(needle)? + needle.len();
    let rest = &indexdef[start..];
    let end = rest.find('\'')?;
    Uuid::parse_str(&rest[..end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_is_deterministic_per_profile() {
        let id = Uuid::new_v4();
        assert_eq!(index_name(id), index_name(id));
    }

    #[test]
    fn index_name_differs_across_profiles() {
        assert_ne!(index_name(Uuid::new_v4()), index_name(Uuid::new_v4()));
    }

    #[test]
    fn index_name_has_expected_prefix_and_length() {
        let name = index_name(Uuid::new_v4());
        assert!(name.starts_with("chunk_embeddings_hnsw_"));
        assert_eq!(name.len(), "chunk_embeddings_hnsw_".len() + 10);
    }

    #[test]
    fn parse_indexdef_extracts_opclass_params_and_predicate() {
        let profile_id = Uuid::new_v4();
        let indexdef = format!(
            r#"CREATE INDEX chunk_embeddings_hnsw_abc ON public.chunk_embeddings USING hnsw (embedding_vector vector_cosine_ops) WITH (m = '16', ef_construction = '64') WHERE (embedding_profile_id = '{profile_id}')"#
        );
        let parsed = parse_indexdef(&indexdef);
        assert_eq!(parsed.opclass, "vector_cosine_ops");
        assert_eq!(parsed.m, Some(16));
        assert_eq!(parsed.ef_construction, Some(64));
        assert_eq!(parsed.predicate_profile_id, Some(profile_id));
    }

    #[test]
    fn parse_indexdef_missing_predicate_yields_none() {
        let indexdef = "CREATE INDEX x ON chunk_embeddings USING hnsw (embedding_vector vector_l2_ops) WITH (m = '16', ef_construction = '64')";
        let parsed = parse_indexdef(indexdef);
        assert_eq!(parsed.predicate_profile_id, None);
    }
}
