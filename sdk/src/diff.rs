use memento_core::model::MemoryVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Equal(String),
    Insert(String),
    Delete(String),
}

#[derive(Debug, Clone)]
pub struct DiffResult {
    pub from_version_num: i32,
    pub to_version_num: i32,
    pub ops: Vec<DiffOp>,
}

/// Line-based diff via the standard LCS table. Runs in `O(n*m)`, which is fine for the
/// version sizes this engine deals with; nothing here needs to survive a megabyte-scale doc.
pub fn diff_versions(from: &MemoryVersion, to: &MemoryVersion) -> DiffResult {
    let from_lines: Vec<&str> = from.content_text.lines().collect();
    let to_lines: Vec<&str> = to.content_text.lines().collect();
    let ops = diff_lines(&from_lines, &to_lines);

    DiffResult {
        from_version_num: from.version_num,
        to_version_num: to.version_num,
        ops,
    }
}

fn diff_lines(a: &[&str], b: &[&str]) -> Vec<DiffOp> {
    let n = a.len();
    let m = b.len();
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(DiffOp::Equal(a[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(DiffOp::Delete(a[i].to_string()));
            i += 1;
        } else {
            ops.push(DiffOp::Insert(b[j].to_string()));
            j += 1;
        }
    }
    while i < n {
        ops.push(DiffOp::Delete(a[i].to_string()));
        i += 1;
    }
    while j < m {
        ops.push(DiffOp::Insert(b[j].to_string()));
        j += 1;
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memento_core::model::ContentFormat;
    use uuid::Uuid;

    fn version(num: i32, text: &str) -> MemoryVersion {
        MemoryVersion {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            commit_id: None,
            version_num: num,
            content_format: ContentFormat::Markdown,
            content_text: text.into(),
            content_json: None,
            checksum: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn identical_versions_produce_only_equal_ops() {
        let v1 = version(1, "a\nb\nc");
        let v2 = version(2, "a\nb\nc");
        let result = diff_versions(&v1, &v2);
        assert!(result.ops.iter().all(|op| matches!(op, DiffOp::Equal(_))));
    }

    #[test]
    fn detects_a_single_line_replacement() {
        let v1 = version(1, "intro\nold line\noutro");
        let v2 = version(2, "intro\nnew line\noutro");
        let result = diff_versions(&v1, &v2);
        assert!(result.ops.contains(&DiffOp::Delete("old line".into())));
        assert!(result.ops.contains(&DiffOp::Insert("new line".into())));
        assert!(result.ops.contains(&DiffOp::Equal("intro".into())));
    }

    #[test]
    fn detects_pure_insertion() {
        let v1 = version(1, "a\nb");
        let v2 = version(2, "a\nnew\nb");
        let result = diff_versions(&v1, &v2);
        assert!(result.ops.contains(&DiffOp::Insert("new".into())));
    }
}
