use uuid::Uuid;

/// A parsed `memory://` resource reference: `memory://projects/{project_id}/items/{item_id}`,
/// optionally pinned to a version (`@v{N}`) and/or a section (`#{anchor}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryUri {
    pub project_id: Uuid,
    pub item_id: Uuid,
    pub version_num: Option<i32>,
    pub section_anchor: Option<String>,
}

impl MemoryUri {
    pub fn latest(project_id: Uuid, item_id: Uuid) -> Self {
        Self {
            project_id,
            item_id,
            version_num: None,
            section_anchor: None,
        }
    }

    pub fn with_version(mut self, version_num: i32) -> Self {
        self.version_num = Some(version_num);
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.section_anchor = Some(anchor.into());
        self
    }

    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("memory://projects/")?;
        let (path, anchor) = match rest.split_once('#') {
            Some((p, a)) => (p, Some(a.to_string())),
            None => (rest, None),
        };
        let mut parts = path.splitn(4, '/');
        let project_id_str = parts.next()?;
        if parts.next()? != "items" {
            return None;
        }
        let item_segment = parts.next()?;
        let (item_id_str, version_num) = match item_segment.split_once("@v") {
            Some((id, v)) => (id, Some(v.parse::<i32>().ok()?)),
            None => (item_segment, None),
        };

        Some(Self {
            project_id: Uuid::parse_str(project_id_str).ok()?,
            item_id: Uuid::parse_str(item_id_str).ok()?,
            version_num,
            section_anchor: anchor,
        })
    }
}

impl std::fmt::Display for MemoryUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memory://projects/{}/items/{}", self.project_id, self.item_id)?;
        if let Some(v) = self.version_num {
            write!(f, "@v{v}")?;
        }
        if let Some(anchor) = &self.section_anchor {
            write!(f, "#{anchor}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_latest_form() {
        let project_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let uri = MemoryUri::latest(project_id, item_id);
        let rendered = uri.to_string();
        assert_eq!(MemoryUri::parse(&rendered), Some(uri));
    }

    #[test]
    fn round_trips_versioned_form_with_anchor() {
        let project_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let uri = MemoryUri::latest(project_id, item_id)
            .with_version(3)
            .with_anchor("install-steps");
        let rendered = uri.to_string();
        assert_eq!(MemoryUri::parse(&rendered), Some(uri));
    }

    #[test]
    fn rejects_malformed_uri() {
        assert_eq!(MemoryUri::parse("memory://projects/not-a-uuid/items/x"), None);
        assert_eq!(MemoryUri::parse("not-a-memory-uri"), None);
    }
}
