/// Deterministic anchor from a heading path: `h{level}:{slug1}.{slug2}...`, empty path yields
/// `root`. Each slug is lowercased, non-alphanumeric runs collapse to a single `-`, truncated
/// to 40 characters.
pub fn section_anchor(heading_path: &[String]) -> String {
    if heading_path.is_empty() {
        return "root".to_string();
    }
    let slugs: Vec<String> = heading_path.iter().map(|h| slugify(h)).collect();
    format!("h{}:{}", heading_path.len(), slugs.join("."))
}

fn slugify(heading: &str) -> String {
    let lowered = heading.trim_start_matches('#').trim().to_lowercase();
    let mut slug = String::new();
    let mut last_was_dash = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    trimmed.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_yields_root() {
        assert_eq!(section_anchor(&[]), "root");
    }

    #[test]
    fn single_level_path() {
        assert_eq!(section_anchor(&["# Install Steps".to_string()]), "h1:install-steps");
    }

    #[test]
    fn nested_path_joins_with_dots() {
        let path = vec!["# API".to_string(), "## Auth Flow".to_string()];
        assert_eq!(section_anchor(&path), "h2:api.auth-flow");
    }

    #[test]
    fn slugs_truncate_to_forty_chars() {
        let long = "#".to_string() + &"word ".repeat(20);
        let anchor = section_anchor(&[long]);
        let slug_part = anchor.split(':').nth(1).unwrap();
        assert!(slug_part.len() <= 40);
    }
}
