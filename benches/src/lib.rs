/// Deterministic synthetic markdown generator shared by the benches: `section_count` level-2
/// headings, each with a fixed-size paragraph, so runs are reproducible across machines.
pub fn synthetic_markdown(section_count: usize, paragraph_words: usize) -> String {
    let mut out = String::new();
    out.push_str("# Synthetic Benchmark Document\n\n");
    for section in 0..section_count {
        out.push_str(&format!("## Section {section}\n\n"));
        let words: Vec<String> = (0..paragraph_words)
            .map(|w| format!("word{section}_{w}"))
            .collect();
        out.push_str(&words.join(" "));
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_one_heading_per_section() {
        let doc = synthetic_markdown(5, 10);
        assert_eq!(doc.matches("## Section").count(), 5);
    }
}
