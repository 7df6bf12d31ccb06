//! Markdown pipeline invariants: citation numbering, absolute links,
//! pruning, and the enhanced-mode references block.

use proptest::prelude::*;

use lamprey::markdown::{
    self, ContentFilter, MarkdownMode, convert_links_to_citations,
};

#[test]
fn enhanced_output_numbers_references_by_first_occurrence() {
    let html = r#"<html><body><article>
        <p>See <a href="https://first.example/a">the first source</a> for background,
        then <a href="https://second.example/b">the second</a>, and note that
        <a href="https://first.example/a">the first source</a> repeats.</p>
    </article></body></html>"#;

    let rendering = markdown::render(html, "https://page.example", MarkdownMode::Enhanced, None)
        .expect("enhanced rendering");

    assert!(rendering.references.contains("## References"));
    let first_pos = rendering
        .references
        .find("\u{27e8}1\u{27e9} https://first.example/a")
        .expect("first url cited as 1");
    let second_pos = rendering
        .references
        .find("\u{27e8}2\u{27e9} https://second.example/b")
        .expect("second url cited as 2");
    assert!(first_pos < second_pos);

    // The repeated link shares citation number 1.
    assert_eq!(rendering.markdown.matches("\u{27e8}1\u{27e9}").count(), 2);
}

#[test]
fn basic_mode_rewrites_relative_links_absolute() {
    let html = r#"<body><p><a href="/docs">Docs</a> and
        <a href="https://other.example/x">external</a></p></body>"#;
    let rendering = markdown::render(html, "https://site.example", MarkdownMode::Basic, None)
        .expect("basic rendering");
    assert!(rendering.markdown.contains("https://site.example/docs"));
    assert!(rendering.markdown.contains("https://other.example/x"));
    assert!(rendering.references.is_empty());
}

#[test]
fn pruning_strips_navigation_chrome_from_fit_markdown() {
    let html = r#"<html><body>
        <article><p>This is the real article content, a long paragraph with
        enough words and density to comfortably survive pruning and appear
        in the fit markdown output of the pipeline.</p></article>
        <div class="sidebar ads"><a href="/buy">buy</a><a href="/sell">sell</a></div>
    </body></html>"#;

    let rendering = markdown::render(html, "https://site.example", MarkdownMode::Enhanced, None)
        .expect("rendering");
    let fit = rendering.fit_markdown.expect("fit markdown present");
    assert!(fit.contains("real article content"));
    assert!(!fit.contains("buy"));
}

#[test]
fn bm25_filter_keeps_only_query_relevant_blocks() {
    let html = r#"<body>
        <p>The asynchronous runtime schedules cooperative tasks efficiently.</p>
        <p>Our office dog enjoys long naps in the sunshine every afternoon.</p>
    </body>"#;
    let filter = ContentFilter::Bm25 {
        query: "asynchronous runtime tasks".into(),
        threshold: 0.5,
    };
    let rendering = markdown::render(
        html,
        "https://site.example",
        MarkdownMode::Enhanced,
        Some(&filter),
    )
    .expect("rendering");
    let fit = rendering.fit_markdown.expect("fit markdown");
    assert!(fit.contains("cooperative tasks"));
    assert!(!fit.contains("office dog"));
}

proptest! {
    /// For any link set, enhanced citation output numbers distinct URLs
    /// starting at 1 in first-occurrence order, one reference per URL.
    #[test]
    fn citation_numbering_is_dense_and_ordered(paths in proptest::collection::vec("[a-z]{1,8}", 1..8)) {
        let markdown_input: String = paths
            .iter()
            .enumerate()
            .map(|(i, path)| format!("[link {i}](https://example.com/{path})"))
            .collect::<Vec<_>>()
            .join(" and ");

        let (converted, references) =
            convert_links_to_citations(&markdown_input, "https://example.com");

        // Distinct URLs in first-occurrence order.
        let mut distinct: Vec<String> = Vec::new();
        for path in &paths {
            let url = format!("https://example.com/{path}");
            if !distinct.contains(&url) {
                distinct.push(url);
            }
        }

        for (index, url) in distinct.iter().enumerate() {
            let number = index + 1;
            let line = format!("\u{27e8}{number}\u{27e9} {url}");
            prop_assert!(
                references.contains(&line),
                "expected reference line {line:?} in {references:?}"
            );
        }
        // One reference entry per distinct URL.
        let entries = references.lines().filter(|l| l.starts_with('\u{27e8}')).count();
        prop_assert_eq!(entries, distinct.len());
        // No raw link syntax survives in the body.
        prop_assert!(!converted.contains("]("));
    }
}
