//! Deterministic artifact naming and user bucketing.

use proptest::prelude::*;

use lamprey::storage::artifact_filename;
use lamprey::utils::{host_slug, user_bucket};

#[test]
fn known_urls_produce_stable_host_prefixed_names() {
    let name = artifact_filename("https://www.example.com/page", Some("Example Domain"), "md");
    assert!(name.starts_with("example_com_"));
    assert!(name.ends_with(".md"));
    assert_eq!(
        name,
        artifact_filename("https://www.example.com/page", Some("Example Domain"), "md")
    );
}

#[test]
fn extension_changes_only_the_suffix() {
    let md = artifact_filename("https://example.com/a", None, "md");
    let png = artifact_filename("https://example.com/a", None, "png");
    assert_eq!(
        md.trim_end_matches(".md"),
        png.trim_end_matches(".png")
    );
}

#[test]
fn anonymous_bucket_is_a_real_stable_bucket() {
    assert_eq!(user_bucket(None), user_bucket(None));
    assert_eq!(user_bucket(None).len(), 12);
    assert_ne!(user_bucket(None), user_bucket(Some("alice@example.com")));
}

proptest! {
    /// The generator is a pure function of its inputs.
    #[test]
    fn filenames_are_deterministic(
        host in "[a-z]{1,12}\\.(com|org|dev)",
        path in "[a-z0-9/]{0,20}",
        title in proptest::option::of("[ -~]{1,30}"),
    ) {
        let url = format!("https://{host}/{path}");
        let a = artifact_filename(&url, title.as_deref(), "md");
        let b = artifact_filename(&url, title.as_deref(), "md");
        prop_assert_eq!(a, b);
    }

    /// Host-path variants of different hosts never share a prefix; the
    /// hash keeps same-host variants apart.
    #[test]
    fn names_separate_hosts_and_paths(
        host_a in "[a-z]{3,10}", host_b in "[a-z]{3,10}",
        path_a in "[a-z]{1,10}", path_b in "[a-z]{1,10}",
    ) {
        let url_a = format!("https://{host_a}.com/{path_a}");
        let url_b = format!("https://{host_b}.com/{path_b}");
        let name_a = artifact_filename(&url_a, None, "md");
        let name_b = artifact_filename(&url_b, None, "md");

        if host_a != host_b {
            let prefix_a = format!("{}_com_", host_a);
            let prefix_b = format!("{}_com_", host_b);
            prop_assert!(name_a.starts_with(&prefix_a));
            prop_assert!(name_b.starts_with(&prefix_b));
            prop_assert_ne!(name_a, name_b);
        } else if path_a != path_b {
            prop_assert_ne!(name_a, name_b);
        } else {
            prop_assert_eq!(name_a, name_b);
        }
    }

    /// Buckets are stable, case-normalized, and 12 hex chars.
    #[test]
    fn user_buckets_are_stable(user in "[a-zA-Z0-9@.]{1,30}") {
        let bucket = user_bucket(Some(&user));
        prop_assert_eq!(bucket.clone(), user_bucket(Some(&user.to_lowercase())));
        prop_assert_eq!(bucket.len(), 12);
        prop_assert!(bucket.chars().all(|c| c.is_ascii_hexdigit()));
    }

    /// Host slugs never contain path separators or dots.
    #[test]
    fn host_slugs_are_filesystem_safe(host in "[a-z]{1,10}\\.(com|net)", path in "[a-z/]{0,12}") {
        let slug = host_slug(&format!("https://{host}/{path}"));
        prop_assert!(!slug.contains('/'));
        prop_assert!(!slug.contains('.'));
    }
}
