//! Change Detector: decides whether a page must be rewritten.
//!
//! The `modified` stamp changes on every write, so the previously published
//! file is compared with the volatile line removed. The new side is rendered
//! without the volatile property in the first place (see
//! [`crate::normalize::render`]), so both sides line up byte for byte when the
//! content is unchanged.

use sha2::{Digest, Sha256};

use crate::normalize::FRONT_MATTER_DELIMITER;

/// Front-matter key whose value changes on every publish.
pub const VOLATILE_KEY: &str = "modified";

/// SHA-256 of `content`, hex encoded.
pub fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Removes the volatile property from the leading front-matter block.
///
/// Only the lines the renderer emits for the volatile property are dropped:
/// `modified: <value>`, or `modified:` followed by its `  - item` lines. Other
/// keys that merely start with `modified` are kept, and body text is never
/// touched, even when it mentions the key.
pub fn strip_volatile(content: &str) -> String {
    let mut lines = content.split_inclusive('\n');
    let mut out = String::with_capacity(content.len());

    match lines.next() {
        Some(first) if is_delimiter(first) => out.push_str(first),
        Some(first) => {
            out.push_str(first);
            lines.for_each(|line| out.push_str(line));
            return out;
        }
        None => return out,
    }

    let mut in_front_matter = true;
    let mut skipping_items = false;
    for line in lines {
        if !in_front_matter {
            out.push_str(line);
            continue;
        }
        if is_delimiter(line) {
            in_front_matter = false;
            skipping_items = false;
            out.push_str(line);
            continue;
        }
        if skipping_items && line.starts_with("  - ") {
            continue;
        }
        skipping_items = false;
        match volatile_line(line) {
            Some(VolatileLine::Scalar) => {}
            Some(VolatileLine::ListHead) => skipping_items = true,
            None => out.push_str(line),
        }
    }
    out
}

/// Fingerprint of an already published file.
pub fn fingerprint_existing(existing: &str) -> String {
    digest(&strip_volatile(existing))
}

/// Returns true when `new_without_volatile` differs from what is on disk.
///
/// `existing` is `None` when there is no file (or it could not be read). A
/// missing or zero-length file counts as no existing content and always needs
/// a write. Any other file, including one without a single complete line, is
/// compared by digest.
pub fn needs_write(existing: Option<&str>, new_without_volatile: &str) -> bool {
    match existing {
        None => true,
        Some(content) if content.is_empty() => true,
        Some(content) => fingerprint_existing(content) != digest(new_without_volatile),
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']) == FRONT_MATTER_DELIMITER
}

enum VolatileLine {
    Scalar,
    ListHead,
}

fn volatile_line(line: &str) -> Option<VolatileLine> {
    let rest = line.strip_prefix(VOLATILE_KEY)?;
    if rest.starts_with(": ") {
        Some(VolatileLine::Scalar)
    } else if rest.trim_end_matches(['\n', '\r']) == ":" {
        Some(VolatileLine::ListHead)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::render;
    use crate::page::Properties;

    fn body(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn props_with_date(date: &str) -> Properties {
        let mut props = Properties::new();
        props.set("title", "Sites");
        props.set(VOLATILE_KEY, date);
        props
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn first_publish_always_writes() {
        assert!(needs_write(None, "anything"));
        assert!(needs_write(Some(""), "anything"));
    }

    #[test]
    fn partial_line_file_is_compared_by_digest() {
        assert!(!needs_write(Some("Hello"), "Hello"));
        assert!(needs_write(Some("Hell"), "Hello"));
    }

    #[test]
    fn volatile_date_change_is_not_a_change() {
        let on_disk = render(&props_with_date("2024-01-01"), &body(&["Hello"]), true);
        let fresh = render(&props_with_date("2024-01-02"), &body(&["Hello"]), false);

        assert!(!needs_write(Some(&on_disk), &fresh));
    }

    #[test]
    fn single_character_body_change_is_a_change() {
        let on_disk = render(&props_with_date("2024-01-01"), &body(&["Hello"]), true);
        let fresh = render(&props_with_date("2024-01-01"), &body(&["Hellp"]), false);

        assert!(needs_write(Some(&on_disk), &fresh));
    }

    #[test]
    fn other_property_change_is_a_change() {
        let on_disk = render(&props_with_date("2024-01-01"), &body(&["Hello"]), true);
        let mut props = props_with_date("2024-01-01");
        props.set("title", "Members");
        let fresh = render(&props, &body(&["Hello"]), false);

        assert!(needs_write(Some(&on_disk), &fresh));
    }

    #[test]
    fn body_lines_mentioning_the_key_are_kept() {
        let content = "---\nmodified: 2024-01-01\n---\nmodified: in body\n";
        assert_eq!(strip_volatile(content), "---\n---\nmodified: in body\n");
    }

    #[test]
    fn list_valued_volatile_property_is_stripped_with_its_items() {
        let content = "---\nmodified:\n  - a\n  - b\ntags:\n  - x\n---\nbody";
        assert_eq!(strip_volatile(content), "---\ntags:\n  - x\n---\nbody");
    }

    #[test]
    fn similar_keys_are_not_stripped() {
        let content = "---\nmodified_by: bot\nmodified: 2024-01-01\n---\n";
        assert_eq!(strip_volatile(content), "---\nmodified_by: bot\n---\n");
    }

    #[test]
    fn keys_sharing_the_volatile_prefix_are_kept() {
        let content = "---\nmodified:by: bot\nmodified::x\nmodified: 2024-01-01\n---\n";
        assert_eq!(
            strip_volatile(content),
            "---\nmodified:by: bot\nmodified::x\n---\n"
        );
    }

    #[test]
    fn item_lines_after_a_scalar_volatile_value_are_kept() {
        let content = "---\nmodified: 2024-01-01\n  - stray\n---\n";
        assert_eq!(strip_volatile(content), "---\n  - stray\n---\n");
    }

    #[test]
    fn unusual_keys_do_not_force_a_rewrite() {
        let mut props = props_with_date("2024-01-01");
        props.set("modified:by", "bot");
        props.set("note\nmodified", "x");
        let on_disk = render(&props, &body(&["Hello"]), true);

        props.set(VOLATILE_KEY, "2024-01-02");
        let fresh = render(&props, &body(&["Hello"]), false);

        assert!(!needs_write(Some(&on_disk), &fresh));
    }

    #[test]
    fn content_without_front_matter_is_unchanged() {
        let content = "modified: not front matter\nbody";
        assert_eq!(strip_volatile(content), content);
    }

    #[test]
    fn manually_edited_file_is_rewritten() {
        let mut on_disk = render(&props_with_date("2024-01-01"), &body(&["Hello"]), true);
        on_disk.push_str("\nmanual edit");
        let fresh = render(&props_with_date("2024-01-05"), &body(&["Hello"]), false);

        assert!(needs_write(Some(&on_disk), &fresh));
    }
}
