//! Page Normalizer: turns a page into the exact text written to disk.
//!
//! Layout:
//!
//! ```text
//! ---
//! key: value
//! list:
//!   - item
//! ---
//! <provenance banner>
//!
//! <body lines joined by '\n'>
//! ```
//!
//! The front-matter block is emitted whenever the page has properties. When
//! `include_volatile` is false the `modified` property is left out entirely,
//! which is what makes the output usable as fingerprint input.
//!
//! Keys are written on one line without leading whitespace, and `": "` inside
//! a key is written as `":"`. Only the real volatile property can then render
//! as a `modified: ...` or `modified:` line.

use crate::fingerprint::VOLATILE_KEY;
use crate::page::{Properties, PropertyValue};

/// Front-matter delimiter line (without newline).
pub const FRONT_MATTER_DELIMITER: &str = "---";

/// Fixed notice at the top of every published page.
pub const PROVENANCE_BANNER: &str = ">[!warning] Important notice: this page is automatically generated\n\
>Please be aware that this page is automatically generated and maintained by \
[Inventoryst](https://www.github.com/unfoldingword/inventoryst). \
Any manual changes made to the content and layout will be overwritten during the next update. \
If you have specific information or customization needs, please contact your System Administrator.\n";

/// Renders page content. Pure function of its inputs.
pub fn render(properties: &Properties, body_lines: &[String], include_volatile: bool) -> String {
    let mut out = String::new();

    if !properties.is_empty() {
        out.push_str(FRONT_MATTER_DELIMITER);
        out.push('\n');
        for (key, value) in properties.iter() {
            if key == VOLATILE_KEY && !include_volatile {
                continue;
            }
            render_property(&mut out, key, value);
        }
        out.push_str(FRONT_MATTER_DELIMITER);
        out.push('\n');
    }

    out.push_str(PROVENANCE_BANNER);
    out.push('\n');
    out.push_str(&body_lines.join("\n"));
    out
}

fn render_property(out: &mut String, key: &str, value: &PropertyValue) {
    let key = front_matter_key(key);
    match value {
        PropertyValue::Text(text) => {
            out.push_str(&format!("{}: {}\n", key, single_line(text)));
        }
        PropertyValue::List(items) => {
            out.push_str(&format!("{key}:\n"));
            for item in items {
                out.push_str(&format!("  - {}\n", single_line(item)));
            }
        }
    }
}

// Front matter is line oriented; a raw newline would leak into the next key.
fn single_line(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn front_matter_key(key: &str) -> String {
    single_line(key).trim_start().replace(": ", ":")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn renders_banner_and_body_without_front_matter() {
        let out = render(&Properties::new(), &lines(&["# Sites", "", "done"]), true);
        assert_eq!(out, format!("{PROVENANCE_BANNER}\n# Sites\n\ndone"));
    }

    #[test]
    fn renders_scalars_and_lists_in_order() {
        let mut props = Properties::new();
        props.set("title", "Netlify");
        props.set("tags", vec!["inventory", "netlify"]);
        props.set("modified", "2024-01-01");

        let out = render(&props, &lines(&["Hello"]), true);

        let expected = format!(
            "---\ntitle: Netlify\ntags:\n  - inventory\n  - netlify\nmodified: 2024-01-01\n---\n{PROVENANCE_BANNER}\nHello"
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn omits_volatile_property_entirely() {
        let mut props = Properties::new();
        props.set("modified", "2024-01-01");
        props.set("title", "Netlify");

        let out = render(&props, &lines(&["Hello"]), false);

        assert!(!out.contains("modified"));
        assert!(out.starts_with("---\ntitle: Netlify\n---\n"));
    }

    #[test]
    fn keeps_delimiters_when_only_volatile_property_is_present() {
        let mut props = Properties::new();
        props.set("modified", "2024-01-01");

        let out = render(&props, &lines(&["Hello"]), false);

        assert!(out.starts_with("---\n---\n"));
    }

    #[test]
    fn folds_newlines_inside_values() {
        let mut props = Properties::new();
        props.set("description", "line one\nline two");

        let out = render(&props, &[], true);

        assert!(out.contains("description: line one line two\n"));
    }

    #[test]
    fn keys_stay_on_one_line() {
        let mut props = Properties::new();
        props.set("note\nmodified", "x");
        props.set("  - owner", "ops");
        props.set("source: api", "netlify");

        let out = render(&props, &[], true);

        assert!(out.starts_with(
            "---\nnote modified: x\n- owner: ops\nsource:api: netlify\n---\n"
        ));
    }

    #[test]
    fn render_is_deterministic() {
        let mut props = Properties::new();
        props.set("tags", vec!["a", "b"]);
        let body = lines(&["x", "y"]);
        assert_eq!(render(&props, &body, true), render(&props, &body, true));
    }
}
