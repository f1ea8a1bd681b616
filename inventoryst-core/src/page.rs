//! Page data model: what a connector hands to the publisher.
//!
//! A [`Page`] is built fresh on every run and is never persisted as an object;
//! only its rendered text ends up on disk (see [`crate::normalize`]).

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::fingerprint::VOLATILE_KEY;

/// Mapping from slash-separated relative output path to page.
pub type PageMap = BTreeMap<String, Page>;

/// Value of a single front-matter property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::List(values)
    }
}

impl From<Vec<&str>> for PropertyValue {
    fn from(values: Vec<&str>) -> Self {
        PropertyValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Ordered front-matter properties. Keys are unique; insertion order is render order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, PropertyValue)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place or appending a new entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One unit of Markdown output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub properties: Properties,
    pub body_lines: Vec<String>,
}

impl Page {
    pub fn new(body_lines: Vec<String>) -> Self {
        Self {
            properties: Properties::new(),
            body_lines,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.set(key, value);
        self
    }

    /// Returns a copy with the volatile `modified` property set to `date`.
    ///
    /// Stamping before both the fingerprint render and the write render keeps
    /// the front-matter block present in each, whatever the connector supplied.
    pub fn stamped(&self, date: NaiveDate) -> Page {
        let mut page = self.clone();
        page.properties
            .set(VOLATILE_KEY, date.format("%Y-%m-%d").to_string());
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place_and_keeps_order() {
        let mut props = Properties::new();
        props.set("title", "Sites");
        props.set("tags", vec!["inventory", "netlify"]);
        props.set("title", "Netlify sites");

        let keys: Vec<&str> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["title", "tags"]);
        assert_eq!(
            props.get("title"),
            Some(&PropertyValue::Text("Netlify sites".into()))
        );
    }

    #[test]
    fn stamped_overrides_connector_supplied_date() {
        let page = Page::new(vec!["Hello".into()]).with_property("modified", "2024-01-01");
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let stamped = page.stamped(date);

        assert_eq!(
            stamped.properties.get("modified"),
            Some(&PropertyValue::Text("2024-01-02".into()))
        );
        assert_eq!(stamped.properties.len(), 1);
        // The source page is untouched.
        assert_eq!(
            page.properties.get("modified"),
            Some(&PropertyValue::Text("2024-01-01".into()))
        );
    }

    #[test]
    fn stamped_appends_when_absent() {
        let page = Page::new(vec![]).with_property("platform", "Netlify");
        let stamped = page.stamped(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());

        let keys: Vec<&str> = stamped.properties.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["platform", "modified"]);
    }
}
