//! Content references.
//!
//! A reference is an opaque, URI-like string. The editor never builds requests
//! from anything else, but it does need a few facts that are encoded in the
//! string itself:
//!
//! ```text
//! example.com/_components/article                       type default
//! example.com/_components/article/instances/abc123      instance
//! example.com/_components/article/instances/abc@published
//! example.com/_pages/home                               page
//! example.com/_uris/L2Fib3V0                            uri entry
//! ```

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const COMPONENTS: &str = "/_components/";
const PAGES: &str = "/_pages/";
const URIS: &str = "/_uris/";
const INSTANCES: &str = "/instances/";

/// What a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Type-level default data for a component name (no instance id)
    ComponentDefault,
    ComponentInstance,
    Page,
    Uri,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference(String);

impl Reference {
    pub fn parse(raw: impl Into<String>) -> ModelResult<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(ModelError::InvalidReference(raw));
        }
        Ok(Self(raw))
    }

    /// `<site>/_components/<name>`
    pub fn component(site: &str, name: &str) -> Self {
        Self(format!("{}{}{}", site, COMPONENTS, name))
    }

    /// `<site>/_components/<name>/instances/<id>`
    pub fn instance(site: &str, name: &str, id: &str) -> Self {
        Self(format!("{}{}{}{}{}", site, COMPONENTS, name, INSTANCES, id))
    }

    pub fn page(site: &str, id: &str) -> Self {
        Self(format!("{}{}{}", site, PAGES, id))
    }

    pub fn uri(site: &str, id: &str) -> Self {
        Self(format!("{}{}{}", site, URIS, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference without its `@version` suffix
    pub fn base(&self) -> &str {
        match self.0.rfind('@') {
            Some(at) => &self.0[..at],
            None => &self.0,
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.0.rfind('@').map(|at| &self.0[at + 1..])
    }

    pub fn with_version(&self, version: &str) -> Self {
        Self(format!("{}@{}", self.base(), version))
    }

    pub fn without_version(&self) -> Self {
        Self(self.base().to_string())
    }

    /// Everything before the first well-known collection segment
    pub fn site(&self) -> &str {
        let base = self.base();
        [COMPONENTS, PAGES, URIS]
            .iter()
            .filter_map(|segment| base.find(segment))
            .min()
            .map(|at| &base[..at])
            .unwrap_or(base)
    }

    pub fn kind(&self) -> ReferenceKind {
        let base = self.base();
        if let Some(rest) = after(base, COMPONENTS) {
            if rest.contains(INSTANCES) {
                ReferenceKind::ComponentInstance
            } else {
                ReferenceKind::ComponentDefault
            }
        } else if base.contains(PAGES) {
            ReferenceKind::Page
        } else if base.contains(URIS) {
            ReferenceKind::Uri
        } else {
            ReferenceKind::Other
        }
    }

    pub fn component_name(&self) -> Option<&str> {
        let rest = after(self.base(), COMPONENTS)?;
        Some(rest.split('/').next().unwrap_or(rest)).filter(|name| !name.is_empty())
    }

    pub fn instance_id(&self) -> Option<&str> {
        let rest = after(self.base(), COMPONENTS)?;
        after(rest, INSTANCES).filter(|id| !id.is_empty())
    }

    pub fn page_id(&self) -> Option<&str> {
        after(self.base(), PAGES).filter(|id| !id.is_empty())
    }

    pub fn is_component(&self) -> bool {
        matches!(
            self.kind(),
            ReferenceKind::ComponentDefault | ReferenceKind::ComponentInstance
        )
    }

    pub fn is_default_component(&self) -> bool {
        self.kind() == ReferenceKind::ComponentDefault
    }

    pub fn is_instance(&self) -> bool {
        self.kind() == ReferenceKind::ComponentInstance
    }

    pub fn is_page(&self) -> bool {
        self.kind() == ReferenceKind::Page
    }

    /// Type-default reference for a component reference (instance or default)
    pub fn default_reference(&self) -> Option<Reference> {
        let name = self.component_name()?;
        Some(Reference::component(self.site(), name))
    }

    /// Collection that new instances of this component type are POSTed to
    pub fn instances_collection(&self) -> Option<String> {
        let name = self.component_name()?;
        Some(format!("{}{}{}/instances", self.site(), COMPONENTS, name))
    }

    /// Endpoint serving the schema for this reference's component type
    pub fn schema_path(&self) -> Option<String> {
        let name = self.component_name()?;
        Some(format!("{}{}{}/schema", self.site(), COMPONENTS, name))
    }

    /// Endpoint serving rendered markup, optionally with edit affordances
    pub fn html_path(&self, edit: bool) -> String {
        let mut path = format!("{}.html", self.0);
        if edit {
            path.push_str("?edit=true");
        }
        path
    }
}

fn after<'a>(haystack: &'a str, segment: &str) -> Option<&'a str> {
    haystack
        .find(segment)
        .map(|at| &haystack[at + segment.len()..])
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Reference {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

impl TryFrom<String> for Reference {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Reference::parse(value)
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.0
    }
}

impl AsRef<str> for Reference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_reference_parts() {
        let r = Reference::parse("example.com/_components/article/instances/abc@published").unwrap();

        assert_eq!(r.kind(), ReferenceKind::ComponentInstance);
        assert_eq!(r.site(), "example.com");
        assert_eq!(r.component_name(), Some("article"));
        assert_eq!(r.instance_id(), Some("abc"));
        assert_eq!(r.version(), Some("published"));
        assert_eq!(
            r.without_version().as_str(),
            "example.com/_components/article/instances/abc"
        );
    }

    #[test]
    fn test_default_reference_has_no_instance() {
        let r = Reference::component("example.com", "paragraph");

        assert!(r.is_default_component());
        assert_eq!(r.instance_id(), None);
        assert_eq!(
            r.instances_collection().as_deref(),
            Some("example.com/_components/paragraph/instances")
        );
    }

    #[test]
    fn test_page_reference() {
        let r = Reference::page("example.com", "home");

        assert!(r.is_page());
        assert!(!r.is_component());
        assert_eq!(r.page_id(), Some("home"));
        assert_eq!(r.component_name(), None);
    }

    #[test]
    fn test_html_path() {
        let r = Reference::instance("example.com", "article", "a1");
        assert_eq!(
            r.html_path(true),
            "example.com/_components/article/instances/a1.html?edit=true"
        );
        assert_eq!(
            r.schema_path().as_deref(),
            Some("example.com/_components/article/schema")
        );
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(Reference::parse("").is_err());
        assert!(Reference::parse("example.com/_pages/a b").is_err());
    }

    #[test]
    fn test_serde_is_plain_string() {
        let r = Reference::page("example.com", "home");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"example.com/_pages/home\"");

        let back: Reference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
