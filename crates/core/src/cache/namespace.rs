//! Namespace naming.
//!
//! Every namespace name embeds the deploy's version tag: `{tag}-{kind}`.
//! Activation parses names back into `(tag, kind)` to find stale namespaces.

use std::fmt;

/// Opaque identifier of a deployed asset set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three namespaces a worker version owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// App shell, pre-populated at install, never evicted.
    Static,
    /// Documents, API and generic responses, bounded.
    Dynamic,
    /// Images, bounded.
    Images,
}

impl NamespaceKind {
    pub const ALL: [NamespaceKind; 3] = [NamespaceKind::Static, NamespaceKind::Dynamic, NamespaceKind::Images];

    pub fn suffix(&self) -> &'static str {
        match self {
            NamespaceKind::Static => "static",
            NamespaceKind::Dynamic => "dynamic",
            NamespaceKind::Images => "images",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.suffix() == suffix)
    }
}

/// Build the namespace name for a version and kind.
pub fn namespace_name(version: &VersionTag, kind: NamespaceKind) -> String {
    format!("{}-{}", version, kind.suffix())
}

/// Split a namespace name into its version tag and kind.
///
/// Returns `None` for names that were not produced by `namespace_name`,
/// so caches owned by someone else are never mistaken for stale ones.
pub fn parse_namespace(name: &str) -> Option<(VersionTag, NamespaceKind)> {
    let (tag, suffix) = name.rsplit_once('-')?;
    if tag.is_empty() {
        return None;
    }
    let kind = NamespaceKind::from_suffix(suffix)?;
    Some((VersionTag::new(tag), kind))
}

/// Resolved namespace names for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    pub app_shell: String,
    pub dynamic: String,
    pub images: String,
}

impl Namespaces {
    pub fn for_version(version: &VersionTag) -> Self {
        Self {
            app_shell: namespace_name(version, NamespaceKind::Static),
            dynamic: namespace_name(version, NamespaceKind::Dynamic),
            images: namespace_name(version, NamespaceKind::Images),
        }
    }

    pub fn name(&self, kind: NamespaceKind) -> &str {
        match kind {
            NamespaceKind::Static => &self.app_shell,
            NamespaceKind::Dynamic => &self.dynamic,
            NamespaceKind::Images => &self.images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_names() {
        let ns = Namespaces::for_version(&VersionTag::new("v2"));
        assert_eq!(ns.app_shell, "v2-static");
        assert_eq!(ns.dynamic, "v2-dynamic");
        assert_eq!(ns.images, "v2-images");
        assert_eq!(ns.name(NamespaceKind::Images), "v2-images");
    }

    #[test]
    fn test_parse_roundtrip_with_dashed_tag() {
        let tag = VersionTag::new("portfolio-v1.0.0");
        let name = namespace_name(&tag, NamespaceKind::Dynamic);
        assert_eq!(name, "portfolio-v1.0.0-dynamic");
        assert_eq!(parse_namespace(&name), Some((tag, NamespaceKind::Dynamic)));
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert_eq!(parse_namespace("workbox-precache"), None);
        assert_eq!(parse_namespace("static"), None);
        assert_eq!(parse_namespace("-static"), None);
    }
}
