//! Declarative resource-type filtering for rendering contexts.

use std::collections::BTreeSet;

/// Kinds of sub-resources a page may request while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceType {
    Document,
    Script,
    Xhr,
    Fetch,
    Image,
    Stylesheet,
    Font,
    Media,
    Other,
}

impl ResourceType {
    /// Resource type name as used by Chromium's network domain.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Script => "script",
            Self::Xhr => "xhr",
            Self::Fetch => "fetch",
            Self::Image => "image",
            Self::Stylesheet => "stylesheet",
            Self::Font => "font",
            Self::Media => "media",
            Self::Other => "other",
        }
    }
}

/// Predicate deciding which resource types a context refuses to load.
///
/// Supplied once at context creation; contexts never mutate it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    blocked: BTreeSet<ResourceType>,
}

impl ResourceFilter {
    /// Load everything.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Block exactly the given types.
    pub fn block(types: impl IntoIterator<Item = ResourceType>) -> Self {
        Self {
            blocked: types.into_iter().collect(),
        }
    }

    /// Block assets that never carry listing text: images, stylesheets, fonts, media.
    pub fn non_essential() -> Self {
        Self::block([
            ResourceType::Image,
            ResourceType::Stylesheet,
            ResourceType::Font,
            ResourceType::Media,
        ])
    }

    /// Whether a request of type `kind` should be aborted.
    pub fn blocks(&self, kind: ResourceType) -> bool {
        self.blocked.contains(&kind)
    }

    /// Blocked types in a stable order.
    pub fn blocked_types(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.blocked.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_essential_blocks_assets_only() {
        let filter = ResourceFilter::non_essential();
        assert!(filter.blocks(ResourceType::Image));
        assert!(filter.blocks(ResourceType::Font));
        assert!(!filter.blocks(ResourceType::Document));
        assert!(!filter.blocks(ResourceType::Script));
        assert!(!filter.blocks(ResourceType::Xhr));
    }

    #[test]
    fn allow_all_blocks_nothing() {
        let filter = ResourceFilter::allow_all();
        assert_eq!(filter.blocked_types().count(), 0);
    }

    #[test]
    fn blocked_types_are_ordered_and_deduplicated() {
        let filter = ResourceFilter::block([
            ResourceType::Media,
            ResourceType::Image,
            ResourceType::Media,
        ]);
        let names: Vec<&str> = filter.blocked_types().map(ResourceType::as_str).collect();
        assert_eq!(names, vec!["image", "media"]);
    }
}
