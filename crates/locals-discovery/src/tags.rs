use std::collections::BTreeSet;

/// Include/exclude matching over an event's tag names.
///
/// `include` is an OR: any listed tag qualifies the event (an empty include
/// set qualifies everything). `exclude` is an AND-NOT: any listed tag
/// disqualifies it, and exclusion wins over inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl TagFilter {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses comma-separated tag lists, e.g. `music, dance`.
    pub fn parse(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include: split_tags(include),
            exclude: split_tags(exclude),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn include(&self) -> &BTreeSet<String> {
        &self.include
    }

    pub fn exclude(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    pub fn matches<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut included = self.include.is_empty();
        for tag in tags {
            if self.exclude.contains(tag) {
                return false;
            }
            if !included && self.include.contains(tag) {
                included = true;
            }
        }
        included
    }
}

fn split_tags(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_beats_include() {
        let filter = TagFilter::new(["music"], ["comedy"]);
        assert!(!filter.matches(["music", "comedy"]));
        assert!(filter.matches(["music"]));
    }

    #[test]
    fn include_is_any_of() {
        let filter = TagFilter::new(["music", "dance"], Vec::<String>::new());
        assert!(filter.matches(["dance", "class"]));
        assert!(!filter.matches(["class"]));
        assert!(!filter.matches([]));
    }

    #[test]
    fn exclude_only_keeps_untagged() {
        let filter = TagFilter::new(Vec::<String>::new(), ["theatre"]);
        assert!(filter.matches([]));
        assert!(filter.matches(["play"]));
        assert!(!filter.matches(["play", "theatre"]));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = TagFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(["anything"]));
        assert!(filter.matches([]));
    }

    #[test]
    fn parse_trims_and_drops_blanks() {
        let filter = TagFilter::parse(Some(" music, ,dance ,"), Some(""));
        assert_eq!(
            filter.include().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["dance", "music"]
        );
        assert!(filter.exclude().is_empty());
    }
}
