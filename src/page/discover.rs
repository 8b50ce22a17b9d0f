//! Block discovery: which static blocks on a page still need a live editor.

use std::collections::HashSet;

use super::{BlockId, CodeBlock, Page};

/// Finds target-language blocks and remembers which ones it handed out.
#[derive(Debug, Clone)]
pub struct Discoverer {
    languages: Vec<String>,
    claimed: HashSet<BlockId>,
}

impl Discoverer {
    /// Match `language` and any of its `aliases`.
    pub fn new(language: &str, aliases: &[String]) -> Self {
        let mut languages = vec![language.to_string()];
        languages.extend(aliases.iter().cloned());
        Self {
            languages,
            claimed: HashSet::new(),
        }
    }

    pub fn matches(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }

    /// Matching, unclaimed blocks in document order. Each is claimed as it is
    /// selected, so a second call over the same page yields nothing.
    pub fn discover(&mut self, page: &dyn Page) -> Vec<CodeBlock> {
        let mut found = Vec::new();
        for block in page.code_blocks() {
            if !self.matches(&block.language) {
                continue;
            }
            if self.claimed.insert(block.id.clone()) {
                found.push(block);
            }
        }
        tracing::debug!(
            "discovered {} new block(s) on {}",
            found.len(),
            page.path()
        );
        found
    }

    pub fn is_claimed(&self, block: &BlockId) -> bool {
        self.claimed.contains(block)
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }

    /// Drop claims on blocks no longer present on `page`. Replaced blocks
    /// count as present while their widget is.
    pub fn forget_missing(&mut self, page: &dyn Page, live_widgets: &HashSet<BlockId>) {
        let on_page: HashSet<BlockId> = page.code_blocks().into_iter().map(|b| b.id).collect();
        self.claimed
            .retain(|id| on_page.contains(id) || live_widgets.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::StaticPage;

    fn wat_discoverer() -> Discoverer {
        Discoverer::new("wat", &["wast".to_string()])
    }

    #[test]
    fn finds_target_and_alias_in_order() {
        let mut page = StaticPage::new("/");
        let a = page.push_block("wat", vec!["nop".into()]);
        page.push_block("js", vec!["f()".into()]);
        let b = page.push_block("wast", vec!["(assert_trap)".into()]);

        let found = wat_discoverer().discover(&page);
        let ids: Vec<_> = found.into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn second_pass_finds_nothing() {
        let mut page = StaticPage::new("/");
        page.push_block("wat", vec!["nop".into()]);
        let mut discoverer = wat_discoverer();

        assert_eq!(discoverer.discover(&page).len(), 1);
        assert!(discoverer.discover(&page).is_empty());
        assert_eq!(discoverer.claimed_count(), 1);
    }

    #[test]
    fn page_without_blocks() {
        let page = StaticPage::from_markdown("/", "just prose");
        assert!(wat_discoverer().discover(&page).is_empty());
    }

    #[test]
    fn language_match_is_exact() {
        let d = wat_discoverer();
        assert!(d.matches("wat"));
        assert!(!d.matches("WAT"));
        assert!(!d.matches("wasm"));
    }

    #[test]
    fn forgets_blocks_that_left_the_page() {
        let mut first = StaticPage::new("/a/");
        let old = first.push_block("wat", vec!["nop".into()]);
        let mut discoverer = wat_discoverer();
        discoverer.discover(&first);

        let mut second = StaticPage::new("/b/");
        let new = second.push_block("wat", vec!["drop".into()]);
        discoverer.forget_missing(&second, &HashSet::new());
        assert!(!discoverer.is_claimed(&old));

        discoverer.discover(&second);
        assert!(discoverer.is_claimed(&new));
    }
}
