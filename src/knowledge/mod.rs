//! Append-only knowledge base (§3, §4.1): every QA/side-info/URL/coding
//! fact the scheduler has derived, in discovery order. Nothing is ever
//! removed or rewritten — later steps read the whole history when
//! composing prompts.

use crate::types::{KnowledgeItem, KnowledgeType};

#[derive(Debug, Default)]
pub struct KnowledgeBase {
    items: Vec<KnowledgeItem>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: KnowledgeItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn of_kind(&self, kind: KnowledgeType) -> impl Iterator<Item = &KnowledgeItem> {
        self.items.iter().filter(move |item| item.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_preserves_discovery_order() {
        let mut kb = KnowledgeBase::new();
        kb.push(KnowledgeItem::qa("q1", "a1"));
        kb.push(KnowledgeItem::side_info("q2", "a2"));
        assert_eq!(kb.items()[0].question, "q1");
        assert_eq!(kb.items()[1].question, "q2");
    }

    #[test]
    fn of_kind_filters_by_type() {
        let mut kb = KnowledgeBase::new();
        kb.push(KnowledgeItem::qa("q1", "a1"));
        kb.push(KnowledgeItem::side_info("q2", "a2"));
        let side_info: Vec<_> = kb.of_kind(KnowledgeType::SideInfo).collect();
        assert_eq!(side_info.len(), 1);
        assert_eq!(side_info[0].question, "q2");
    }
}
