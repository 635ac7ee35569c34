use crate::error::{Error, Result};
use crate::tag::Tag;
use crate::vocabulary::Vocabulary;

/// A word-id sequence paired with its label sequence.
///
/// Both are bracketed by the sentinels: `items[0]` is [`Vocabulary::START`],
/// `items[n + 1]` is [`Vocabulary::END`], and the labels carry
/// [`Tag::START`] / [`Tag::END`] at the same places.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Word ids, sentinels included
    pub items: Vec<u32>,
    /// Tags, sentinels included
    pub labels: Vec<Tag>,
}

impl Instance {
    /// Bracket `items` and `labels` with the sentinels
    pub fn new(items: &[u32], labels: &[Tag]) -> Result<Self> {
        if items.len() != labels.len() {
            return Err(Error::InvalidInput(format!(
                "sequence has {} items but {} labels",
                items.len(),
                labels.len()
            )));
        }
        if items.is_empty() {
            return Err(Error::InvalidInput(
                "empty sequences are not allowed".to_string(),
            ));
        }
        let mut inst = Self::with_capacity(items.len());
        for (&item, &label) in items.iter().zip(labels) {
            inst.items.push(item);
            inst.labels.push(label);
        }
        inst.items.push(Vocabulary::END);
        inst.labels.push(Tag::END);
        Ok(inst)
    }

    /// An instance holding only the start sentinel, ready for pushes
    fn with_capacity(cap: usize) -> Self {
        let mut items = Vec::with_capacity(cap + 2);
        let mut labels = Vec::with_capacity(cap + 2);
        items.push(Vocabulary::START);
        labels.push(Tag::START);
        Self { items, labels }
    }

    /// Number of tokens between the sentinels
    #[inline]
    pub fn num_items(&self) -> usize {
        self.items.len() - 2
    }
}
