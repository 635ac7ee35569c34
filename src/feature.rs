use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tag::{Tag, NUM_TAGS};

/// Position offsets of the unigram templates
pub const UNIGRAM_OFFSETS: [i32; 5] = [-2, -1, 0, 1, 2];
/// Position offsets of the bigram templates
pub const BIGRAM_OFFSETS: [i32; 1] = [0];

/// A CRF feature descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Word at `position + offset` together with the current tag
    Unigram { offset: i32, word: u32, tag: Tag },
    /// Word at `position + offset` together with the (previous, current) tag pair
    Bigram {
        offset: i32,
        word: u32,
        prev: Tag,
        cur: Tag,
    },
}

/// Word at `i + offset`, if that index lies in `[lower, x.len())`
#[inline]
fn word_at(x: &[u32], i: usize, offset: i32, lower: i64) -> Option<u32> {
    let j = i as i64 + i64::from(offset);
    if j < lower || j >= x.len() as i64 {
        None
    } else {
        Some(x[j as usize])
    }
}

impl Feature {
    /// Whether this feature fires for the transition `prev -> cur` at position `i` of `x`.
    ///
    /// Bigram features never look at the start sentinel.
    pub fn fires(&self, x: &[u32], prev: Tag, cur: Tag, i: usize) -> bool {
        match *self {
            Feature::Unigram { offset, word, tag } => {
                tag == cur && word_at(x, i, offset, 0) == Some(word)
            }
            Feature::Bigram {
                offset,
                word,
                prev: p,
                cur: c,
            } => p == prev && c == cur && word_at(x, i, offset, 1) == Some(word),
        }
    }
}

/// Feature ids that can fire at one position of a sequence.
///
/// Resolved once per sequence; they only depend on the words, never on the weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionFeatures {
    /// Unigram features by current tag
    state: [Vec<u32>; NUM_TAGS],
    /// Bigram feature by (previous tag, current tag)
    trans: [[Option<u32>; NUM_TAGS]; NUM_TAGS],
}

impl PositionFeatures {
    /// Ids of the features firing for `prev -> cur`
    pub fn ids(&self, prev: Tag, cur: Tag) -> impl Iterator<Item = u32> + '_ {
        self.state[cur.index()]
            .iter()
            .copied()
            .chain(self.trans[prev.index()][cur.index()])
    }

    /// Sum of the weights of the features firing for `prev -> cur`
    #[inline]
    pub fn score(&self, weights: &[f64], prev: Tag, cur: Tag) -> f64 {
        self.ids(prev, cur).map(|fid| weights[fid as usize]).sum()
    }
}

/// The indexed set of all features.
///
/// Feature ids are dense in `[0, len())` and never change once the space is built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpace {
    /// Map from ID to feature
    features: Vec<Feature>,
    /// Map from feature to ID
    index: HashMap<Feature, u32>,
}

impl FeatureSpace {
    /// Enumerate every template instance over `num_words` words and all tags.
    ///
    /// Unigrams come first (offset, word, tag), then bigrams
    /// (offset, word, previous tag, current tag).
    pub fn enumerate(num_words: usize) -> Result<Self> {
        let num_words = u32::try_from(num_words)
            .map_err(|_| Error::InvalidInput("too many words".to_string()))?;
        let mut features = Vec::new();
        for &offset in &UNIGRAM_OFFSETS {
            for word in 0..num_words {
                for &tag in &Tag::ALL {
                    features.push(Feature::Unigram { offset, word, tag });
                }
            }
        }
        for &offset in &BIGRAM_OFFSETS {
            for word in 0..num_words {
                for &prev in &Tag::ALL {
                    for &cur in &Tag::ALL {
                        features.push(Feature::Bigram {
                            offset,
                            word,
                            prev,
                            cur,
                        });
                    }
                }
            }
        }
        Self::from_features(features)
    }

    /// Index an explicit, id-ordered feature list
    pub fn from_features(features: Vec<Feature>) -> Result<Self> {
        if u32::try_from(features.len()).is_err() {
            return Err(Error::InvalidInput("too many features".to_string()));
        }
        let mut index = HashMap::with_capacity(features.len());
        for (fid, feature) in features.iter().enumerate() {
            if index.insert(*feature, fid as u32).is_some() {
                return Err(Error::invalid_model(format!(
                    "duplicate feature {:?}",
                    feature
                )));
            }
        }
        Ok(Self { features, index })
    }

    /// Get the number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// ID of a feature, `None` if it was never enumerated
    #[inline]
    pub fn id_of(&self, feature: &Feature) -> Option<u32> {
        self.index.get(feature).copied()
    }

    /// Feature for an ID
    pub fn feature_at(&self, fid: u32) -> Option<Feature> {
        self.features.get(fid as usize).copied()
    }

    /// Iterate over all features in id order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Feature> + '_ {
        self.features.iter()
    }

    /// Ids of the features that fire for `prev -> cur` at position `i` of `x`.
    ///
    /// Combinations that were never enumerated (unknown words) are skipped.
    pub fn active_features(&self, x: &[u32], prev: Tag, cur: Tag, i: usize) -> Vec<u32> {
        let mut fids = Vec::with_capacity(UNIGRAM_OFFSETS.len() + BIGRAM_OFFSETS.len());
        for &offset in &UNIGRAM_OFFSETS {
            if let Some(word) = word_at(x, i, offset, 0) {
                fids.extend(self.id_of(&Feature::Unigram {
                    offset,
                    word,
                    tag: cur,
                }));
            }
        }
        for &offset in &BIGRAM_OFFSETS {
            if let Some(word) = word_at(x, i, offset, 1) {
                fids.extend(self.id_of(&Feature::Bigram {
                    offset,
                    word,
                    prev,
                    cur,
                }));
            }
        }
        fids
    }

    /// Log potential of the transition `prev -> cur` at position `i` of `x`
    pub fn log_potential_at(
        &self,
        weights: &[f64],
        x: &[u32],
        prev: Tag,
        cur: Tag,
        i: usize,
    ) -> f64 {
        self.active_features(x, prev, cur, i)
            .into_iter()
            .map(|fid| weights[fid as usize])
            .sum()
    }

    /// Resolve the features of every position of `x`.
    ///
    /// The result has one entry per token; entry 0 (the start sentinel) is empty.
    pub fn observe(&self, x: &[u32]) -> Vec<PositionFeatures> {
        let mut positions = vec![PositionFeatures::default(); x.len()];
        for (i, pos) in positions.iter_mut().enumerate().skip(1) {
            for &tag in &Tag::ALL {
                for &offset in &UNIGRAM_OFFSETS {
                    if let Some(word) = word_at(x, i, offset, 0) {
                        pos.state[tag.index()].extend(self.id_of(&Feature::Unigram {
                            offset,
                            word,
                            tag,
                        }));
                    }
                }
            }
            for &prev in &Tag::ALL {
                for &cur in &Tag::ALL {
                    for &offset in &BIGRAM_OFFSETS {
                        if let Some(word) = word_at(x, i, offset, 1) {
                            pos.trans[prev.index()][cur.index()] = self.id_of(&Feature::Bigram {
                                offset,
                                word,
                                prev,
                                cur,
                            });
                        }
                    }
                }
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Vocabulary;

    #[test]
    fn test_feature_enumeration_is_dense() {
        let space = FeatureSpace::enumerate(5).unwrap();
        assert_eq!(space.len(), 5 * NUM_TAGS * 5 + 5 * NUM_TAGS * NUM_TAGS);

        let mut ids: Vec<u32> = space.iter().map(|f| space.id_of(f).unwrap()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids, (0..space.len() as u32).collect::<Vec<_>>());

        for fid in 0..space.len() as u32 {
            let feature = space.feature_at(fid).unwrap();
            assert_eq!(space.id_of(&feature), Some(fid));
        }
        assert_eq!(space.feature_at(space.len() as u32), None);
    }

    #[test]
    fn test_unigrams_before_bigrams() {
        let space = FeatureSpace::enumerate(3).unwrap();
        let first = space.feature_at(0).unwrap();
        assert_eq!(
            first,
            Feature::Unigram {
                offset: -2,
                word: 0,
                tag: Tag::B
            }
        );
        let first_bigram = space.feature_at(3 * NUM_TAGS as u32 * 5).unwrap();
        assert_eq!(
            first_bigram,
            Feature::Bigram {
                offset: 0,
                word: 0,
                prev: Tag::B,
                cur: Tag::B
            }
        );
    }

    #[test]
    fn test_duplicate_features_rejected() {
        let f = Feature::Unigram {
            offset: 0,
            word: 2,
            tag: Tag::S,
        };
        assert!(FeatureSpace::from_features(vec![f, f]).is_err());
    }

    #[test]
    fn test_active_features_bounds() {
        let space = FeatureSpace::enumerate(4).unwrap();
        // <START> a b <END>
        let x = [Vocabulary::START, 2, 3, Vocabulary::END];

        // Position 1: offsets -1, 0, 1, 2 are in bounds, plus one bigram
        let fids = space.active_features(&x, Tag::S, Tag::B, 1);
        assert_eq!(fids.len(), 5);
        for fid in &fids {
            assert!(space.feature_at(*fid).unwrap().fires(&x, Tag::S, Tag::B, 1));
        }

        // Position 3 (end sentinel): offsets -2, -1, 0 plus one bigram
        let fids = space.active_features(&x, Tag::E, Tag::S, 3);
        assert_eq!(fids.len(), 4);
    }

    #[test]
    fn test_bigram_never_reads_start_sentinel() {
        let bigram = Feature::Bigram {
            offset: -1,
            word: Vocabulary::START,
            prev: Tag::S,
            cur: Tag::B,
        };
        let x = [Vocabulary::START, 2, Vocabulary::END];
        assert!(!bigram.fires(&x, Tag::S, Tag::B, 1));

        let unigram = Feature::Unigram {
            offset: -1,
            word: Vocabulary::START,
            tag: Tag::B,
        };
        assert!(unigram.fires(&x, Tag::S, Tag::B, 1));
    }

    #[test]
    fn test_unknown_word_contributes_nothing() {
        let space = FeatureSpace::enumerate(3).unwrap();
        let x = [Vocabulary::START, Vocabulary::UNKNOWN, Vocabulary::END];
        let fids = space.active_features(&x, Tag::S, Tag::S, 1);
        // Only the sentinel neighbours (offsets -1 and +1) are known
        assert_eq!(fids.len(), 2);

        let weights = vec![1.0; space.len()];
        assert_eq!(space.log_potential_at(&weights, &x, Tag::S, Tag::S, 1), 2.0);
    }

    #[test]
    fn test_observe_matches_active_features() {
        let space = FeatureSpace::enumerate(5).unwrap();
        let x = [Vocabulary::START, 2, 3, 4, 2, Vocabulary::END];
        let positions = space.observe(&x);
        assert_eq!(positions.len(), x.len());

        for i in 1..x.len() {
            for &prev in &Tag::ALL {
                for &cur in &Tag::ALL {
                    let mut cached: Vec<u32> = positions[i].ids(prev, cur).collect();
                    let mut direct = space.active_features(&x, prev, cur, i);
                    cached.sort_unstable();
                    direct.sort_unstable();
                    assert_eq!(cached, direct);
                }
            }
        }
    }
}
