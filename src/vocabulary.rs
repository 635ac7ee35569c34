use std::collections::HashMap;

use crate::error::{Error, Result};

/// Word standing for the start-of-sequence sentinel
pub const START_WORD: &str = "<START>";
/// Word standing for the end-of-sequence sentinel
pub const END_WORD: &str = "<END>";

/// A bidirectional mapping between words (characters) and dense ids.
///
/// Ids 0 and 1 always belong to the start and end sentinels; every other
/// word gets the next id in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    /// Map from word to ID
    word_to_id: HashMap<String, u32>,
    /// Map from ID to word
    id_to_word: Vec<String>,
}

impl Vocabulary {
    /// Id of the start-of-sequence sentinel
    pub const START: u32 = 0;
    /// Id of the end-of-sequence sentinel
    pub const END: u32 = 1;
    /// Id given to words outside the vocabulary at inference time.
    ///
    /// No feature is ever enumerated for it.
    pub const UNKNOWN: u32 = u32::MAX;

    /// Create a vocabulary holding only the two sentinels
    pub fn new() -> Self {
        let mut vocab = Self {
            word_to_id: HashMap::new(),
            id_to_word: Vec::new(),
        };
        vocab.get_or_insert(START_WORD);
        vocab.get_or_insert(END_WORD);
        vocab
    }

    /// Rebuild a vocabulary from its id-ordered word list
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self {
            word_to_id: HashMap::new(),
            id_to_word: Vec::new(),
        };
        for word in words {
            let word = word.into();
            if vocab.word_to_id.contains_key(&word) {
                return Err(Error::invalid_model(format!(
                    "duplicate vocabulary entry {:?}",
                    word
                )));
            }
            vocab.get_or_insert(&word);
        }
        if vocab.word(Self::START) != Some(START_WORD) || vocab.word(Self::END) != Some(END_WORD)
        {
            return Err(Error::invalid_model(
                "vocabulary does not start with the sentinel words",
            ));
        }
        Ok(vocab)
    }

    /// Number of words, sentinels included
    pub fn len(&self) -> usize {
        self.id_to_word.len()
    }

    /// Always `false`: the sentinels are never removed
    pub fn is_empty(&self) -> bool {
        self.id_to_word.is_empty()
    }

    /// Get or create an ID for a word
    pub fn get_or_insert(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.word_to_id.get(word) {
            id
        } else {
            let id = self.id_to_word.len() as u32;
            self.word_to_id.insert(word.to_string(), id);
            self.id_to_word.push(word.to_string());
            id
        }
    }

    /// Look up the ID of a word
    pub fn get(&self, word: &str) -> Option<u32> {
        self.word_to_id.get(word).copied()
    }

    /// Look up a word, falling back to [`Vocabulary::UNKNOWN`]
    pub fn get_or_unknown(&self, word: &str) -> u32 {
        self.get(word).unwrap_or(Self::UNKNOWN)
    }

    /// Look up the word for an ID
    pub fn word(&self, id: u32) -> Option<&str> {
        self.id_to_word.get(id as usize).map(String::as_str)
    }

    /// Iterate over all (word, id) pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.id_to_word
            .iter()
            .enumerate()
            .map(|(id, s)| (s.as_str(), id as u32))
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
