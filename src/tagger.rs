use crate::context::{Context, Flag};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::tag::Tag;
use crate::vocabulary::Vocabulary;

/// The tagger predicts B/I/E/S tags for character sequences using a model.
///
/// Characters missing from the vocabulary get no feature at all, so they
/// still receive a tag instead of failing the lookup.
#[derive(Debug, Clone)]
pub struct Tagger<'a> {
    /// CRF model
    model: &'a Model,
}

impl<'a> Tagger<'a> {
    pub(crate) fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// Bracketed word ids of a character sequence
    fn encode<S: AsRef<str>>(&self, chars: &[S]) -> Vec<u32> {
        let words = self.model.words();
        let mut x = Vec::with_capacity(chars.len() + 2);
        x.push(Vocabulary::START);
        x.extend(chars.iter().map(|c| words.get_or_unknown(c.as_ref())));
        x.push(Vocabulary::END);
        x
    }

    fn context<S: AsRef<str>>(&self, chars: &[S], flag: Flag) -> Context {
        let x = self.encode(chars);
        let positions = self.model.features().observe(&x);
        let mut ctx = Context::new(flag);
        ctx.compute_potentials(self.model.weights(), &positions);
        ctx
    }

    /// Predict the tag sequence for a sequence of characters (or tokens).
    pub fn tag<S: AsRef<str>>(&self, chars: &[S]) -> Vec<Tag> {
        if chars.is_empty() {
            return Vec::new();
        }
        let mut ctx = self.context(chars, Flag::VITERBI);
        let (tags, _score) = ctx.viterbi();
        tags
    }

    /// Predict the tag sequence for the characters of `text`
    pub fn tag_text(&self, text: &str) -> Vec<Tag> {
        let chars = split_chars(text);
        self.tag(&chars)
    }

    /// Split `text` into words using the predicted tags.
    ///
    /// A word closes on `E` or `S`, and at the end of the text.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let chars = split_chars(text);
        let tags = self.tag(&chars);
        let mut words = Vec::new();
        let mut current = String::new();
        for (c, tag) in chars.iter().zip(tags) {
            current.push_str(c);
            if tag.closes_word() {
                words.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    }

    /// `log p(tags | chars)` under the model
    pub fn log_probability<S: AsRef<str>>(&self, chars: &[S], tags: &[Tag]) -> Result<f64> {
        if chars.len() != tags.len() {
            return Err(Error::InvalidInput(format!(
                "{} characters but {} tags",
                chars.len(),
                tags.len()
            )));
        }
        let mut ctx = self.context(chars, Flag::MARGINALS);
        ctx.forward();
        let mut labels = Vec::with_capacity(tags.len() + 2);
        labels.push(Tag::START);
        labels.extend_from_slice(tags);
        labels.push(Tag::END);
        Ok(ctx.log_probability(&labels))
    }
}

fn split_chars(text: &str) -> Vec<&str> {
    text.char_indices()
        .map(|(i, c)| &text[i..i + c.len_utf8()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, FeatureSpace};

    /// A hand-weighted model: "a" starts words, "b" ends them, "c" stands alone
    fn toy_model() -> Model {
        let mut words = Vocabulary::new();
        let a = words.get_or_insert("a");
        let b = words.get_or_insert("b");
        let c = words.get_or_insert("c");
        let features = FeatureSpace::enumerate(words.len()).unwrap();
        let mut weights = vec![0.0; features.len()];
        for (word, tag) in [(a, Tag::B), (b, Tag::E), (c, Tag::S)] {
            let fid = features
                .id_of(&Feature::Unigram {
                    offset: 0,
                    word,
                    tag,
                })
                .unwrap();
            weights[fid as usize] = 5.0;
        }
        Model::new(words, features, weights, vec![]).unwrap()
    }

    #[test]
    fn test_tag() {
        let model = toy_model();
        let tagger = model.tagger();
        assert_eq!(tagger.tag(&["a", "b", "c"]), vec![Tag::B, Tag::E, Tag::S]);
        assert_eq!(tagger.tag_text("cab"), vec![Tag::S, Tag::B, Tag::E]);
        assert!(tagger.tag::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_unknown_characters() {
        let model = toy_model();
        let tagger = model.tagger();
        let tags = tagger.tag_text("a?b!");
        assert_eq!(tags.len(), 4);
        assert_eq!(tags[0], Tag::B);
    }

    #[test]
    fn test_segment() {
        let model = toy_model();
        let tagger = model.tagger();
        assert_eq!(tagger.segment("abcab"), vec!["ab", "c", "ab"]);
        assert!(tagger.segment("").is_empty());
    }

    #[test]
    fn test_log_probability() {
        let model = toy_model();
        let tagger = model.tagger();
        let best = tagger
            .log_probability(&["a", "b"], &[Tag::B, Tag::E])
            .unwrap();
        let worse = tagger
            .log_probability(&["a", "b"], &[Tag::S, Tag::S])
            .unwrap();
        assert!(best < 0.0);
        assert!(best > worse);
        assert!(tagger.log_probability(&["a"], &[]).is_err());
    }
}
