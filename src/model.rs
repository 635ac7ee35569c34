use std::fs;
use std::io::{self, Cursor, Seek, Write};
use std::path::Path;

use bstr::ByteSlice;
use cqdb::CQDB;
use log::info;

use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureSpace};
use crate::model_writer::{
    ModelWriter, CHUNK_SIZE, FEATURE_SIZE, FORMAT_VERSION, HEADER_SIZE, KIND_BIGRAM,
    KIND_UNIGRAM, MAGIC,
};
use crate::tag::{Tag, NUM_TAGS};
use crate::tagger::Tagger;
use crate::vocabulary::Vocabulary;

/// Default location of the trained model
pub const DEFAULT_MODEL_PATH: &str = "model/linear_crf.model";

#[inline]
fn unpack_u32(buf: &[u8], index: usize) -> Result<u32> {
    match buf.get(index..index + 4) {
        Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(Error::invalid_model("not enough data for unpacking u32")),
    }
}

#[inline]
fn unpack_i32(buf: &[u8], index: usize) -> Result<i32> {
    unpack_u32(buf, index).map(|v| v as i32)
}

#[inline]
fn unpack_f64(buf: &[u8], index: usize) -> Result<f64> {
    match buf.get(index..index + 8) {
        Some(b) => Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ])),
        None => Err(Error::invalid_model("not enough data for unpacking f64")),
    }
}

/// Check a chunk tag at `offset` and return the entry count it declares.
///
/// The count must fit in the rest of the buffer with `entry_size` bytes per entry.
fn chunk_count(buf: &[u8], offset: usize, tag: &[u8; 4], entry_size: usize) -> Result<usize> {
    if buf.get(offset..offset + 4) != Some(&tag[..]) {
        return Err(Error::invalid_model(format!(
            "missing {} chunk",
            tag.as_bstr()
        )));
    }
    let count = unpack_u32(buf, offset + 8)? as usize;
    let end = count
        .checked_mul(entry_size)
        .and_then(|size| size.checked_add(offset + CHUNK_SIZE));
    match end {
        Some(end) if end <= buf.len() => Ok(count),
        _ => Err(Error::invalid_model(format!(
            "{} chunk declares {} entries past the end of the model",
            tag.as_bstr(),
            count
        ))),
    }
}

fn read_floats(buf: &[u8], offset: usize, tag: &[u8; 4]) -> Result<Vec<f64>> {
    let count = chunk_count(buf, offset, tag, 8)?;
    let start = offset + CHUNK_SIZE;
    (0..count)
        .map(|k| unpack_f64(buf, start + 8 * k))
        .collect()
}

fn read_tag(value: u32) -> Result<Tag> {
    Tag::from_index(value as usize)
        .ok_or_else(|| Error::invalid_model(format!("invalid tag id {}", value)))
}

fn read_features(buf: &[u8], offset: usize) -> Result<Vec<Feature>> {
    let count = chunk_count(buf, offset, b"FEAT", FEATURE_SIZE)?;
    let mut features = Vec::with_capacity(count);
    for k in 0..count {
        let index = offset + CHUNK_SIZE + FEATURE_SIZE * k;
        let kind = unpack_u32(buf, index)?;
        let pos = unpack_i32(buf, index + 4)?;
        let word = unpack_u32(buf, index + 8)?;
        let prev = unpack_u32(buf, index + 12)?;
        let cur = read_tag(unpack_u32(buf, index + 16)?)?;
        let feature = match kind {
            KIND_UNIGRAM => Feature::Unigram {
                offset: pos,
                word,
                tag: cur,
            },
            KIND_BIGRAM => Feature::Bigram {
                offset: pos,
                word,
                prev: read_tag(prev)?,
                cur,
            },
            _ => {
                return Err(Error::invalid_model(format!(
                    "unknown feature kind {}",
                    kind
                )))
            }
        };
        features.push(feature);
    }
    Ok(features)
}

fn read_words(buf: &[u8], offset: usize, num_words: u32) -> Result<Vocabulary> {
    let data = buf
        .get(offset..)
        .ok_or_else(|| Error::invalid_model("vocabulary offset out of range"))?;
    let db = CQDB::new(data).map_err(|e| Error::invalid_model(e.to_string()))?;
    // Every stored word takes at least one byte of the database
    let mut words = Vec::with_capacity((num_words as usize).min(data.len()));
    for id in 0..num_words {
        let word = db
            .to_str(id)
            .and_then(|s| s.to_str().ok())
            .ok_or_else(|| Error::invalid_model(format!("missing word #{}", id)))?;
        words.push(word.to_string());
    }
    Vocabulary::from_words(words)
}

/// The trained CRF model: vocabulary, feature space and weights.
///
/// A model is read-only; tagging borrows it through a [`Tagger`].
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    words: Vocabulary,
    features: FeatureSpace,
    weights: Vec<f64>,
    /// Empirical feature counts of the training corpus, empty if unknown
    prior_counts: Vec<f64>,
}

impl Model {
    /// Assemble a model, checking that every table agrees on its sizes
    pub fn new(
        words: Vocabulary,
        features: FeatureSpace,
        weights: Vec<f64>,
        prior_counts: Vec<f64>,
    ) -> Result<Self> {
        if weights.len() != features.len() {
            return Err(Error::invalid_model(format!(
                "{} weights for {} features",
                weights.len(),
                features.len()
            )));
        }
        if !prior_counts.is_empty() && prior_counts.len() != features.len() {
            return Err(Error::invalid_model(format!(
                "{} prior counts for {} features",
                prior_counts.len(),
                features.len()
            )));
        }
        if let Some(index) = weights.iter().position(|w| !w.is_finite()) {
            return Err(Error::NonFiniteWeight { index });
        }
        let num_words = words.len() as u32;
        let in_vocab = |feature: &Feature| match *feature {
            Feature::Unigram { word, .. } | Feature::Bigram { word, .. } => word < num_words,
        };
        if !features.iter().all(in_vocab) {
            return Err(Error::invalid_model("feature refers to an unknown word"));
        }
        Ok(Self {
            words,
            features,
            weights,
            prior_counts,
        })
    }

    /// Decode a model from memory
    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::invalid_model("invalid model format"));
        }
        if &buf[0..4] != MAGIC {
            return Err(Error::invalid_model("invalid file format, magic mismatch"));
        }
        let version = unpack_u32(buf, 8)?;
        if version != FORMAT_VERSION {
            return Err(Error::invalid_model(format!(
                "unsupported format version {}",
                version
            )));
        }
        let num_tags = unpack_u32(buf, 12)?;
        if num_tags as usize != NUM_TAGS {
            return Err(Error::invalid_model(format!(
                "model has {} tags, expected {}",
                num_tags, NUM_TAGS
            )));
        }
        let num_words = unpack_u32(buf, 16)?;
        let num_features = unpack_u32(buf, 20)? as usize;
        let off_features = unpack_u32(buf, 24)? as usize;
        let off_weights = unpack_u32(buf, 28)? as usize;
        let off_prior = unpack_u32(buf, 32)? as usize;
        let off_words = unpack_u32(buf, 36)? as usize;

        let features = read_features(buf, off_features)?;
        if features.len() != num_features {
            return Err(Error::invalid_model("feature count mismatch"));
        }
        let weights = read_floats(buf, off_weights, b"WGHT")?;
        let prior_counts = read_floats(buf, off_prior, b"PRIO")?;
        let words = read_words(buf, off_words, num_words)?;

        Self::new(
            words,
            FeatureSpace::from_features(features)?,
            weights,
            prior_counts,
        )
    }

    /// Load a model from a file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path.as_ref())?;
        let model = Self::read(&buf)?;
        info!(
            "Loaded model from {} ({} words, {} features)",
            path.as_ref().display(),
            model.num_words(),
            model.num_features()
        );
        Ok(model)
    }

    /// Encode the model into `writer`
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        ModelWriter::write(writer, self)
    }

    /// Save the model to a file, creating parent directories as needed.
    ///
    /// The model is fully encoded before the file is created.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut buf = Cursor::new(Vec::new());
        self.write(&mut buf)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, buf.into_inner())?;
        info!("Saved model to {}", path.display());
        Ok(())
    }

    /// Number of words, sentinels included
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn words(&self) -> &Vocabulary {
        &self.words
    }

    pub fn features(&self) -> &FeatureSpace {
        &self.features
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn prior_counts(&self) -> &[f64] {
        &self.prior_counts
    }

    /// Weight of a feature; features outside the model weigh zero
    pub fn weight(&self, feature: &Feature) -> f64 {
        self.features
            .id_of(feature)
            .map_or(0.0, |fid| self.weights[fid as usize])
    }

    /// Get a new tagger
    pub fn tagger(&self) -> Tagger<'_> {
        Tagger::new(self)
    }

    /// Print the model in human-readable format.
    ///
    /// Features with a zero weight are left out.
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "FILEHEADER = {{")?;
        writeln!(w, "  magic: {}", MAGIC.as_bstr())?;
        writeln!(w, "  version: {}", FORMAT_VERSION)?;
        writeln!(w, "  num_tags: {}", NUM_TAGS)?;
        writeln!(w, "  num_words: {}", self.num_words())?;
        writeln!(w, "  num_features: {}", self.num_features())?;
        writeln!(w, "}}\n")?;

        writeln!(w, "WORDS = {{")?;
        for (word, id) in self.words.iter() {
            writeln!(w, "  {:>5}: {}", id, word)?;
        }
        writeln!(w, "}}\n")?;

        let word = |id: u32| self.words.word(id).unwrap_or("?");
        writeln!(w, "UNIGRAMS = {{")?;
        for (feature, &weight) in self.features.iter().zip(&self.weights) {
            if let Feature::Unigram { offset, word: wid, tag } = *feature {
                if weight != 0.0 {
                    writeln!(w, "  ({:+}) {} --> {}: {:.6}", offset, word(wid), tag, weight)?;
                }
            }
        }
        writeln!(w, "}}\n")?;

        writeln!(w, "BIGRAMS = {{")?;
        for (feature, &weight) in self.features.iter().zip(&self.weights) {
            if let Feature::Bigram {
                offset,
                word: wid,
                prev,
                cur,
            } = *feature
            {
                if weight != 0.0 {
                    writeln!(
                        w,
                        "  ({:+}) {} {} --> {}: {:.6}",
                        offset,
                        word(wid),
                        prev,
                        cur,
                        weight
                    )?;
                }
            }
        }
        writeln!(w, "}}\n")?;
        Ok(())
    }
}
