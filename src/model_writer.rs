use std::io::{Seek, SeekFrom, Write};

use cqdb::CQDBWriter;

use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::model::Model;
use crate::tag::NUM_TAGS;
use crate::vocabulary::Vocabulary;

pub(crate) const MAGIC: &[u8; 4] = b"wCRF";
pub(crate) const FORMAT_VERSION: u32 = 1;
pub(crate) const HEADER_SIZE: usize = 44;
pub(crate) const CHUNK_SIZE: usize = 12;
pub(crate) const FEATURE_SIZE: usize = 20;

pub(crate) const KIND_UNIGRAM: u32 = 0;
pub(crate) const KIND_BIGRAM: u32 = 1;

/// Section offsets, relative to the start of the model
#[derive(Debug, Default)]
struct Offsets {
    features: u32,
    weights: u32,
    prior: u32,
    words: u32,
    size: u32,
}

/// Write a trained CRF model
pub struct ModelWriter;

impl ModelWriter {
    /// Write `model` to `writer` in the versioned binary format.
    ///
    /// The header is written twice: first as a placeholder, then again with
    /// the section offsets once they are known.
    pub fn write<W: Write + Seek>(writer: &mut W, model: &Model) -> Result<()> {
        let begin = writer.stream_position()?;
        let rel_pos = |w: &mut W| -> Result<u32> {
            let pos = w.stream_position()? - begin;
            u32::try_from(pos)
                .map_err(|_| Error::invalid_model("model size exceeds u32::MAX"))
        };

        Self::write_header(writer, model, &Offsets::default())?;

        let mut offsets = Offsets::default();
        offsets.features = rel_pos(writer)?;
        Self::write_features(writer, model.features().iter())?;

        offsets.weights = rel_pos(writer)?;
        Self::write_floats(writer, b"WGHT", model.weights())?;

        offsets.prior = rel_pos(writer)?;
        Self::write_floats(writer, b"PRIO", model.prior_counts())?;

        offsets.words = rel_pos(writer)?;
        Self::write_cqdb(writer, model.words())?;

        offsets.size = rel_pos(writer)?;
        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(begin))?;
        Self::write_header(writer, model, &offsets)?;
        writer.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    fn write_header<W: Write>(writer: &mut W, model: &Model, offsets: &Offsets) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&(HEADER_SIZE as u32).to_le_bytes())?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(NUM_TAGS as u32).to_le_bytes())?;
        writer.write_all(&count_u32(model.num_words())?.to_le_bytes())?;
        writer.write_all(&count_u32(model.num_features())?.to_le_bytes())?;
        writer.write_all(&offsets.features.to_le_bytes())?;
        writer.write_all(&offsets.weights.to_le_bytes())?;
        writer.write_all(&offsets.prior.to_le_bytes())?;
        writer.write_all(&offsets.words.to_le_bytes())?;
        writer.write_all(&offsets.size.to_le_bytes())?;
        Ok(())
    }

    /// Write the feature table, one 20-byte entry per feature in id order
    fn write_features<'a, W, I>(writer: &mut W, features: I) -> Result<()>
    where
        W: Write,
        I: ExactSizeIterator<Item = &'a Feature>,
    {
        let num_features = count_u32(features.len())?;
        let chunk_size = CHUNK_SIZE as u64 + u64::from(num_features) * FEATURE_SIZE as u64;
        writer.write_all(b"FEAT")?;
        writer.write_all(&count_u32_u64(chunk_size)?.to_le_bytes())?;
        writer.write_all(&num_features.to_le_bytes())?;

        for feature in features {
            let (kind, offset, word, prev, cur) = match *feature {
                Feature::Unigram { offset, word, tag } => {
                    (KIND_UNIGRAM, offset, word, 0, tag.index() as u32)
                }
                Feature::Bigram {
                    offset,
                    word,
                    prev,
                    cur,
                } => (
                    KIND_BIGRAM,
                    offset,
                    word,
                    prev.index() as u32,
                    cur.index() as u32,
                ),
            };
            writer.write_all(&kind.to_le_bytes())?;
            writer.write_all(&offset.to_le_bytes())?;
            writer.write_all(&word.to_le_bytes())?;
            writer.write_all(&prev.to_le_bytes())?;
            writer.write_all(&cur.to_le_bytes())?;
        }
        Ok(())
    }

    fn write_floats<W: Write>(writer: &mut W, tag: &[u8; 4], values: &[f64]) -> Result<()> {
        let count = count_u32(values.len())?;
        let chunk_size = CHUNK_SIZE as u64 + u64::from(count) * 8;
        writer.write_all(tag)?;
        writer.write_all(&count_u32_u64(chunk_size)?.to_le_bytes())?;
        writer.write_all(&count.to_le_bytes())?;
        for value in values {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    /// Write the vocabulary as a CQDB database
    fn write_cqdb<W: Write + Seek>(writer: &mut W, words: &Vocabulary) -> Result<()> {
        let mut db = CQDBWriter::new(&mut *writer)?;
        for (word, id) in words.iter() {
            db.put(word, id)?;
        }
        // CQDBWriter writes its tables when dropped and cannot report
        // errors from that final flush.
        drop(db);
        Ok(())
    }
}

fn count_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::invalid_model("count exceeds u32::MAX"))
}

fn count_u32_u64(n: u64) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::invalid_model("chunk size exceeds u32::MAX"))
}
