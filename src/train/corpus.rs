use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};
use crate::tag::Tag;

/// A gold-tagged sentence
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sentence {
    /// Characters (or tokens), one per corpus line
    pub chars: Vec<String>,
    /// Tag of each character
    pub tags: Vec<Tag>,
}

impl Sentence {
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Read a corpus of `<character> <tag>` lines.
///
/// A blank line ends a sentence. The last sentence does not need a trailing
/// blank line, and runs of blank lines never produce empty sentences.
pub fn read_corpus<R: BufRead>(reader: R) -> Result<Vec<Sentence>> {
    let mut sentences = Vec::new();
    let mut sentence = Sentence::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = i + 1;
        let mut fields = line.split_whitespace();
        let (c, tag) = match (fields.next(), fields.next(), fields.next()) {
            (None, _, _) => {
                if !sentence.is_empty() {
                    sentences.push(std::mem::take(&mut sentence));
                }
                continue;
            }
            (Some(c), Some(tag), None) => (c, tag),
            _ => {
                let found = line.split_whitespace().count();
                return Err(Error::format(
                    lineno,
                    format!("expected 2 fields, found {}", found),
                ));
            }
        };
        let tag = tag
            .parse::<Tag>()
            .map_err(|message| Error::format(lineno, message))?;
        sentence.chars.push(c.to_string());
        sentence.tags.push(tag);
    }
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
    Ok(sentences)
}

/// Read a corpus file, see [`read_corpus`]
pub fn read_corpus_file<P: AsRef<Path>>(path: P) -> Result<Vec<Sentence>> {
    let file = File::open(path)?;
    read_corpus(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_corpus() {
        let sentences = read_corpus("今 B\n晚 E\n\n美 S\n".as_bytes()).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].chars, vec!["今", "晚"]);
        assert_eq!(sentences[0].tags, vec![Tag::B, Tag::E]);
        assert_eq!(sentences[1].chars, vec!["美"]);
        assert_eq!(sentences[1].tags, vec![Tag::S]);
    }

    #[test]
    fn test_blank_lines() {
        let text = "\n\n a\tB \r\nb E\r\n\n\n  \nc S";
        let sentences = read_corpus(text.as_bytes()).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].chars, vec!["a", "b"]);
        assert_eq!(sentences[1].tags, vec![Tag::S]);
    }

    #[test]
    fn test_malformed_lines() {
        let err = read_corpus("a B\nb\n".as_bytes()).unwrap_err();
        match err {
            Error::Format { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {}", other),
        }

        let err = read_corpus("a B extra\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("expected 2 fields, found 3"));

        let err = read_corpus("a X\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Format { line: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = read_corpus_file("/nonexistent/corpus.txt").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.exit_code(), 3);
    }
}
