//! Linear-chain Conditional Random Fields for character tagging
//!
//! Every character of a sentence receives one of the tags `B` (begins a
//! word), `I` (inside a word), `E` (ends a word) or `S` (single-character
//! word). The features are unigram and bigram indicators over a window of
//! neighbouring characters, and training maximizes the L2-regularized
//! log-likelihood with L-BFGS.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use crfseg::train::{Lbfgs, Trainer};
//! use crfseg::Tag;
//!
//! let mut trainer = Trainer::new().with_theta(1e-4)?;
//! trainer.append(&["今", "晚"], &[Tag::B, Tag::E])?;
//! trainer.append(&["美"], &[Tag::S])?;
//!
//! let model = trainer.train(&Lbfgs::default())?;
//! model.save("model/linear_crf.model")?;
//! # Ok::<(), crfseg::Error>(())
//! ```
//!
//! ## Tagging
//!
//! ```no_run
//! use crfseg::Model;
//!
//! let model = Model::open("model/linear_crf.model")?;
//! let tagger = model.tagger();
//!
//! let tags = tagger.tag(&["今", "晚"]);
//! let words = tagger.segment("今晚月色真美");
//! # Ok::<(), crfseg::Error>(())
//! ```

mod context;
mod dataset;
mod error;
mod feature;
mod model;
mod model_writer;
mod tag;
mod tagger;
mod vocabulary;

/// Training module containing all components for fitting models
pub mod train;

pub use self::context::{logsumexp, Context, Flag};
pub use self::dataset::Instance;
pub use self::error::{Error, Result};
pub use self::feature::{Feature, FeatureSpace, PositionFeatures, BIGRAM_OFFSETS, UNIGRAM_OFFSETS};
pub use self::model::{Model, DEFAULT_MODEL_PATH};
pub use self::tag::{Tag, NUM_TAGS};
pub use self::tagger::Tagger;
pub use self::vocabulary::{Vocabulary, END_WORD, START_WORD};

// Re-export training types for convenience
pub use self::train::{Lbfgs, Trainer};
