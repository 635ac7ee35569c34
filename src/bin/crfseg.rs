use std::io::{self, prelude::*, BufWriter};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::error;

use crfseg::train::{train_file, Trainer};
use crfseg::{Model, Result, DEFAULT_MODEL_PATH};

#[derive(Parser, Debug)]
#[command(about = "Word segmentation with a linear-chain CRF.")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model on a corpus of `<character> <tag>` lines
    Train {
        /// The training corpus; sentences are separated by blank lines
        corpus: PathBuf,

        /// The file to write the trained model to
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// The L2 regularization coefficient
        #[arg(long, default_value = "1e-4")]
        theta: f64,

        /// The maximum number of L-BFGS iterations
        #[arg(long, default_value = "1000")]
        max_iterations: usize,
    },

    /// Segment the lines read from stdin
    Tag {
        /// The model file
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// Print the tags instead of the words
        #[arg(long)]
        tags: bool,
    },

    /// Print a model in a human-readable form
    Dump {
        /// The model file
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
    },
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Train {
            corpus,
            model,
            theta,
            max_iterations,
        } => {
            let trainer = Trainer::new()
                .with_theta(theta)?
                .with_max_iterations(max_iterations)?;
            train_file(&corpus, &model, trainer)?;
        }
        Command::Tag { model, tags } => {
            let model = Model::open(&model)?;
            let tagger = model.tagger();
            let stdin = io::stdin();
            let mut out = BufWriter::new(io::stdout().lock());
            for line in stdin.lock().lines() {
                let line = line?;
                if tags {
                    let tags: Vec<String> = tagger
                        .tag_text(&line)
                        .iter()
                        .map(|t| t.to_string())
                        .collect();
                    writeln!(out, "{}", tags.join(" "))?;
                } else {
                    writeln!(out, "{}", tagger.segment(&line).join(" "))?;
                }
            }
            out.flush()?;
        }
        Command::Dump { model } => {
            let model = Model::open(&model)?;
            let mut out = BufWriter::new(io::stdout().lock());
            model.dump(&mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        error!("{}", err);
        std::process::exit(err.exit_code());
    }
}
