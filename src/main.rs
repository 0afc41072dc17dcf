// main.rs

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use env_logger::Env;
use log::{info, LevelFilter};

use ssentencepiece::tokenizer::combine_files;
use ssentencepiece::tokenizer::stream::{
    join_ids, join_pieces, read_lines, split_ids, split_pieces, write_lines,
};
use ssentencepiece::{BatchExecutor, Result, TokenFormat, TokenizerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Subword tokenizer over score-annotated vocabularies", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode text lines into pieces or ids
    Encode(EncodeArgs),
    /// Decode lines of pieces or ids back into text
    Decode(DecodeArgs),
    /// Merge vocabularies into one (the same piece keeps its best score)
    Combine(CombineArgs),
}

#[derive(Args, Debug)]
struct TokenizerArgs {
    /// Vocabulary file (`piece<TAB>score` per line)
    #[arg(long, value_name = "PATH", required_unless_present = "config")]
    vocab: Option<PathBuf>,

    /// JSON tokenizer config; `--vocab`/`--threads` override its fields
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Worker threads for batch encode/decode (default: hardware concurrency)
    #[arg(long, value_name = "N")]
    threads: Option<usize>,
}

impl TokenizerArgs {
    /// Loads `--config` if given, then applies `--vocab` and `--threads` on top.
    fn to_config(&self) -> Result<TokenizerConfig> {
        let mut config = match (&self.config, &self.vocab) {
            (Some(path), _) => TokenizerConfig::from_json_file(path)?,
            (None, Some(vocab)) => TokenizerConfig::new(vocab),
            (None, None) => Cli::command()
                .error(
                    ErrorKind::MissingRequiredArgument,
                    "either --vocab or --config is required",
                )
                .exit(),
        };
        if let Some(vocab) = &self.vocab {
            config.vocab = vocab.clone();
        }
        if let Some(threads) = self.threads {
            config.num_threads = threads.max(1);
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[command(flatten)]
    tokenizer: TokenizerArgs,

    /// Text file to encode, one sentence per line (default: stdin)
    #[arg(long, value_name = "PATH")]
    texts: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Output tokens as pieces or ids [possible values: piece, id]
    #[arg(long, value_name = "FORMAT", default_value = "piece")]
    output_format: TokenFormat,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    #[command(flatten)]
    tokenizer: TokenizerArgs,

    /// Space-separated pieces or ids, one sequence per line (default: stdin)
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Input tokens are pieces or ids [possible values: piece, id]
    #[arg(long, value_name = "FORMAT", default_value = "piece")]
    input_format: TokenFormat,
}

#[derive(Args, Debug)]
struct CombineArgs {
    /// Vocabularies to merge
    #[arg(required = true, num_args = 1..)]
    vocabs: Vec<PathBuf>,

    /// Merged vocabulary (`-` for stdout)
    output: PathBuf,

    /// Show a progress bar while reading inputs
    #[arg(long)]
    progress: bool,
}

fn init_logging(verbose: u8, quiet: u8) {
    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn read_input(path: Option<&Path>) -> Result<Vec<String>> {
    match path {
        Some(path) => read_lines(BufReader::new(File::open(path)?)),
        None => read_lines(io::stdin().lock()),
    }
}

fn write_output<S: AsRef<str>>(path: Option<&Path>, lines: &[S]) -> Result<()> {
    match path {
        Some(path) => write_lines(BufWriter::new(File::create(path)?), lines),
        None => write_lines(BufWriter::new(io::stdout().lock()), lines),
    }
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let config = args.tokenizer.to_config()?;
    let batch = BatchExecutor::from_config(&config)?;
    let texts = read_input(args.texts.as_deref())?;

    let lines: Vec<String> = match args.output_format {
        TokenFormat::Piece => batch
            .encode_batch_as_pieces(&texts)
            .iter()
            .map(|pieces| join_pieces(pieces))
            .collect(),
        TokenFormat::Id => batch
            .encode_batch_as_ids(&texts)?
            .iter()
            .map(|ids| join_ids(ids))
            .collect(),
    };

    write_output(args.output.as_deref(), &lines)?;
    info!("encoded {} lines with {} workers", lines.len(), batch.num_threads());
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    let config = args.tokenizer.to_config()?;
    let batch = BatchExecutor::from_config(&config)?;
    let lines = read_input(args.input.as_deref())?;

    let texts = match args.input_format {
        TokenFormat::Piece => {
            let sequences: Vec<Vec<String>> = lines.iter().map(|line| split_pieces(line)).collect();
            batch.decode_batch_pieces(&sequences)?
        }
        TokenFormat::Id => {
            let sequences = lines
                .iter()
                .enumerate()
                .map(|(i, line)| split_ids(i, line))
                .collect::<Result<Vec<_>>>()?;
            batch.decode_batch_ids(&sequences)?
        }
    };

    write_output(args.output.as_deref(), &texts)?;
    info!("decoded {} lines with {} workers", texts.len(), batch.num_threads());
    Ok(())
}

fn run_combine(args: CombineArgs) -> Result<()> {
    combine_files(&args.vocabs, &args.output, args.progress)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Encode(args) => run_encode(args),
        Commands::Decode(args) => run_decode(args),
        Commands::Combine(args) => run_combine(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn tokenizer_args(argv: &[&str]) -> TokenizerArgs {
        let cli = Cli::try_parse_from(argv.iter().copied()).unwrap();
        match cli.command {
            Commands::Encode(args) => args.tokenizer,
            Commands::Decode(args) => args.tokenizer,
            Commands::Combine(_) => panic!("no tokenizer arguments"),
        }
    }

    #[test]
    fn test_vocab_and_threads() {
        let args = tokenizer_args(&["ssentencepiece", "encode", "--vocab", "a.vocab", "--threads", "0"]);
        let config = args.to_config().unwrap();
        assert_eq!(config.vocab, PathBuf::from("a.vocab"));
        assert_eq!(config.num_threads, 1);
    }

    #[test]
    fn test_command_line_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"vocab": "from_file.vocab", "num_threads": 3, "decode_errors": "replace"}}"#).unwrap();
        let config_path = file.path().to_str().unwrap();

        let config = tokenizer_args(&["ssentencepiece", "decode", "--config", config_path])
            .to_config()
            .unwrap();
        assert_eq!(config.vocab, PathBuf::from("from_file.vocab"));
        assert_eq!(config.num_threads, 3);

        let config = tokenizer_args(&[
            "ssentencepiece", "decode", "--config", config_path, "--vocab", "b.vocab", "--threads", "5",
        ])
        .to_config()
        .unwrap();
        assert_eq!(config.vocab, PathBuf::from("b.vocab"));
        assert_eq!(config.num_threads, 5);
        assert_eq!(config.decode_errors, ssentencepiece::DecodePolicy::Replace);
    }

    #[test]
    fn test_vocab_or_config_is_required() {
        let err = Cli::try_parse_from(["ssentencepiece", "encode"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_token_formats() {
        let cli = Cli::try_parse_from([
            "ssentencepiece", "encode", "--vocab", "a.vocab", "--output-format", "id",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Encode(EncodeArgs { output_format: TokenFormat::Id, .. })));

        let cli = Cli::try_parse_from(["ssentencepiece", "decode", "--vocab", "a.vocab"]).unwrap();
        assert!(matches!(cli.command, Commands::Decode(DecodeArgs { input_format: TokenFormat::Piece, .. })));

        assert!(Cli::try_parse_from([
            "ssentencepiece", "decode", "--vocab", "a.vocab", "--input-format", "bytes",
        ])
        .is_err());
    }

    #[test]
    fn test_combine_arguments() {
        let cli = Cli::try_parse_from(["ssentencepiece", "combine", "a.vocab", "b.vocab", "-"]).unwrap();
        let Commands::Combine(args) = cli.command else {
            panic!("expected combine");
        };
        assert_eq!(args.vocabs, vec![PathBuf::from("a.vocab"), PathBuf::from("b.vocab")]);
        assert_eq!(args.output, PathBuf::from("-"));
        assert!(!args.progress);
    }
}
