// src/tokenizer/combiner.rs
//
// Merges several vocabulary files into one. The output line order is the id
// assignment of the merged vocabulary:
//   1. special pieces, by the smallest line index they were seen at;
//   2. byte pieces, sorted by surface;
//   3. normal pieces, sorted by surface, each with its best score.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info};

use crate::tokenizer::progress::FileProgress;
use crate::tokenizer::vocab::{parse_line, PieceKind};
use crate::tokenizer::Result;

#[derive(Debug, Clone, Copy)]
struct SpecialRank {
    line: usize,
    /// Order of first sighting, breaks ties between equal line indices.
    seen: usize,
}

#[derive(Debug, Default, Clone)]
pub struct VocabCombiner {
    special: HashMap<String, SpecialRank>,
    byte: BTreeSet<String>,
    normal: BTreeMap<String, f64>,
    sources: usize,
}

impl VocabCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.add_reader(BufReader::new(File::open(path)?))?;
        debug!(
            "merged {} (now {} special, {} byte, {} normal)",
            path.display(),
            self.special.len(),
            self.byte.len(),
            self.normal.len()
        );
        Ok(())
    }

    /// Folds one vocabulary source in. Ids of the source are ignored; only the
    /// surface, its line index and its score matter.
    pub fn add_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let (surface, score) = parse_line(index, &line)?;
            match PieceKind::classify(surface) {
                PieceKind::Special => {
                    let seen = self.special.len();
                    self.special
                        .entry(surface.to_string())
                        .and_modify(|rank| rank.line = rank.line.min(index))
                        .or_insert(SpecialRank { line: index, seen });
                }
                PieceKind::Byte => {
                    self.byte.insert(surface.to_string());
                }
                PieceKind::Normal => {
                    self.normal
                        .entry(surface.to_string())
                        .and_modify(|best| *best = best.max(score))
                        .or_insert(score);
                }
            }
        }
        self.sources += 1;
        Ok(())
    }

    pub fn num_sources(&self) -> usize {
        self.sources
    }

    fn ordered_specials(&self) -> Vec<&String> {
        let mut special: Vec<(&String, &SpecialRank)> = self.special.iter().collect();
        special.sort_by_key(|(_, rank)| (rank.line, rank.seen));
        special.into_iter().map(|(surface, _)| surface).collect()
    }

    /// The merged vocabulary in output order. Special and byte scores are 0.
    pub fn entries(&self) -> Vec<(String, f64)> {
        let mut entries = Vec::with_capacity(self.special.len() + self.byte.len() + self.normal.len());
        entries.extend(self.ordered_specials().into_iter().map(|surface| (surface.clone(), 0.0)));
        entries.extend(self.byte.iter().map(|surface| (surface.clone(), 0.0)));
        entries.extend(self.normal.iter().map(|(surface, &score)| (surface.clone(), score)));
        entries
    }

    /// Writes `surface<TAB>score` lines and returns how many were written.
    /// Special and byte pieces get a bare `0`, normal scores are written like
    /// Python floats (`-1.0`, `1e-05`).
    pub fn write_to<W: Write>(&self, writer: W) -> Result<usize> {
        let mut writer = BufWriter::new(writer);
        let mut written = 0;
        for surface in self.ordered_specials().into_iter().chain(&self.byte) {
            writeln!(writer, "{surface}\t0")?;
            written += 1;
        }
        for (surface, &score) in &self.normal {
            writeln!(writer, "{surface}\t{}", format_score(score))?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}

/// Shortest round-trip rendering with Python's float spelling: always a
/// fraction or exponent, and a signed two-digit exponent.
fn format_score(score: f64) -> String {
    let text = format!("{score:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

/// Merges in-memory sources; handy when the vocabularies are not on disk.
pub fn combine<R, I>(sources: I) -> Result<Vec<(String, f64)>>
where
    R: BufRead,
    I: IntoIterator<Item = R>,
{
    let mut combiner = VocabCombiner::new();
    for source in sources {
        combiner.add_reader(source)?;
    }
    Ok(combiner.entries())
}

/// Merges vocabulary files into `output` (`-` for stdout). Returns the number
/// of pieces written.
pub fn combine_files<P, Q>(inputs: &[P], output: Q, show_progress: bool) -> Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let progress = FileProgress::new(inputs.len(), show_progress);
    let mut combiner = VocabCombiner::new();
    for input in inputs {
        progress.start(input.as_ref());
        combiner.add_file(input)?;
        progress.done();
    }
    progress.finish();

    let output = output.as_ref();
    let written = if output == Path::new("-") {
        combiner.write_to(io::stdout().lock())?
    } else {
        combiner.write_to(File::create(output)?)?
    };
    info!(
        "wrote {} pieces from {} vocabularies to {}",
        written,
        combiner.num_sources(),
        output.display()
    );
    Ok(written)
}
