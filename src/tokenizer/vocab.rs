// src/tokenizer/vocab.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, MatchKind};
use log::info;
use regex::Regex;
use rustc_hash::FxHashMap as HashMap;

use crate::tokenizer::{Error, Result};

/// Surface form of the unknown-piece token, used as the id fallback.
pub const UNK_PIECE: &str = "<unk>";

// Evaluated once per piece at load time; the resulting tag is cached on the `Piece`.
static BYTE_PIECE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<0x([0-9A-F]{2})>$").unwrap());
static SPECIAL_PIECE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<.*>$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    /// Control or reserved tokens such as `<unk>` or `<blk>`.
    Special,
    /// `<0xHH>` byte-fallback tokens.
    Byte,
    Normal,
}

impl PieceKind {
    pub fn classify(surface: &str) -> Self {
        if BYTE_PIECE.is_match(surface) {
            PieceKind::Byte
        } else if SPECIAL_PIECE.is_match(surface) {
            PieceKind::Special
        } else {
            PieceKind::Normal
        }
    }
}

/// Returns the raw byte a `<0xHH>` piece stands for.
pub fn byte_value(surface: &str) -> Option<u8> {
    BYTE_PIECE
        .captures(surface)
        .and_then(|caps| u8::from_str_radix(&caps[1], 16).ok())
}

/// The canonical surface form of the byte-fallback piece for `byte`.
pub fn byte_piece(byte: u8) -> String {
    format!("<0x{byte:02X}>")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub surface: String,
    pub score: f32,
    pub id: u32,
    pub kind: PieceKind,
}

/// Parses one `surface<TAB>score` line. `index` is the 0-based line number.
pub(crate) fn parse_line(index: usize, line: &str) -> Result<(&str, f64)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let (surface, score) = line
        .split_once('\t')
        .ok_or_else(|| Error::format(index, "missing tab separator"))?;
    let score: f64 = score
        .trim()
        .parse()
        .map_err(|_| Error::format(index, format!("invalid score {score:?}")))?;
    check_entry(index, surface, score)?;
    Ok((surface, score))
}

/// Rejects entries no vocabulary may hold, whichever way they were read.
fn check_entry(index: usize, surface: &str, score: f64) -> Result<()> {
    if surface.is_empty() {
        return Err(Error::format(index, "empty piece"));
    }
    if score.is_nan() {
        return Err(Error::format(index, "score is NaN"));
    }
    Ok(())
}

/// Immutable, indexed piece vocabulary. Ids are line indices of the source file.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pieces: Vec<Piece>,
    piece_to_id: HashMap<String, u32>,
    /// Every Normal and Special piece, searched with overlapping matches to build the lattice.
    matcher: AhoCorasick,
    matcher_ids: Vec<u32>,
    byte_ids: [Option<u32>; 256],
    unk_id: Option<u32>,
}

impl Vocabulary {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let vocab = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!(
            "loaded vocabulary {} ({} pieces: {} special, {} byte, {} normal)",
            path.display(),
            vocab.vocab_size(),
            vocab.count(PieceKind::Special),
            vocab.count(PieceKind::Byte),
            vocab.count(PieceKind::Normal),
        );
        Ok(vocab)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let (surface, score) = parse_line(index, &line)?;
            // Pieces keep f32 scores; lattice sums are carried in f64.
            entries.push((surface.to_string(), score as f32));
        }
        Self::from_entries(entries)
    }

    /// Builds a vocabulary from `(surface, score)` pairs in id order.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, f32)>,
    {
        let mut pieces = Vec::new();
        let mut piece_to_id = HashMap::default();
        let mut byte_ids = [None; 256];
        for (index, (surface, score)) in entries.into_iter().enumerate() {
            let id = u32::try_from(index)
                .map_err(|_| Error::format(index, "too many pieces for a u32 id"))?;
            check_entry(index, &surface, f64::from(score))?;
            if piece_to_id.contains_key(&surface) {
                return Err(Error::format(index, format!("duplicate piece {surface:?}")));
            }
            let kind = PieceKind::classify(&surface);
            if kind == PieceKind::Byte {
                if let Some(byte) = byte_value(&surface) {
                    byte_ids[byte as usize] = Some(id);
                }
            }
            piece_to_id.insert(surface.clone(), id);
            pieces.push(Piece {
                surface,
                score,
                id,
                kind,
            });
        }

        let (patterns, matcher_ids): (Vec<&str>, Vec<u32>) = pieces
            .iter()
            .filter(|piece| piece.kind != PieceKind::Byte)
            .map(|piece| (piece.surface.as_str(), piece.id))
            .unzip();
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(patterns)?;

        let unk_id = piece_to_id.get(UNK_PIECE).copied();
        Ok(Self {
            pieces,
            piece_to_id,
            matcher,
            matcher_ids,
            byte_ids,
            unk_id,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.pieces.len()
    }

    pub fn piece_to_id(&self, surface: &str) -> Result<u32> {
        self.piece_to_id
            .get(surface)
            .copied()
            .ok_or_else(|| Error::NotFound(surface.to_string()))
    }

    pub fn id_to_piece(&self, id: u32) -> Result<&str> {
        self.piece(id).map(|piece| piece.surface.as_str())
    }

    pub fn piece(&self, id: u32) -> Result<&Piece> {
        self.pieces.get(id as usize).ok_or(Error::OutOfRange {
            id,
            size: self.pieces.len(),
        })
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn unk_id(&self) -> Option<u32> {
        self.unk_id
    }

    pub fn byte_piece_id(&self, byte: u8) -> Option<u32> {
        self.byte_ids[byte as usize]
    }

    pub fn count(&self, kind: PieceKind) -> usize {
        self.pieces.iter().filter(|piece| piece.kind == kind).count()
    }

    /// All occurrences of Normal and Special pieces in `text`, overlapping ones
    /// included, as `(start, end, id)` byte spans.
    pub fn matches<'a>(&'a self, text: &'a str) -> impl Iterator<Item = (usize, usize, u32)> + 'a {
        self.matcher
            .find_overlapping_iter(text)
            .map(|mat| (mat.start(), mat.end(), self.matcher_ids[mat.pattern().as_usize()]))
    }
}

impl FromStr for Vocabulary {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_reader(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: &str = "<blk>\t0\n<unk>\t0\n<0x41>\t0\n▁hello\t-0.1\nworld\t-0.2\n▁\t-5.0";

    #[test]
    fn test_classify() {
        assert_eq!(PieceKind::classify("<0x0A>"), PieceKind::Byte);
        assert_eq!(PieceKind::classify("<0xFF>"), PieceKind::Byte);
        assert_eq!(PieceKind::classify("<0xff>"), PieceKind::Special);
        assert_eq!(PieceKind::classify("<0x123>"), PieceKind::Special);
        assert_eq!(PieceKind::classify("<unk>"), PieceKind::Special);
        assert_eq!(PieceKind::classify("<>"), PieceKind::Special);
        assert_eq!(PieceKind::classify("<"), PieceKind::Normal);
        assert_eq!(PieceKind::classify("▁<a"), PieceKind::Normal);
        assert_eq!(PieceKind::classify("hello"), PieceKind::Normal);
    }

    #[test]
    fn test_byte_value() {
        assert_eq!(byte_value("<0x41>"), Some(0x41));
        assert_eq!(byte_value("<0xE4>"), Some(0xE4));
        assert_eq!(byte_value("<unk>"), None);
        assert_eq!(byte_piece(0x0a), "<0x0A>");
    }

    #[test]
    fn test_load_assigns_line_ids() {
        let vocab: Vocabulary = VOCAB.parse().unwrap();
        assert_eq!(vocab.vocab_size(), 6);
        assert_eq!(vocab.piece_to_id("<blk>").unwrap(), 0);
        assert_eq!(vocab.piece_to_id("world").unwrap(), 4);
        assert_eq!(vocab.id_to_piece(3).unwrap(), "▁hello");
        assert_eq!(vocab.unk_id(), Some(1));
        assert_eq!(vocab.byte_piece_id(0x41), Some(2));
        assert_eq!(vocab.byte_piece_id(0x42), None);

        let piece = vocab.piece(5).unwrap();
        assert_eq!(piece.score, -5.0);
        assert_eq!(piece.kind, PieceKind::Normal);
        assert_eq!(vocab.count(PieceKind::Special), 2);
        assert_eq!(vocab.count(PieceKind::Byte), 1);
    }

    #[test]
    fn test_lookup_errors() {
        let vocab: Vocabulary = VOCAB.parse().unwrap();
        assert!(matches!(vocab.piece_to_id("missing"), Err(Error::NotFound(p)) if p == "missing"));
        assert!(matches!(
            vocab.id_to_piece(6),
            Err(Error::OutOfRange { id: 6, size: 6 })
        ));
    }

    #[test]
    fn test_format_errors() {
        let missing_tab = "a\t0\nb 0\n".parse::<Vocabulary>();
        assert!(matches!(missing_tab, Err(Error::Format { line: 2, .. })));

        let bad_score = "a\tabc\n".parse::<Vocabulary>();
        assert!(matches!(bad_score, Err(Error::Format { line: 1, .. })));

        let duplicate = "a\t0\nb\t-1\na\t-2\n".parse::<Vocabulary>();
        assert!(matches!(duplicate, Err(Error::Format { line: 3, .. })));

        let blank = "a\t0\n\nb\t-1\n".parse::<Vocabulary>();
        assert!(matches!(blank, Err(Error::Format { line: 2, .. })));

        let nan = "a\t0\nb\tNaN\n".parse::<Vocabulary>();
        assert!(matches!(nan, Err(Error::Format { line: 2, .. })));

        let empty_surface = "\t-1\n".parse::<Vocabulary>();
        assert!(matches!(empty_surface, Err(Error::Format { line: 1, .. })));
    }

    #[test]
    fn test_from_entries_rejects_empty_surface() {
        let entries = vec![("▁a".to_string(), -1.0), (String::new(), 1.0)];
        let err = Vocabulary::from_entries(entries).unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, ref reason } if reason == "empty piece"));
    }

    #[test]
    fn test_from_entries_rejects_nan_score() {
        let entries = vec![("a".to_string(), f32::NAN)];
        let err = Vocabulary::from_entries(entries).unwrap_err();
        assert!(matches!(err, Error::Format { line: 1, ref reason } if reason == "score is NaN"));
    }

    #[test]
    fn test_crlf_and_missing_trailing_newline() {
        let vocab: Vocabulary = "a\t-1.5\r\nb\t-2".parse().unwrap();
        assert_eq!(vocab.vocab_size(), 2);
        assert_eq!(vocab.piece(0).unwrap().surface, "a");
        assert_eq!(vocab.piece(1).unwrap().score, -2.0);
    }

    #[test]
    fn test_matches_skip_byte_pieces() {
        let vocab: Vocabulary = VOCAB.parse().unwrap();
        let mut found: Vec<_> = vocab.matches("▁hello<0x41>").collect();
        found.sort();
        let meta = '▁'.len_utf8();
        assert_eq!(found, vec![(0, meta, 5), (0, meta + 5, 3)]);
    }
}
