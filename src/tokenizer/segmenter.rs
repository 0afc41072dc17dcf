// src/tokenizer/segmenter.rs

use std::path::Path;
use std::sync::Arc;

use crate::tokenizer::decoder::{decode_surfaces, DecodePolicy};
use crate::tokenizer::normalizer::{normalize, Nfkc, Normalizer};
use crate::tokenizer::vocab::{byte_piece, Vocabulary};
use crate::tokenizer::{Error, Model, Result, TokenizerConfig};

/// One piece of an encoded sequence. `id` is `None` only for a byte-fallback
/// piece that the vocabulary does not contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPiece {
    pub piece: String,
    pub id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Piece(u32),
    /// A single character emitted as its UTF-8 bytes.
    Fallback,
}

impl Edge {
    // Fallback edges lose every tie against a vocabulary piece.
    fn rank(self) -> u64 {
        match self {
            Edge::Piece(id) => u64::from(id),
            Edge::Fallback => u64::MAX,
        }
    }
}

/// Best incoming edge of a lattice position.
#[derive(Debug, Clone, Copy)]
struct Node {
    score: f64,
    start: usize,
    edge: Edge,
}

impl Node {
    fn beats(&self, other: &Node, end: usize) -> bool {
        if self.score != other.score {
            return self.score > other.score;
        }
        let (len, other_len) = (end - self.start, end - other.start);
        if len != other_len {
            return len > other_len;
        }
        self.edge.rank() < other.edge.rank()
    }
}

fn relax(best: &mut [Option<Node>], end: usize, candidate: Node) {
    let replace = match &best[end] {
        Some(current) => candidate.beats(current, end),
        None => true,
    };
    if replace {
        best[end] = Some(candidate);
    }
}

/// Maximum-score segmentation of normalized text over a shared, read-only vocabulary.
#[derive(Debug, Clone)]
pub struct Segmenter {
    vocab: Arc<Vocabulary>,
    decode_policy: DecodePolicy,
}

impl Segmenter {
    pub fn new(vocab: Vocabulary) -> Self {
        Self::from_shared(Arc::new(vocab))
    }

    pub fn from_shared(vocab: Arc<Vocabulary>) -> Self {
        Self {
            vocab,
            decode_policy: DecodePolicy::default(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Vocabulary::from_file(path)?))
    }

    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        Ok(Self::from_file(&config.vocab)?.with_decode_policy(config.decode_errors))
    }

    #[must_use]
    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn decode_policy(&self) -> DecodePolicy {
        self.decode_policy
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.vocab_size()
    }

    /// Viterbi search over already-normalized text. Returns `(start, end, edge)`
    /// spans covering `text` left to right.
    ///
    /// Byte fallback is first limited to characters no piece covers. Only when
    /// that leaves the end unreachable is it allowed wherever no piece starts,
    /// which always reaches the end.
    fn segment(&self, text: &str) -> Vec<(usize, usize, Edge)> {
        let n = text.len();
        if n == 0 {
            return Vec::new();
        }

        let mut outgoing: Vec<Vec<(usize, u32)>> = vec![Vec::new(); n];
        let mut covered = vec![false; n];
        for (start, end, id) in self.vocab.matches(text) {
            outgoing[start].push((end, id));
            covered[start..end].fill(true);
        }

        self.search(text, &outgoing, Some(&covered))
            .or_else(|| self.search(text, &outgoing, None))
            .unwrap_or_default()
    }

    /// One lattice pass. With `covered`, fallback edges are only added at
    /// characters outside every piece. Returns `None` if the end is unreachable.
    fn search(
        &self,
        text: &str,
        outgoing: &[Vec<(usize, u32)>],
        covered: Option<&[bool]>,
    ) -> Option<Vec<(usize, usize, Edge)>> {
        let n = text.len();

        // best[i] holds the winning edge that ends at byte offset i.
        let mut best: Vec<Option<Node>> = vec![None; n + 1];
        for (start, ch) in text.char_indices() {
            let base = if start == 0 {
                0.0
            } else {
                match best[start] {
                    Some(node) => node.score,
                    None => continue,
                }
            };

            let fallback = match covered {
                Some(covered) => !covered[start],
                None => outgoing[start].is_empty(),
            };
            if fallback {
                let candidate = Node {
                    score: base,
                    start,
                    edge: Edge::Fallback,
                };
                relax(&mut best, start + ch.len_utf8(), candidate);
            }
            for &(end, id) in &outgoing[start] {
                let score = self.vocab.pieces()[id as usize].score;
                let candidate = Node {
                    score: base + f64::from(score),
                    start,
                    edge: Edge::Piece(id),
                };
                relax(&mut best, end, candidate);
            }
        }

        let mut path = Vec::new();
        let mut end = n;
        while end > 0 {
            let node = best[end]?;
            path.push((node.start, end, node.edge));
            end = node.start;
        }
        path.reverse();
        Some(path)
    }

    /// Encodes `text` into pieces together with their ids.
    pub fn encode(&self, text: &str) -> Vec<EncodedPiece> {
        let normalized = normalize(text);
        let mut encoded = Vec::new();
        for (start, end, edge) in self.segment(&normalized) {
            match edge {
                Edge::Piece(id) => encoded.push(EncodedPiece {
                    piece: self.vocab.pieces()[id as usize].surface.clone(),
                    id: Some(id),
                }),
                Edge::Fallback => {
                    encoded.extend(normalized.as_bytes()[start..end].iter().map(|&byte| {
                        EncodedPiece {
                            piece: byte_piece(byte),
                            id: self.vocab.byte_piece_id(byte),
                        }
                    }))
                }
            }
        }
        encoded
    }

    pub fn encode_as_pieces(&self, text: &str) -> Vec<String> {
        self.encode(text).into_iter().map(|p| p.piece).collect()
    }

    /// Encodes `text` into ids. A byte piece missing from the vocabulary maps to
    /// `<unk>`; without `<unk>` that is a `NotFound` error.
    pub fn encode_as_ids(&self, text: &str) -> Result<Vec<u32>> {
        self.encode(text)
            .into_iter()
            .map(|p| match p.id.or(self.vocab.unk_id()) {
                Some(id) => Ok(id),
                None => Err(Error::NotFound(p.piece)),
            })
            .collect()
    }

    pub fn decode_ids(&self, ids: &[u32]) -> Result<String> {
        let surfaces = ids
            .iter()
            .map(|&id| self.vocab.id_to_piece(id))
            .collect::<Result<Vec<_>>>()?;
        decode_surfaces(surfaces, self.decode_policy)
    }

    pub fn decode_pieces<S: AsRef<str>>(&self, pieces: &[S]) -> Result<String> {
        decode_surfaces(pieces.iter().map(|piece| piece.as_ref()), self.decode_policy)
    }

    pub fn id_to_piece(&self, id: u32) -> Result<&str> {
        self.vocab.id_to_piece(id)
    }

    pub fn ids_to_pieces(&self, ids: &[u32]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| self.id_to_piece(id).map(str::to_string))
            .collect()
    }

    /// Looks up a piece after NFKC-normalizing it, as encode would see it.
    pub fn piece_to_id(&self, piece: &str) -> Result<u32> {
        self.vocab.piece_to_id(&Nfkc.normalize(piece))
    }

    pub fn pieces_to_ids<S: AsRef<str>>(&self, pieces: &[S]) -> Result<Vec<u32>> {
        pieces
            .iter()
            .map(|piece| self.piece_to_id(piece.as_ref()))
            .collect()
    }

    /// Like `piece_to_id`, but unknown pieces resolve to `<unk>` when the
    /// vocabulary has one.
    pub fn piece_to_id_or_unk(&self, piece: &str) -> Result<u32> {
        match (self.piece_to_id(piece), self.vocab.unk_id()) {
            (Err(Error::NotFound(_)), Some(unk)) => Ok(unk),
            (result, _) => result,
        }
    }
}

impl Model for Segmenter {
    fn encode_as_pieces(&self, text: &str) -> Vec<String> {
        self.encode_as_pieces(text)
    }

    fn encode_as_ids(&self, text: &str) -> Result<Vec<u32>> {
        self.encode_as_ids(text)
    }

    fn decode_ids(&self, ids: &[u32]) -> Result<String> {
        self.decode_ids(ids)
    }

    fn decode_pieces(&self, pieces: &[String]) -> Result<String> {
        self.decode_pieces(pieces)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter(vocab: &str) -> Segmenter {
        Segmenter::new(vocab.parse().unwrap())
    }

    fn scenario() -> Segmenter {
        segmenter("<blk>\t0\n<unk>\t0\n▁hello\t-0.1\nworld\t-0.2\n▁\t-5.0\n")
    }

    #[test]
    fn test_prefers_long_pieces_over_fallback() {
        let sp = scenario();
        // The space becomes an interior `▁`. There is no `▁world`, so it needs its own piece.
        assert_eq!(sp.encode_as_pieces("hello world"), vec!["▁hello", "▁", "world"]);
        assert_eq!(sp.encode_as_ids("hello world").unwrap(), vec![2, 4, 3]);
    }

    #[test]
    fn test_round_trip_single_characters() {
        let sp = segmenter("<unk>\t0\n▁\t-1\na\t-2\nb\t-2\nc\t-2\n");
        let pieces = sp.encode_as_pieces("abc cab");
        assert_eq!(pieces, vec!["▁", "a", "b", "c", "▁", "c", "a", "b"]);
        assert_eq!(sp.decode_pieces(&pieces).unwrap(), "abc cab");

        let ids = sp.encode_as_ids("abc cab").unwrap();
        assert_eq!(sp.decode_ids(&ids).unwrap(), "abc cab");
    }

    #[test]
    fn test_viterbi_picks_highest_total_score() {
        // "▁ab" alone (-4) and "▁" + "a" + "b" (-2.1) both lose to "▁a" + "b" (-2).
        let sp = segmenter("▁ab\t-4\n▁a\t-1\nb\t-1\na\t-0.6\n▁\t-0.5\n");
        assert_eq!(sp.encode_as_pieces("ab"), vec!["▁a", "b"]);
    }

    #[test]
    fn test_equal_scores_prefer_longer_piece() {
        // "▁" + "ab" and "▁a" + "b" both total -2; the final "ab" is longer.
        let sp = segmenter("▁\t-1\n▁a\t-1\nb\t-1\nab\t-1\n");
        assert_eq!(sp.encode_as_pieces("ab"), vec!["▁", "ab"]);
    }

    #[test]
    fn test_byte_fallback_for_uncovered_characters() {
        let sp = segmenter("<unk>\t0\n<0xC3>\t0\n<0xA9>\t0\n▁\t-1\nc\t-1\na\t-1\nf\t-1\n");
        let pieces = sp.encode_as_pieces("café");
        assert_eq!(pieces, vec!["▁", "c", "a", "f", "<0xC3>", "<0xA9>"]);
        assert_eq!(sp.encode_as_ids("café").unwrap(), vec![3, 4, 5, 6, 1, 2]);
        assert_eq!(sp.decode_pieces(&pieces).unwrap(), "café");
    }

    #[test]
    fn test_no_fallback_inside_covered_characters() {
        // "▁a" + <0x62> would score -1, but "b" is covered by "ab".
        let sp = segmenter("▁a\t-1\nab\t-1\n▁\t-1\n");
        assert_eq!(sp.encode_as_pieces("ab"), vec!["▁", "ab"]);
    }

    #[test]
    fn test_fallback_inside_covered_characters_when_stuck() {
        // Nothing covers "▁" alone, so the only way past "▁a" is a byte for "b".
        let sp = segmenter("▁a\t-1\nab\t-1\n");
        let pieces = sp.encode_as_pieces("ab");
        assert_eq!(pieces, vec!["▁a", "<0x62>"]);
        assert_eq!(sp.decode_pieces(&pieces).unwrap(), "ab");
    }

    #[test]
    fn test_missing_byte_pieces_map_to_unk() {
        let sp = segmenter("<unk>\t0\n▁\t-1\n");
        assert_eq!(sp.encode_as_pieces("é"), vec!["▁", "<0xC3>", "<0xA9>"]);
        assert_eq!(sp.encode_as_ids("é").unwrap(), vec![1, 0, 0]);

        let without_unk = segmenter("▁\t-1\n");
        assert!(matches!(
            without_unk.encode_as_ids("é"),
            Err(Error::NotFound(p)) if p == "<0xC3>"
        ));
    }

    #[test]
    fn test_encode_covers_any_input() {
        let sp = scenario();
        for text in ["", "   ", "hello", "日本語 🦀", "\u{0}\u{1F}x", "hello\u{3000}world", "ﬁ"] {
            let pieces = sp.encode_as_pieces(text);
            let ids = sp.encode_as_ids(text).unwrap();
            assert_eq!(pieces.len(), ids.len());
            let decoded = sp.decode_pieces(&pieces).unwrap();
            assert_eq!(decoded, normalize(text).replace('▁', " ").trim_start());
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let sp = scenario();
        let text = "hello world hello wor ld";
        assert_eq!(sp.encode(text), sp.encode(text));
    }

    #[test]
    fn test_special_pieces_match_literally() {
        let sp = scenario();
        assert_eq!(sp.encode_as_pieces("<unk>world"), vec!["▁", "<unk>", "world"]);
    }

    #[test]
    fn test_lookups() {
        let sp = scenario();
        assert_eq!(sp.vocab_size(), 5);
        assert_eq!(sp.id_to_piece(2).unwrap(), "▁hello");
        assert_eq!(sp.ids_to_pieces(&[3, 0]).unwrap(), vec!["world", "<blk>"]);
        assert!(matches!(sp.ids_to_pieces(&[0, 5]), Err(Error::OutOfRange { id: 5, .. })));
        assert_eq!(sp.pieces_to_ids(&["world", "▁"]).unwrap(), vec![3, 4]);
        assert!(matches!(sp.piece_to_id("nope"), Err(Error::NotFound(_))));
        assert_eq!(sp.piece_to_id_or_unk("nope").unwrap(), 1);
        // Full-width letters normalize to the ASCII piece.
        assert_eq!(sp.piece_to_id("ｗｏｒｌｄ").unwrap(), 3);
    }

    #[test]
    fn test_decode_ids_out_of_range() {
        let sp = scenario();
        assert!(matches!(sp.decode_ids(&[2, 99]), Err(Error::OutOfRange { id: 99, size: 5 })));
    }

    #[test]
    fn test_decode_policy_replace() {
        let sp = segmenter("<0xC3>\t0\n▁a\t-1\n").with_decode_policy(DecodePolicy::Replace);
        assert_eq!(sp.decode_ids(&[1, 0]).unwrap(), "a\u{FFFD}");
        let strict = sp.clone().with_decode_policy(DecodePolicy::Strict);
        assert!(matches!(strict.decode_ids(&[1, 0]), Err(Error::Decode(_))));
    }
}
