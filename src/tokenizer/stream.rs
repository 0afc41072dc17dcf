// src/tokenizer/stream.rs
//
// Line-oriented token streams used by the encode/decode commands: one
// sequence per line, tokens separated by single spaces, ids in decimal.

use std::io::{BufRead, Write};

use crate::tokenizer::{Error, Result};

/// Reads every line of `reader`, trimmed of surrounding whitespace.
pub fn read_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    reader
        .lines()
        .map(|line| Ok(line?.trim().to_string()))
        .collect()
}

/// Writes one line per item and flushes.
pub fn write_lines<W, S>(mut writer: W, lines: &[S]) -> Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    for line in lines {
        writeln!(writer, "{}", line.as_ref())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn join_pieces<S: AsRef<str>>(pieces: &[S]) -> String {
    pieces
        .iter()
        .map(|piece| piece.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn join_ids(ids: &[u32]) -> String {
    ids.iter().map(u32::to_string).collect::<Vec<_>>().join(" ")
}

pub fn split_pieces(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Parses a line of decimal ids. `line_index` is 0-based.
pub fn split_ids(line_index: usize, line: &str) -> Result<Vec<u32>> {
    line.split_whitespace()
        .map(|token| {
            token.parse().map_err(|_| Error::InvalidId {
                line: line_index + 1,
                token: token.to_string(),
            })
        })
        .collect()
}
