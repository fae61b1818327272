use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Header text up to the first whitespace, without the `>`.
    pub id: String,
    pub sequence: String,
}

pub fn read_fasta(path: &Path) -> Result<Vec<FastaRecord>> {
    parse_fasta(BufReader::new(File::open(path)?))
}

/// Lines before the first header are ignored.
pub fn parse_fasta<R: BufRead>(reader: R) -> Result<Vec<FastaRecord>> {
    let mut records = Vec::new();
    let mut current: Option<FastaRecord> = None;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            records.extend(current.take());
            current = Some(FastaRecord {
                id: header.split_whitespace().next().unwrap_or("").to_string(),
                sequence: String::new(),
            });
        } else if let Some(record) = current.as_mut() {
            record.sequence.extend(line.chars().filter(|c| !c.is_whitespace()));
        }
    }
    records.extend(current);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_line_records_are_joined() {
        let text = "junk\n>sp|P1|ONE description here\nMKT\nAYI\n\n>ENSP1|ENST1|ENSG1|TP53\nPEPTIDE\n>empty\n";
        let records = parse_fasta(text.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                FastaRecord { id: "sp|P1|ONE".into(), sequence: "MKTAYI".into() },
                FastaRecord { id: "ENSP1|ENST1|ENSG1|TP53".into(), sequence: "PEPTIDE".into() },
                FastaRecord { id: "empty".into(), sequence: String::new() },
            ]
        );
    }

    #[test]
    fn crlf_input_is_handled() {
        let records = parse_fasta(">a x\r\nAC\r\nGT\r\n".as_bytes()).unwrap();
        assert_eq!(records[0].id, "a");
        assert_eq!(records[0].sequence, "ACGT");
    }
}
