use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{LakeError, Result};

const KEY_COLUMN: &str = "key";
const PEPTIDE_COLUMN: &str = "peptide.normal.ends";

/// `(header, peptide)` pairs from a neoORF table, stop codons removed,
/// duplicates dropped in first-seen order.
pub fn read_neo_orfs(path: &Path) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            LakeError::InvalidArgument(format!("{} has no '{name}' column", path.display()))
        })
    };
    let key_idx = position(KEY_COLUMN)?;
    let peptide_idx = position(PEPTIDE_COLUMN)?;

    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record?;
        let header = record.get(key_idx).unwrap_or("").trim();
        let peptide = record.get(peptide_idx).unwrap_or("").replace('*', "");
        if header.is_empty() || peptide.is_empty() {
            log::warn!("Skipping neoORF row without key or peptide: {:?}", record.iter().collect::<Vec<_>>());
            continue;
        }
        let pair = (header.to_string(), peptide);
        if seen.insert(pair.clone()) {
            pairs.push(pair);
        }
    }
    Ok(pairs)
}

/// Copy `input_db` to `output_db` and append the neoORF peptides followed by
/// their reversed decoys (`>rev_<key>`). Returns the number of peptides added.
pub fn prepare_database(input_db: &Path, neo_orfs: &Path, output_db: &Path) -> Result<usize> {
    let pairs = read_neo_orfs(neo_orfs)?;
    let base = fs::read_to_string(input_db)?;

    let mut out = BufWriter::new(File::create(output_db)?);
    out.write_all(base.as_bytes())?;
    if !base.is_empty() && !base.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    for (header, peptide) in &pairs {
        writeln!(out, ">{header}\n{peptide}")?;
    }
    for (header, peptide) in &pairs {
        let reversed: String = peptide.chars().rev().collect();
        writeln!(out, ">rev_{header}\n{reversed}")?;
    }
    out.flush()?;

    log::info!(
        "Wrote {} with {} neoORF peptides and their decoys",
        output_db.display(),
        pairs.len()
    );
    Ok(pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neo_orfs_and_decoys_follow_the_input_database() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("uniprot.fasta");
        let orfs = dir.path().join("neoorfs.tsv");
        let output = dir.path().join("db.fasta");
        fs::write(&input, ">sp|P1|ONE\nMKT").unwrap();
        fs::write(
            &orfs,
            "gene\tkey\tpeptide.normal.ends\nA\tORF1\tPEPK*\nA\tORF1\tPEPK\nB\tORF2\tMAR*\nC\t\tXYZ\n",
        )
        .unwrap();

        let added = prepare_database(&input, &orfs, &output).unwrap();

        assert_eq!(added, 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            ">sp|P1|ONE\nMKT\n>ORF1\nPEPK\n>ORF2\nMAR\n>rev_ORF1\nKPEP\n>rev_ORF2\nRAM\n"
        );
    }

    #[test]
    fn missing_columns_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let orfs = dir.path().join("neoorfs.tsv");
        fs::write(&orfs, "key\tpeptide\nORF1\tPEP\n").unwrap();
        let err = read_neo_orfs(&orfs).unwrap_err();
        assert!(err.to_string().contains("peptide.normal.ends"));
    }
}
