use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use super::fasta::{FastaRecord, read_fasta};
use crate::error::{LakeError, Result};

/// FragPipe result files and the column holding their peptide.
pub const RESULT_FILES: [(&str, &str); 3] = [
    ("peptide.tsv", "Peptide"),
    ("psm.tsv", "Peptide"),
    ("ion.tsv", "Peptide Sequence"),
];

/// Protein columns replaced by the database mapping.
const DROPPED_COLUMNS: &[&str] = &[
    "Protein",
    "Protein ID",
    "Entry Name",
    "Gene",
    "Protein Description",
    "Mapped Genes",
    "Mapped Proteins",
];

static TRANSCRIPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ENST[0-9]+").expect("valid regex"));
static GENE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ENSG[0-9]+").expect("valid regex"));

fn unique_joined<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let mut seen = HashSet::new();
    items
        .filter(|item| !item.is_empty() && seen.insert(*item))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Protein database
// ---------------------------------------------------------------------------

/// Target proteins of a search database plus the Ensembl gene → gene name
/// map taken from `ENSP|ENST|ENSG|NAME` headers.
#[derive(Debug, Default)]
pub struct ProteinDatabase {
    records: Vec<FastaRecord>,
    gene_names: HashMap<String, String>,
}

impl ProteinDatabase {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_records(read_fasta(path)?))
    }

    /// Decoys (`rev_`) are left out.
    pub fn from_records(records: Vec<FastaRecord>) -> Self {
        let mut gene_names = HashMap::new();
        let records: Vec<FastaRecord> = records.into_iter().filter(|r| !r.id.starts_with("rev_")).collect();
        for record in &records {
            if !record.id.starts_with("ENSP") {
                continue;
            }
            let parts: Vec<&str> = record.id.split('|').collect();
            if let [_, _, gene, name, ..] = parts.as_slice() {
                gene_names.insert(gene.to_string(), name.to_string());
            }
        }
        Self { records, gene_names }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of every protein containing `peptide`, joined with `, `.
    pub fn map_peptide(&self, peptide: &str) -> String {
        self.records
            .iter()
            .filter(|r| r.sequence.contains(peptide))
            .map(|r| r.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn gene_name(&self, gene: &str) -> Option<&str> {
        self.gene_names.get(gene).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Peptide annotation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeptideAnnotation {
    pub proteins: String,
    pub transcripts: String,
    pub genes: String,
    pub gene_names: String,
    pub peptide_type: &'static str,
}

pub const ANNOTATION_COLUMNS: [&str; 5] = [
    "Mapped Proteins",
    "Mapped Transcripts",
    "Mapped Genes",
    "Mapped Gene Names",
    "Peptide Type",
];

impl PeptideAnnotation {
    /// `None` when any mapped protein is a contaminant (`sp` prefix).
    pub fn from_mapping(proteins: &str, db: &ProteinDatabase) -> Option<Self> {
        let ids: Vec<&str> = proteins.split(", ").collect();
        if ids.iter().any(|id| id.starts_with("sp")) {
            return None;
        }
        let genes = unique_joined(GENE.find_iter(proteins).map(|m| m.as_str()));
        let gene_names = unique_joined(genes.split(", ").filter_map(|g| db.gene_name(g)));
        let trans = ids.iter().all(|id| id.starts_with("taa") || id.starts_with("trans"));

        Some(Self {
            proteins: proteins.to_string(),
            transcripts: unique_joined(TRANSCRIPT.find_iter(proteins).map(|m| m.as_str())),
            genes,
            gene_names,
            peptide_type: if trans { "trans peptide" } else { "regular peptide" },
        })
    }

    fn cells(&self) -> [&str; 5] {
        [
            self.proteins.as_str(),
            self.transcripts.as_str(),
            self.genes.as_str(),
            self.gene_names.as_str(),
            self.peptide_type,
        ]
    }
}

// ---------------------------------------------------------------------------
// Result tables
// ---------------------------------------------------------------------------

/// A TSV kept as text so values are written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn read_tsv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(String::from).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| LakeError::InvalidArgument(format!("column '{name}' not found")))
    }

    /// Drop the protein columns and prepend `Study ID` and `Sample Name`.
    fn label(self, study_id: &str, sample: &str) -> Self {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !DROPPED_COLUMNS.contains(&c.as_str()))
            .collect();
        let retain = |prefix: [&str; 2], cells: Vec<String>| -> Vec<String> {
            let kept = cells
                .into_iter()
                .zip(&keep)
                .filter_map(|(cell, keep)| keep.then_some(cell));
            prefix.iter().map(|p| p.to_string()).chain(kept).collect()
        };
        Self {
            columns: retain(["Study ID", "Sample Name"], self.columns),
            rows: self
                .rows
                .into_iter()
                .map(|row| retain([study_id, sample], row))
                .collect(),
        }
    }

    /// Stack tables over the union of their columns, in first-seen order.
    pub fn concat(tables: Vec<ResultTable>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        let mut rows = Vec::new();
        for table in tables {
            let positions: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|c| columns.iter().position(|u| u == c))
                .collect();
            for row in table.rows {
                let mut out = vec![String::new(); columns.len()];
                for (cell, &pos) in row.into_iter().zip(&positions) {
                    out[pos] = cell;
                }
                rows.push(out);
            }
        }
        Self { columns, rows }
    }

    /// Unique values of `column` in first-seen order.
    pub fn unique_values(&self, column: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|row| row[column].clone())
            .filter(|value| seen.insert(value.clone()))
            .collect()
    }

    /// Keep the rows of annotated peptides, grouped by peptide in first-seen
    /// order, with the annotation columns appended.
    pub fn annotate(&self, peptide_column: usize, annotations: &HashMap<String, PeptideAnnotation>) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(ANNOTATION_COLUMNS.iter().map(|c| c.to_string()));

        let mut by_peptide: HashMap<&str, Vec<&Vec<String>>> = HashMap::new();
        for row in &self.rows {
            by_peptide.entry(row[peptide_column].as_str()).or_default().push(row);
        }

        let mut rows = Vec::new();
        for peptide in self.unique_values(peptide_column) {
            let Some(annotation) = annotations.get(&peptide) else { continue };
            for row in by_peptide.get(peptide.as_str()).into_iter().flatten() {
                let mut out = row.to_vec();
                out.extend(annotation.cells().iter().map(|c| c.to_string()));
                rows.push(out);
            }
        }
        Self { columns, rows }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

fn sample_name(sample_dir: &Path) -> String {
    sample_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| sample_dir.display().to_string())
}

/// Merge the FragPipe results of every sample, map each peptide onto
/// `database` and write the annotated `peptide.tsv`, `psm.tsv` and `ion.tsv`
/// to `output_dir`. Returns the written files.
pub fn process_files(samples: &[PathBuf], database: &Path, output_dir: &Path, study_id: &str) -> Result<Vec<PathBuf>> {
    let db = ProteinDatabase::load(database)?;
    log::info!("Loaded {} target proteins from {}", db.len(), database.display());

    let mut merged = Vec::with_capacity(RESULT_FILES.len());
    for (file_type, peptide_column) in RESULT_FILES {
        log::info!("processing {file_type}");
        let mut tables = Vec::with_capacity(samples.len());
        for sample in samples {
            let table = ResultTable::read_tsv(&sample.join(file_type))?;
            tables.push(table.label(study_id, &sample_name(sample)));
        }
        let table = ResultTable::concat(tables);
        let column = table.column_index(peptide_column)?;
        merged.push((file_type, table, column));
    }

    let mut peptides: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for (_, table, column) in &merged {
        for peptide in table.unique_values(*column) {
            if seen.insert(peptide.clone()) {
                peptides.push(peptide);
            }
        }
    }
    log::info!("Mapping {} unique peptides", peptides.len());

    let annotations: HashMap<String, PeptideAnnotation> = peptides
        .par_iter()
        .filter_map(|peptide| {
            let proteins = db.map_peptide(peptide);
            PeptideAnnotation::from_mapping(&proteins, &db).map(|a| (peptide.clone(), a))
        })
        .collect();

    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    for (file_type, table, column) in merged {
        let annotated = table.annotate(column, &annotations);
        let path = output_dir.join(file_type);
        annotated.write_tsv(&path)?;
        log::info!("{}: {} rows", path.display(), annotated.rows.len());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, sequence: &str) -> FastaRecord {
        FastaRecord {
            id: id.to_string(),
            sequence: sequence.to_string(),
        }
    }

    fn database() -> ProteinDatabase {
        ProteinDatabase::from_records(vec![
            record("ENSP01|ENST01|ENSG01|TP53", "MEEPQSDPSVEPPLSQETF"),
            record("ENSP02|ENST02|ENSG02|MDM2", "MCNTNMSVPTDGAVTTSQ"),
            record("taa_ORF1", "PEPTIDEK"),
            record("sp|P1|KRT1", "KERATINPEPTIDEK"),
            record("rev_ENSP01|ENST01|ENSG01|TP53", "FTEQSLPPEVSPDSQPEEM"),
        ])
    }

    #[test]
    fn decoys_are_excluded_and_gene_names_mapped() {
        let db = database();
        assert_eq!(db.len(), 4);
        assert_eq!(db.gene_name("ENSG02"), Some("MDM2"));
        assert_eq!(db.map_peptide("SVEPP"), "ENSP01|ENST01|ENSG01|TP53");
        assert_eq!(db.map_peptide("PEPTIDEK"), "taa_ORF1, sp|P1|KRT1");
    }

    #[test]
    fn annotations_classify_peptides() {
        let db = database();
        let regular = PeptideAnnotation::from_mapping("ENSP01|ENST01|ENSG01|TP53, ENSP02|ENST02|ENSG02|MDM2", &db).unwrap();
        assert_eq!(regular.transcripts, "ENST01, ENST02");
        assert_eq!(regular.genes, "ENSG01, ENSG02");
        assert_eq!(regular.gene_names, "TP53, MDM2");
        assert_eq!(regular.peptide_type, "regular peptide");

        let trans = PeptideAnnotation::from_mapping("taa_ORF1, trans_ORF2", &db).unwrap();
        assert_eq!(trans.peptide_type, "trans peptide");
        assert_eq!(trans.genes, "");

        assert!(PeptideAnnotation::from_mapping("taa_ORF1, sp|P1|KRT1", &db).is_none());

        let unmapped = PeptideAnnotation::from_mapping("", &db).unwrap();
        assert_eq!(unmapped.peptide_type, "regular peptide");
    }

    #[test]
    fn concat_uses_the_column_union() {
        let a = ResultTable {
            columns: vec!["Peptide".into(), "Charge".into()],
            rows: vec![vec!["AAA".into(), "2".into()]],
        };
        let b = ResultTable {
            columns: vec!["Peptide".into(), "Intensity".into()],
            rows: vec![vec!["CCC".into(), "1e5".into()]],
        };
        let merged = ResultTable::concat(vec![a, b]);
        assert_eq!(merged.columns, vec!["Peptide", "Charge", "Intensity"]);
        assert_eq!(merged.rows[1], vec!["CCC", "", "1e5"]);
    }

    #[test]
    fn samples_are_merged_annotated_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.fasta");
        fs::write(
            &db_path,
            ">ENSP01|ENST01|ENSG01|TP53\nMEEPQSDPSVEPPLSQETF\n>taa_ORF1\nPEPTIDEK\n>sp|P1|KRT1\nKERATIN\n>rev_taa_ORF1\nKEDITPEP\n",
        )
        .unwrap();

        let mut samples = Vec::new();
        for (name, peptides) in [("S1", ["SVEPP", "KERATIN"]), ("S2", ["PEPTIDEK", "SVEPP"])] {
            let sample = dir.path().join(name);
            fs::create_dir_all(&sample).unwrap();
            let mut peptide_tsv = String::from("Peptide\tProtein\tMapped Genes\tSpectral Count\n");
            let mut ion_tsv = String::from("Peptide Sequence\tCharge\n");
            for (i, p) in peptides.iter().enumerate() {
                peptide_tsv.push_str(&format!("{p}\tX\tY\t{i}\n"));
                ion_tsv.push_str(&format!("{p}\t2\n"));
            }
            fs::write(sample.join("peptide.tsv"), &peptide_tsv).unwrap();
            fs::write(sample.join("psm.tsv"), &peptide_tsv).unwrap();
            fs::write(sample.join("ion.tsv"), &ion_tsv).unwrap();
            samples.push(sample);
        }

        let out = dir.path().join("out");
        let written = process_files(&samples, &db_path, &out, "STUDY1").unwrap();
        assert_eq!(written.len(), 3);

        let peptide = ResultTable::read_tsv(&out.join("peptide.tsv")).unwrap();
        assert_eq!(
            peptide.columns,
            vec![
                "Study ID",
                "Sample Name",
                "Peptide",
                "Spectral Count",
                "Mapped Proteins",
                "Mapped Transcripts",
                "Mapped Genes",
                "Mapped Gene Names",
                "Peptide Type",
            ]
        );
        // SVEPP rows first (first seen), KERATIN dropped as a contaminant.
        let order: Vec<(&str, &str)> = peptide
            .rows
            .iter()
            .map(|r| (r[1].as_str(), r[2].as_str()))
            .collect();
        assert_eq!(order, vec![("S1", "SVEPP"), ("S2", "SVEPP"), ("S2", "PEPTIDEK")]);
        assert_eq!(peptide.rows[0][0], "STUDY1");
        assert_eq!(peptide.rows[0][7], "TP53");
        assert_eq!(peptide.rows[2][8], "trans peptide");

        let ion = ResultTable::read_tsv(&out.join("ion.tsv")).unwrap();
        assert_eq!(ion.rows.len(), 3);
    }
}
