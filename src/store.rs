use crate::error::{HuntOddsError, Result};
use crate::models::{FilesConfig, HuntRecord, SNAPSHOT_COLUMNS};
use crate::normalizer::{self, RawTable, ReportLayout};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::info;

/// In-memory set of normalized records for one session.
///
/// The records sit behind an `Arc`, so a reader holding a [`snapshot`] keeps
/// the sequence it started with even if the store is reloaded meanwhile.
///
/// [`snapshot`]: HuntRecordStore::snapshot
#[derive(Debug, Clone, Default)]
pub struct HuntRecordStore {
    records: Arc<[HuntRecord]>,
}

impl HuntRecordStore {
    pub fn new(records: Vec<HuntRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Loads the snapshot if present, otherwise normalizes the raw report and
    /// writes the snapshot for later sessions.
    pub fn open(files: &FilesConfig, layout: &ReportLayout) -> Result<Self> {
        let snapshot = Path::new(&files.snapshot);
        if snapshot.exists() {
            return Self::load_snapshot(snapshot);
        }
        info!(
            raw_report = %files.raw_report,
            "no snapshot found, normalizing raw report"
        );
        let store = Self::from_raw_report(&files.raw_report, layout)?;
        store.save_snapshot(snapshot)?;
        Ok(store)
    }

    pub fn from_raw_report(file_path: impl AsRef<Path>, layout: &ReportLayout) -> Result<Self> {
        let table = RawTable::from_path(file_path)?;
        Ok(Self::new(normalizer::normalize(&table, layout)?))
    }

    pub fn load_snapshot(file_path: impl AsRef<Path>) -> Result<Self> {
        let path = file_path.as_ref();
        let file = File::open(path).map_err(|e| HuntOddsError::from_io(e, path))?;
        let records = read_records(file)?;
        info!(path = %path.display(), records = records.len(), "loaded snapshot");
        Ok(Self::new(records))
    }

    pub fn save_snapshot(&self, file_path: impl AsRef<Path>) -> Result<()> {
        let path = file_path.as_ref();
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        // Written beside the target and renamed over it, so an interrupted
        // save never leaves a truncated snapshot behind.
        let mut staged = NamedTempFile::new_in(dir)?;
        write_records(&self.records, &mut staged)?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| e.error)?;
        info!(path = %path.display(), records = self.records.len(), "saved snapshot");
        Ok(())
    }

    /// Replaces every record at once.
    pub fn reload(&mut self, records: Vec<HuntRecord>) {
        self.records = records.into();
    }

    /// First record, in stored order, whose code equals `code` exactly.
    pub fn find_by_code(&self, code: &str) -> Option<&HuntRecord> {
        self.records.iter().find(|record| record.hunt_code == code)
    }

    pub fn all(&self) -> &[HuntRecord] {
        &self.records
    }

    pub fn snapshot(&self) -> Arc<[HuntRecord]> {
        Arc::clone(&self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records whose three-letter species code is `species`.
    pub fn count_species(&self, species: &str) -> usize {
        self.records
            .iter()
            .filter(|record| record.species_prefix() == Some(species))
            .count()
    }
}

/// Writes records as a snapshot CSV with the canonical header.
pub fn write_records<W: Write>(records: &[HuntRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv_writer.write_record(SNAPSHOT_COLUMNS)?;
    }
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads a snapshot CSV, checking the header before any row.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<HuntRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    if let Some(missing) = SNAPSHOT_COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|h| h.trim() == **column))
    {
        return Err(HuntOddsError::SchemaMismatch {
            column: missing.to_string(),
        });
    }

    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        let record: HuntRecord = row?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, n_licenses: u32, r_tot: u32) -> HuntRecord {
        HuntRecord {
            hunt_code: code.to_string(),
            unit_description: format!("Unit for {code}"),
            bag: "A".to_string(),
            n_licenses,
            r1st: r_tot,
            r2nd: 0,
            r3rd: 0,
            r_tot,
            hunt_odds: crate::odds::hunt_odds(n_licenses, r_tot).unwrap(),
        }
    }

    #[test]
    fn lookup_returns_first_duplicate() {
        let store = HuntRecordStore::new(vec![
            record("ANT-1-101", 50, 200),
            record("ANT-1-101", 5, 10),
            record("ELK-1-001", 1, 1),
        ]);
        let found = store.find_by_code("ANT-1-101").unwrap();
        assert_eq!(found.n_licenses, 50);
        assert!(store.find_by_code("ANT-1-999").is_none());
        assert!(store.find_by_code("ant-1-101").is_none());
    }

    #[test]
    fn reload_leaves_earlier_snapshots_intact() {
        let mut store = HuntRecordStore::new(vec![record("ANT-1-101", 1, 1)]);
        let before = store.snapshot();

        store.reload(vec![record("DER-2-001", 2, 2), record("DER-2-002", 2, 2)]);

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].hunt_code, "ANT-1-101");
        assert_eq!(store.len(), 2);
        assert!(store.find_by_code("ANT-1-101").is_none());
    }

    #[test]
    fn snapshot_round_trips_through_csv() {
        let records = vec![record("ANT-1-101", 50, 200), record("ELK-3-204", 7, 1_000_000)];
        let mut buffer = Vec::new();
        write_records(&records, &mut buffer).unwrap();
        assert_eq!(read_records(buffer.as_slice()).unwrap(), records);
    }

    #[test]
    fn empty_snapshot_keeps_header() {
        let mut buffer = Vec::new();
        write_records(&[], &mut buffer).unwrap();
        assert!(read_records(buffer.as_slice()).unwrap().is_empty());
    }

    #[test]
    fn snapshot_without_odds_column_is_rejected() {
        let text = "huntCode,unitDescription,bag,nLicenses,r1st,r2nd,r3rd,rTot\nANT-1-101,x,A,1,1,0,0,1\n";
        match read_records(text.as_bytes()) {
            Err(HuntOddsError::SchemaMismatch { column }) => assert_eq!(column, "huntOdds"),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_snapshot_is_file_not_found() {
        let err = HuntRecordStore::load_snapshot("/nonexistent/huntData.csv").unwrap_err();
        assert!(matches!(err, HuntOddsError::FileNotFound { .. }));
    }

    #[test]
    fn counts_records_per_species() {
        let store = HuntRecordStore::new(vec![
            record("ANT-1-101", 1, 1),
            record("ANT-2-102", 1, 1),
            record("ELK-1-001", 1, 1),
        ]);
        assert_eq!(store.count_species("ANT"), 2);
        assert_eq!(store.count_species("BHS"), 0);
        // Partial or over-long codes name no species.
        assert_eq!(store.count_species("AN"), 0);
        assert_eq!(store.count_species("ANT-1"), 0);
    }

    #[test]
    fn saving_replaces_snapshot_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huntData.csv");
        std::fs::write(&path, "stale contents that are not a snapshot\n").unwrap();

        let store = HuntRecordStore::new(vec![record("ANT-1-101", 50, 200)]);
        store.save_snapshot(&path).unwrap();

        let reloaded = HuntRecordStore::load_snapshot(&path).unwrap();
        assert_eq!(reloaded.all(), store.all());
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, ["huntData.csv"]);
    }

    #[test]
    fn saving_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/out/huntData.csv");
        HuntRecordStore::default().save_snapshot(&path).unwrap();
        assert!(HuntRecordStore::load_snapshot(&path).unwrap().is_empty());
    }
}
