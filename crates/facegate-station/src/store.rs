use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use facegate_core::{FaceEncoding, GalleryEntry, ENCODING_DIM};

const ENCODING_BYTE_LEN: usize = ENCODING_DIM * 4;

const ENCODINGS_FILE: &str = "encodings.bin";
const NAMES_FILE: &str = "names.json";
const LOGIN_LOG_FILE: &str = "logins.txt";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("gallery I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("names file is not valid JSON: {0}")]
    Names(#[from] serde_json::Error),
    #[error("encodings file length {0} is not a whole number of records")]
    CorruptEncodings(usize),
    #[error("gallery files disagree: {names} names vs {encodings} encodings")]
    CountMismatch { names: usize, encodings: usize },
    #[error("invalid encoding dimension: {0} (expected 128)")]
    InvalidEncodingDim(usize),
    #[error("invalid encoding value (NaN/Inf)")]
    InvalidEncodingValue,
}

/// Flat-file gallery storage.
///
/// Two files under the data directory hold the enrolled sequence:
/// `encodings.bin` (concatenated little-endian f32 vectors, one 128-value
/// record per entry) and `names.json` (a JSON array of names, index-aligned
/// with the records). Persistence is full-snapshot: every enrollment
/// rewrites both files through a temp-file rename, so a crash never leaves
/// a half-written gallery behind.
#[derive(Debug)]
pub struct GalleryStore {
    data_dir: PathBuf,
    entries: Vec<GalleryEntry>,
}

impl GalleryStore {
    /// Open the store, loading any previously persisted gallery. Missing
    /// files mean an empty gallery, never an error; malformed files do fail.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        let entries = load_entries(data_dir)?;
        tracing::info!(
            dir = %data_dir.display(),
            enrolled = entries.len(),
            "gallery loaded"
        );
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            entries,
        })
    }

    /// The enrolled sequence, in enrollment order.
    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a new enrollment and persist the full updated sequence.
    pub fn enroll(&mut self, name: &str, encoding: FaceEncoding) -> Result<(), StoreError> {
        validate_encoding(encoding.values())?;
        self.entries.push(GalleryEntry {
            name: name.to_string(),
            encoding,
        });
        self.save()?;
        tracing::info!(name, enrolled = self.entries.len(), "enrolled");
        Ok(())
    }

    /// Write the current in-memory sequence to disk, replacing prior
    /// contents.
    pub fn save(&self) -> Result<(), StoreError> {
        let mut blob = Vec::with_capacity(self.entries.len() * ENCODING_BYTE_LEN);
        for entry in &self.entries {
            blob.extend_from_slice(&encoding_to_bytes(entry.encoding.values()));
        }
        let names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();

        write_atomic(&self.data_dir.join(ENCODINGS_FILE), &blob)?;
        write_atomic(&self.data_dir.join(NAMES_FILE), &serde_json::to_vec(&names)?)?;
        Ok(())
    }
}

fn load_entries(data_dir: &Path) -> Result<Vec<GalleryEntry>, StoreError> {
    let enc_path = data_dir.join(ENCODINGS_FILE);
    let names_path = data_dir.join(NAMES_FILE);

    // No prior gallery yet
    if !enc_path.exists() || !names_path.exists() {
        return Ok(Vec::new());
    }

    let blob = fs::read(&enc_path)?;
    if blob.len() % ENCODING_BYTE_LEN != 0 {
        return Err(StoreError::CorruptEncodings(blob.len()));
    }
    let count = blob.len() / ENCODING_BYTE_LEN;

    let names: Vec<String> = serde_json::from_slice(&fs::read(&names_path)?)?;
    if names.len() != count {
        return Err(StoreError::CountMismatch {
            names: names.len(),
            encodings: count,
        });
    }

    let mut entries = Vec::with_capacity(count);
    for (name, chunk) in names.into_iter().zip(blob.chunks_exact(ENCODING_BYTE_LEN)) {
        let values = bytes_to_encoding_strict(chunk)?;
        entries.push(GalleryEntry {
            name,
            encoding: FaceEncoding::new(values),
        });
    }
    Ok(entries)
}

/// Write through a sibling temp file and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.flush()?;
    drop(file);
    fs::rename(&tmp_path, path)
}

// ── Serialization helpers ─────────────────────────────────────────────────────

fn encoding_to_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn bytes_to_encoding_strict(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() != ENCODING_BYTE_LEN {
        return Err(StoreError::CorruptEncodings(bytes.len()));
    }

    let mut values = Vec::with_capacity(ENCODING_DIM);
    for chunk in bytes.chunks_exact(4) {
        let arr: [u8; 4] = chunk
            .try_into()
            .map_err(|_| StoreError::CorruptEncodings(bytes.len()))?;
        let v = f32::from_le_bytes(arr);
        if !v.is_finite() {
            return Err(StoreError::InvalidEncodingValue);
        }
        values.push(v);
    }
    Ok(values)
}

fn validate_encoding(values: &[f32]) -> Result<(), StoreError> {
    if values.len() != ENCODING_DIM {
        return Err(StoreError::InvalidEncodingDim(values.len()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(StoreError::InvalidEncodingValue);
    }
    Ok(())
}

// ── Login log ─────────────────────────────────────────────────────────────────

/// Append-only login audit trail: one `timestamp - name` line per granted
/// login. Write-only; nothing in the running station reads it back.
pub struct LoginLog {
    path: PathBuf,
}

impl LoginLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LOGIN_LOG_FILE),
        }
    }

    pub fn append(&self, name: &str) -> Result<(), std::io::Error> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{timestamp} - {name}")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "facegate-store-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn sample_encoding(seed: f32) -> FaceEncoding {
        FaceEncoding::new((0..ENCODING_DIM).map(|i| seed + i as f32 / 1000.0).collect())
    }

    #[test]
    fn test_open_without_prior_data_is_empty() {
        let dir = test_dir("fresh");
        let store = GalleryStore::open(&dir).unwrap();
        assert!(store.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_enroll_roundtrip() {
        let dir = test_dir("roundtrip");
        {
            let mut store = GalleryStore::open(&dir).unwrap();
            store.enroll("alice", sample_encoding(0.1)).unwrap();
            store.enroll("bob", sample_encoding(0.2)).unwrap();
        }

        let store = GalleryStore::open(&dir).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.entries()[0].name, "alice");
        assert_eq!(store.entries()[1].name, "bob");
        assert_eq!(store.entries()[0].encoding, sample_encoding(0.1));
        assert_eq!(store.entries()[1].encoding, sample_encoding(0.2));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_enroll_appends_at_end() {
        let dir = test_dir("append");
        let mut store = GalleryStore::open(&dir).unwrap();
        store.enroll("alice", sample_encoding(0.1)).unwrap();
        store.enroll("bob", sample_encoding(0.2)).unwrap();
        store.enroll("carol", sample_encoding(0.3)).unwrap();

        let names: Vec<&str> = store.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_load_is_identity() {
        let dir = test_dir("identity");
        let mut store = GalleryStore::open(&dir).unwrap();
        store.enroll("alice", sample_encoding(0.5)).unwrap();

        // Re-saving without changes must not disturb what load sees
        store.save().unwrap();
        let reloaded = GalleryStore::open(&dir).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.entries()[0].name, "alice");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_byte_fidelity() {
        // Interesting values at specific positions must survive bit-exact
        let mut values = vec![0.5f32; ENCODING_DIM];
        values[0] = 0.0;
        values[1] = -0.0;
        values[2] = 1.0;
        values[3] = -1.0;
        values[4] = f32::MIN_POSITIVE;
        values[5] = f32::EPSILON;
        values[6] = std::f32::consts::PI;
        values[7] = 0.123456789;

        let bytes = encoding_to_bytes(&values);
        let recovered = bytes_to_encoding_strict(&bytes).unwrap();
        assert_eq!(values.len(), recovered.len());
        for (orig, rec) in values.iter().zip(recovered.iter()) {
            assert_eq!(orig.to_bits(), rec.to_bits(), "mismatch: {orig} vs {rec}");
        }
    }

    #[test]
    fn test_corrupt_encodings_file_rejected() {
        let dir = test_dir("corrupt");
        {
            let mut store = GalleryStore::open(&dir).unwrap();
            store.enroll("alice", sample_encoding(0.1)).unwrap();
        }
        // Truncate to a non-record-aligned length
        let enc_path = dir.join(ENCODINGS_FILE);
        let blob = fs::read(&enc_path).unwrap();
        fs::write(&enc_path, &blob[..blob.len() - 3]).unwrap();

        let err = GalleryStore::open(&dir).unwrap_err();
        assert!(matches!(err, StoreError::CorruptEncodings(_)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let dir = test_dir("mismatch");
        {
            let mut store = GalleryStore::open(&dir).unwrap();
            store.enroll("alice", sample_encoding(0.1)).unwrap();
        }
        fs::write(dir.join(NAMES_FILE), br#"["alice","ghost"]"#).unwrap();

        let err = GalleryStore::open(&dir).unwrap_err();
        assert!(matches!(
            err,
            StoreError::CountMismatch {
                names: 2,
                encodings: 1
            }
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_nan_on_enroll() {
        let dir = test_dir("nan");
        let mut store = GalleryStore::open(&dir).unwrap();
        let mut values = vec![0.5f32; ENCODING_DIM];
        values[42] = f32::NAN;
        let err = store.enroll("alice", FaceEncoding::new(values)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidEncodingValue));
        // Rejected before the in-memory append
        assert!(store.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_wrong_dimension_on_enroll() {
        let dir = test_dir("dim");
        let mut store = GalleryStore::open(&dir).unwrap();
        let err = store
            .enroll("alice", FaceEncoding::new(vec![0.5; 64]))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidEncodingDim(64)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_login_log_appends_lines() {
        let dir = test_dir("loginlog");
        fs::create_dir_all(&dir).unwrap();
        let log = LoginLog::new(&dir);
        log.append("alice").unwrap();
        log.append("bob").unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - alice"));
        assert!(lines[1].ends_with(" - bob"));
        let _ = fs::remove_dir_all(&dir);
    }
}
