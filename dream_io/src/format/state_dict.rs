//! State-dict binary format read/write implementation.
//!
//! # Format Specification
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │ HEADER (16 bytes)                                                  │
//! ├────────────────────────────────────────────────────────────────────┤
//! │ ENTRIES (num_entries times, sorted by name)                        │
//! │   name_len (u32 LE), name (UTF-8)                                  │
//! │   ndim (u32 LE), dims (u64 LE each)                                │
//! │   values (f32 LE, product of dims)                                 │
//! └────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::header::{StateDictHeader, HEADER_SIZE, STATE_DICT_VERSION};
use crate::error::{DreamIoError, Result};

/// Flat copy of one tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBlob {
    /// Tensor dimensions.
    pub shape: Vec<usize>,
    /// Row-major values.
    pub data: Vec<f32>,
}

impl TensorBlob {
    /// Create a blob, checking that the data fills the shape.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(DreamIoError::ShapeMismatch {
                name: "blob".to_string(),
                expected,
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Number of values.
    pub fn numel(&self) -> usize {
        self.data.len()
    }
}

/// Ordered map from dotted parameter names to tensors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDict {
    entries: BTreeMap<String, TensorBlob>,
}

impl StateDict {
    /// Empty state dict.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, blob: TensorBlob) -> Option<TensorBlob> {
        self.entries.insert(name.into(), blob)
    }

    /// Look up an entry.
    pub fn get(&self, name: &str) -> Option<&TensorBlob> {
        self.entries.get(name)
    }

    /// Remove an entry.
    pub fn remove(&mut self, name: &str) -> Option<TensorBlob> {
        self.entries.remove(name)
    }

    /// True when an entry exists.
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Keep only the entries whose name satisfies `keep`.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|name, _| keep(name));
    }

    /// Entry names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorBlob)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of values over all entries.
    pub fn total_values(&self) -> usize {
        self.entries.values().map(TensorBlob::numel).sum()
    }
}

impl FromIterator<(String, TensorBlob)> for StateDict {
    fn from_iter<I: IntoIterator<Item = (String, TensorBlob)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Save a state dict to a writer.
pub fn save_state_dict<W: Write>(state: &StateDict, writer: &mut W) -> Result<()> {
    writer.write_all(&StateDictHeader::new(state.len() as u32).to_bytes())?;

    for (name, blob) in state.iter() {
        let name_bytes = name.as_bytes();
        writer.write_all(&(name_bytes.len() as u32).to_le_bytes())?;
        writer.write_all(name_bytes)?;

        writer.write_all(&(blob.shape.len() as u32).to_le_bytes())?;
        for &dim in &blob.shape {
            writer.write_all(&(dim as u64).to_le_bytes())?;
        }
        for &value in &blob.data {
            writer.write_all(&value.to_le_bytes())?;
        }
    }

    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

/// Load a state dict from a reader.
///
/// # Errors
/// Returns `InvalidFormat` for a bad magic, an unknown version or a
/// non-UTF-8 entry name.
pub fn load_state_dict<R: Read>(reader: &mut R) -> Result<StateDict> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;
    let header = StateDictHeader::from_bytes(&header_bytes);

    if !header.is_valid() {
        return Err(DreamIoError::invalid_format("invalid magic bytes (expected DRSD)"));
    }
    if header.version != STATE_DICT_VERSION {
        return Err(DreamIoError::invalid_format(format!(
            "unsupported state dict version {}",
            header.version
        )));
    }

    let mut state = StateDict::new();
    for _ in 0..header.num_entries {
        let name_len = read_u32(reader)? as usize;
        let mut name_bytes = vec![0u8; name_len];
        reader.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes)
            .map_err(|_| DreamIoError::invalid_format("entry name is not UTF-8"))?;

        let ndim = read_u32(reader)? as usize;
        let mut shape = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            shape.push(read_u64(reader)? as usize);
        }

        let numel: usize = shape.iter().product();
        let mut raw = vec![0u8; numel * 4];
        reader.read_exact(&mut raw)?;
        let data = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        state.insert(name, TensorBlob { shape, data });
    }

    Ok(state)
}

/// Save a state dict to a file.
pub fn save_to_file<P: AsRef<Path>>(state: &StateDict, path: P) -> Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    save_state_dict(state, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load a state dict from a file.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<StateDict> {
    let mut reader = BufReader::new(std::fs::File::open(path)?);
    load_state_dict(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> StateDict {
        let mut state = StateDict::new();
        state.insert(
            "geometry.grid",
            TensorBlob::new(vec![2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(),
        );
        state.insert("background.color", TensorBlob::new(vec![1, 4], vec![0.5; 4]).unwrap());
        state
    }

    #[test]
    fn test_blob_shape_check() {
        assert!(TensorBlob::new(vec![2, 2], vec![0.0; 3]).is_err());
        assert_eq!(TensorBlob::new(vec![], vec![1.0]).unwrap().numel(), 1);
    }

    #[test]
    fn test_save_load() {
        let state = sample_state();
        let mut buffer = Vec::new();
        save_state_dict(&state, &mut buffer).unwrap();

        let loaded = load_state_dict(&mut buffer.as_slice()).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(
            loaded.keys().collect::<Vec<_>>(),
            vec!["background.color", "geometry.grid"]
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut buffer = Vec::new();
        save_state_dict(&sample_state(), &mut buffer).unwrap();
        buffer[0] = b'X';
        assert!(matches!(
            load_state_dict(&mut buffer.as_slice()),
            Err(DreamIoError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let mut buffer = Vec::new();
        save_state_dict(&sample_state(), &mut buffer).unwrap();
        buffer.truncate(buffer.len() - 3);
        assert!(matches!(
            load_state_dict(&mut buffer.as_slice()),
            Err(DreamIoError::Io(_))
        ));
    }

    #[test]
    fn test_retain() {
        let mut state = sample_state();
        state.retain(|name| name.starts_with("geometry."));
        assert_eq!(state.len(), 1);
        assert!(state.contains_key("geometry.grid"));
        assert_eq!(state.total_values(), 6);
    }
}
