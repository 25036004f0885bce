use super::ArchiveError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use walkdir::WalkDir;

/// Magic bytes used by BFME2 / RotWK archives
const BIG_MAGIC: &[u8; 4] = b"BIG4";

/// Fixed header: magic, archive size, entry count, first data offset
const HEADER_LEN: u64 = 16;

/// A file scheduled for packing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigEntry {
    /// Path inside the archive, backslash separated (e.g. `data\ini\weapon.ini`)
    pub name: String,

    /// Location of the content on disk
    pub source: Utf8PathBuf,

    /// Size in bytes, captured when the directory was indexed
    pub size: u64,
}

/// An archive built from a directory tree.
///
/// Content is streamed from disk on [`save`](Self::save); only the index is held in memory.
/// Entries are sorted by name so the same tree always produces the same bytes.
#[derive(Debug, Clone, Default)]
pub struct BigArchive {
    entries: Vec<BigEntry>,
}

impl BigArchive {
    /// Index every regular file below `dir`.
    ///
    /// Archive names are relative to `dir` and use backslashes, which is what the
    /// game's file system expects.
    pub fn from_directory(dir: &Utf8Path) -> Result<Self, ArchiveError> {
        if !dir.is_dir() {
            return Err(ArchiveError::SourceNotFound(dir.to_path_buf()));
        }

        let mut entries = Vec::new();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let source = Utf8PathBuf::from_path_buf(entry.path().to_path_buf())
                .map_err(|p| ArchiveError::NonUtf8Path(p.display().to_string()))?;

            let relative = source
                .strip_prefix(dir)
                .map_err(|_| ArchiveError::Malformed(format!("{} escapes {}", source, dir)))?;

            entries.push(BigEntry {
                name: archive_name(relative),
                size: entry.metadata()?.len(),
                source,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!("Indexed {} files from {}", entries.len(), dir);
        Ok(Self { entries })
    }

    /// Entries in archive order
    pub fn entries(&self) -> &[BigEntry] {
        &self.entries
    }

    /// Total size the archive will occupy on disk
    pub fn archive_size(&self) -> u64 {
        self.header_size() + self.entries.iter().map(|e| e.size).sum::<u64>()
    }

    fn header_size(&self) -> u64 {
        HEADER_LEN
            + self
                .entries
                .iter()
                .map(|e| 8 + e.name.len() as u64 + 1)
                .sum::<u64>()
    }

    /// Write the archive to `path`, replacing any existing file.
    ///
    /// Callers that need the final path to never hold a partial archive should save to a
    /// temporary sibling and rename it into place.
    pub fn save(&self, path: &Utf8Path) -> Result<(), ArchiveError> {
        let total = self.archive_size();
        let total_u32 = u32::try_from(total).map_err(|_| ArchiveError::TooLarge(total))?;
        let header_size = self.header_size() as u32;

        let file = File::create(path)?;
        let mut out = BufWriter::new(file);

        out.write_all(BIG_MAGIC)?;
        out.write_all(&total_u32.to_le_bytes())?;
        out.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        out.write_all(&header_size.to_be_bytes())?;

        let mut offset = header_size;
        for entry in &self.entries {
            out.write_all(&offset.to_be_bytes())?;
            out.write_all(&(entry.size as u32).to_be_bytes())?;
            out.write_all(entry.name.as_bytes())?;
            out.write_all(&[0])?;
            offset += entry.size as u32;
        }

        for entry in &self.entries {
            let mut source = File::open(&entry.source)?;
            let copied = std::io::copy(&mut source, &mut out)?;
            if copied != entry.size {
                return Err(ArchiveError::Malformed(format!(
                    "{} changed size while packing ({} -> {} bytes)",
                    entry.source, entry.size, copied
                )));
            }
        }

        out.flush()?;
        out.into_inner()
            .map_err(|e| ArchiveError::Io(e.into_error()))?
            .sync_all()?;

        tracing::debug!("Wrote {} entries ({} bytes) to {}", self.entries.len(), total, path);
        Ok(())
    }
}

/// Convert a relative path to the backslash-separated form stored in the index.
pub fn archive_name(relative: &Utf8Path) -> String {
    relative
        .components()
        .map(|c| c.as_str())
        .filter(|c| !c.is_empty() && *c != "." && *c != "/" && *c != "\\")
        .collect::<Vec<_>>()
        .join("\\")
}

/// Index entry read back from an existing archive
#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexEntry {
    name: String,
    offset: u32,
    size: u32,
}

/// Read-only view of a `.big` file
#[derive(Debug)]
pub struct BigReader {
    path: Utf8PathBuf,
    index: Vec<IndexEntry>,
}

impl BigReader {
    /// Open an archive and parse its index
    pub fn open(path: &Utf8Path) -> Result<Self, ArchiveError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != BIG_MAGIC && &magic != b"BIGF" {
            return Err(ArchiveError::Malformed(format!(
                "{} has unknown magic {:?}",
                path, magic
            )));
        }

        let declared_size = read_u32_le(&mut reader)?;
        let actual_size = fs::metadata(path)?.len();
        if u64::from(declared_size) != actual_size {
            return Err(ArchiveError::Malformed(format!(
                "{} declares {} bytes but is {} bytes",
                path, declared_size, actual_size
            )));
        }

        let count = read_u32_be(&mut reader)?;
        let _first_data = read_u32_be(&mut reader)?;

        let mut index = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let offset = read_u32_be(&mut reader)?;
            let size = read_u32_be(&mut reader)?;
            let name = read_cstring(&mut reader)?;

            if u64::from(offset) + u64::from(size) > actual_size {
                return Err(ArchiveError::Malformed(format!(
                    "entry {} points past the end of {}",
                    name, path
                )));
            }

            index.push(IndexEntry { name, offset, size });
        }

        Ok(Self {
            path: path.to_path_buf(),
            index,
        })
    }

    /// Names of all entries, in index order
    pub fn names(&self) -> Vec<&str> {
        self.index.iter().map(|e| e.name.as_str()).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Read one entry's content. Lookup is case-insensitive, like the game's.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let entry = self
            .index
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ArchiveError::EntryNotFound(name.to_string()))?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(u64::from(entry.offset)))?;

        let mut buf = vec![0u8; entry.size as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn read_u32_le<R: Read>(reader: &mut R) -> Result<u32, ArchiveError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u32_be<R: Read>(reader: &mut R) -> Result<u32, ArchiveError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_cstring<R: Read>(reader: &mut R) -> Result<String, ArchiveError> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte)?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|e| ArchiveError::Malformed(format!("entry name: {}", e)))
}
