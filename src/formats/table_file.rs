//! Table file sessions and the text format trait.

use std::fmt;
use std::path::Path;

use super::{extension_of, find_table_format, TableFormatEntry};
use crate::core::Table;
use crate::io::{FileMode, FileStream};
use crate::util::{Error, Result};

/// Location of one named block inside a table file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub name: String,
    /// Byte offset of the first line after the block marker
    pub start: usize,
    /// Byte offset one past the block end
    pub end: usize,
    /// 1-based line number of the block marker
    pub line: usize,
}

/// One structured text format.
///
/// Files are indexed once with [`scan`](TableFormat::scan); blocks are
/// parsed on demand from the cached text.
pub trait TableFormat: Send + fmt::Debug {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Locate every block in `text`, in file order.
    fn scan(&mut self, text: &str) -> Result<Vec<BlockInfo>>;

    /// Parse one block into `table`, replacing its columns and rows.
    fn read_block(&mut self, text: &str, block: &BlockInfo, table: &mut Table) -> Result<()>;

    /// Render `table` as block `name`. `new_file` is set for the first
    /// block of an empty file.
    fn write_block(&mut self, out: &mut String, name: &str, table: &Table, new_file: bool)
        -> Result<()>;
}

/// An open table file.
///
/// ```no_run
/// use emcore::core::Table;
/// use emcore::formats::TableFile;
/// use emcore::io::FileMode;
///
/// let mut file = TableFile::new();
/// file.open("run_it025_data.star", FileMode::ReadOnly)?;
/// let mut table = Table::new();
/// for name in file.table_names()? {
///     file.read(&name, &mut table)?;
///     println!("{}: {} rows", name, table.len());
/// }
/// # Ok::<(), emcore::Error>(())
/// ```
pub struct TableFile {
    forced: Option<&'static TableFormatEntry>,
    format: Option<Box<dyn TableFormat>>,
    stream: Option<FileStream>,
    text: String,
    blocks: Vec<BlockInfo>,
}

impl Default for TableFile {
    fn default() -> Self {
        Self::new()
    }
}

impl TableFile {
    /// Session that picks its format from the file extension.
    pub fn new() -> Self {
        Self {
            forced: None,
            format: None,
            stream: None,
            text: String::new(),
            blocks: Vec::new(),
        }
    }

    /// Session bound to a format by name or extension.
    pub fn with_format(id: &str) -> Result<Self> {
        let entry = find_table_format(id).ok_or_else(|| Error::UnsupportedFormat(id.to_string()))?;
        let mut file = Self::new();
        file.forced = Some(entry);
        Ok(file)
    }

    pub fn has_impl(id: &str) -> bool {
        find_table_format(id).is_some()
    }

    /// Open `path` and index its blocks. An open file is closed first.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), mode = ?mode))]
    pub fn open(&mut self, path: impl AsRef<Path>, mode: FileMode) -> Result<()> {
        self.close()?;
        let path = path.as_ref();

        let entry = match self.forced {
            Some(entry) => entry,
            None => {
                let ext = extension_of(path);
                find_table_format(&ext).ok_or(Error::UnsupportedFormat(ext))?
            }
        };

        let stream = FileStream::open_opts(path, mode, mode == FileMode::ReadOnly)?;
        let text = if stream.is_empty() {
            String::new()
        } else {
            stream.read_to_string()?
        };
        let mut format = (entry.build)();
        let blocks = format.scan(&text)?;
        tracing::debug!(format = entry.name, blocks = blocks.len(), "opened table file");

        self.format = Some(format);
        self.stream = Some(stream);
        self.text = text;
        self.blocks = blocks;
        Ok(())
    }

    /// Release the file. Safe to call when nothing is open.
    pub fn close(&mut self) -> Result<()> {
        self.format = None;
        self.text.clear();
        self.blocks.clear();
        if let Some(mut stream) = self.stream.take() {
            if stream.mode() != FileMode::ReadOnly {
                stream.flush()?;
            }
            tracing::trace!(path = %stream.path().display(), "closed table file");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Block names in file order.
    pub fn table_names(&self) -> Result<Vec<String>> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        Ok(self.blocks.iter().map(|b| b.name.clone()).collect())
    }

    /// Parse block `name` into `table`; an empty name selects the first
    /// block. On error `table` is left unchanged.
    #[tracing::instrument(skip_all, fields(name = name))]
    pub fn read(&mut self, name: &str, table: &mut Table) -> Result<()> {
        let format = self.format.as_mut().ok_or(Error::NotOpen)?;
        let block = if name.is_empty() {
            self.blocks.first()
        } else {
            self.blocks.iter().find(|b| b.name == name)
        }
        .ok_or_else(|| Error::UnknownTable(name.to_string()))?;

        format.read_block(&self.text, block, table)?;
        tracing::debug!(block = %block.name, rows = table.len(), columns = table.column_count(), "read table");
        Ok(())
    }

    /// Parse the first block.
    pub fn read_first(&mut self, table: &mut Table) -> Result<()> {
        self.read("", table)
    }

    /// Append `table` as block `name` at the end of the file.
    #[tracing::instrument(skip_all, fields(name = name))]
    pub fn write(&mut self, name: &str, table: &Table) -> Result<()> {
        let (Some(stream), Some(format)) = (self.stream.as_mut(), self.format.as_mut()) else {
            return Err(Error::NotOpen);
        };
        if stream.mode() == FileMode::ReadOnly {
            return Err(Error::ReadOnly(stream.path().to_path_buf()));
        }

        let new_file = self.text.is_empty();
        let mut out = String::new();
        if !new_file && !self.text.ends_with('\n') {
            out.push('\n');
        }
        format.write_block(&mut out, name, table, new_file)?;
        stream.append(out.as_bytes())?;

        self.text.push_str(&out);
        self.blocks = format.scan(&self.text)?;
        tracing::debug!(rows = table.len(), bytes = out.len(), "wrote table");
        Ok(())
    }
}

impl Drop for TableFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("failed to close table file: {}", e);
        }
    }
}

impl fmt::Debug for TableFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableFile")
            .field("stream", &self.stream)
            .field("format", &self.format.as_ref().map(|b| b.name()))
            .field("blocks", &self.blocks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Column;
    use crate::util::Type;
    use tempfile::tempdir;

    fn two_row_table() -> Table {
        let mut t = Table::with_columns([
            Column::new("rlnImageName", Type::STRING),
            Column::new("rlnDefocusU", Type::DOUBLE),
        ])
        .unwrap();
        for (name, defocus) in [("1@a.mrcs", 10000.5), ("2@a.mrcs", 12000.25)] {
            let mut row = t.create_row();
            row.set("rlnImageName", name).unwrap();
            row.set("rlnDefocusU", defocus).unwrap();
            t.add_row(&row).unwrap();
        }
        t
    }

    #[test]
    fn test_has_impl() {
        assert!(TableFile::has_impl("star"));
        assert!(TableFile::has_impl("xmd"));
        assert!(!TableFile::has_impl("sqlite"));
        assert!(TableFile::with_format("csv").is_err());
    }

    #[test]
    fn test_not_open() {
        let mut f = TableFile::new();
        let mut t = Table::new();
        assert!(matches!(f.table_names(), Err(Error::NotOpen)));
        assert!(matches!(f.read("", &mut t), Err(Error::NotOpen)));
        assert!(matches!(f.write("x", &t), Err(Error::NotOpen)));
    }

    #[test]
    fn test_append_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.star");
        let table = two_row_table();

        let mut f = TableFile::new();
        f.open(&path, FileMode::ReadWrite).unwrap();
        f.write("first", &table).unwrap();
        f.write("second", &table).unwrap();
        assert_eq!(f.table_names().unwrap(), vec!["first", "second"]);
        f.close().unwrap();

        f.open(&path, FileMode::ReadWrite).unwrap();
        f.write("third", &table).unwrap();
        f.close().unwrap();

        f.open(&path, FileMode::ReadOnly).unwrap();
        assert_eq!(f.table_names().unwrap(), vec!["first", "second", "third"]);
        let mut back = Table::new();
        f.read("third", &mut back).unwrap();
        assert_eq!(back, table);
        assert!(matches!(f.write("fourth", &table), Err(Error::ReadOnly(_))));
    }

    #[test]
    fn test_unknown_table_keeps_destination() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.star");
        two_row_table().write(&path, "particles").unwrap();

        let mut t = two_row_table();
        t.clear();
        let mut f = TableFile::new();
        f.open(&path, FileMode::ReadOnly).unwrap();
        assert!(matches!(f.read("optics", &mut t), Err(Error::UnknownTable(_))));
        assert_eq!(t.column_count(), 2);
        assert!(t.is_empty());

        f.read_first(&mut t).unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_forced_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("images.txt");
        let table = two_row_table();

        let mut f = TableFile::with_format("xmd").unwrap();
        f.open(&path, FileMode::ReadWrite).unwrap();
        f.write("", &table).unwrap();
        f.close().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# XMIPP_STAR_1 *"));

        assert!(matches!(
            TableFile::new().open(&path, FileMode::ReadOnly),
            Err(Error::UnsupportedFormat(_))
        ));
        f.open(&path, FileMode::ReadOnly).unwrap();
        assert_eq!(f.table_names().unwrap(), vec!["noname"]);
        let mut back = Table::new();
        f.read_first(&mut back).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let mut f = TableFile::new();
        let err = f.open(dir.path().join("absent.star"), FileMode::ReadOnly).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
