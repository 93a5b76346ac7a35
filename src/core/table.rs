//! Columnar metadata tables.
//!
//! A [`Table`] is an ordered schema of [`Column`]s plus an ordered list of
//! [`Row`]s holding one [`Object`] per column. Columns keep a stable id
//! and a unique name; positions shift when columns are inserted or
//! removed, ids never do.
//!
//! Rows carry a shared, immutable handle to the schema they were built
//! for. Schema changes build a new schema and re-point the table's rows,
//! so detached row copies keep describing the layout they were taken
//! from.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, Index};
use std::path::Path;
use std::sync::Arc;

use smallvec::SmallVec;

use super::object::Object;
use super::value::Value;
use crate::formats::TableFile;
use crate::io::FileMode;
use crate::util::{Error, Result, Type};

/// Table column descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    id: usize,
    name: String,
    ty: Type,
    description: String,
}

impl Column {
    /// Id of a column that has not been added to a table yet.
    pub const NO_ID: usize = 0;

    /// Column whose id is assigned by the table on insertion.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self::with_id(Self::NO_ID, name, ty)
    }

    /// Column with an explicit id.
    pub fn with_id(id: usize, name: impl Into<String>, ty: Type) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<column id=\"{}\" name=\"{}\" type=\"{}\" />",
            self.id,
            self.name,
            self.ty.name()
        )
    }
}

/// Column lookup key: by name or by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKey<'a> {
    Name(&'a str),
    Id(usize),
}

impl<'a> From<&'a str> for ColumnKey<'a> {
    fn from(name: &'a str) -> Self {
        ColumnKey::Name(name)
    }
}

impl<'a> From<&'a String> for ColumnKey<'a> {
    fn from(name: &'a String) -> Self {
        ColumnKey::Name(name)
    }
}

impl From<usize> for ColumnKey<'_> {
    fn from(id: usize) -> Self {
        ColumnKey::Id(id)
    }
}

impl fmt::Display for ColumnKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Name(name) => write!(f, "'{}'", name),
            ColumnKey::Id(id) => write!(f, "id {}", id),
        }
    }
}

/// Ordered columns plus lookup indices.
#[derive(Clone, Debug, Default)]
struct Schema {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<usize, usize>,
    max_id: usize,
}

impl Schema {
    fn index_of(&self, key: ColumnKey<'_>) -> Result<usize> {
        let found = match key {
            ColumnKey::Name(name) => self.by_name.get(name),
            ColumnKey::Id(id) => self.by_id.get(&id),
        };
        found
            .copied()
            .ok_or_else(|| Error::UnknownColumn(key.to_string()))
    }

    fn reindex(&mut self) {
        self.by_name.clear();
        self.by_id.clear();
        for (i, col) in self.columns.iter().enumerate() {
            self.by_name.insert(col.name.clone(), i);
            self.by_id.insert(col.id, i);
        }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

/// One record of a table: an object per column, in column order.
///
/// Cells are reached by position, by column name or by column id.
/// Every cell holds its column's type; writes go through [`CellMut`],
/// which casts into that type. Cloning a row copies every object.
#[derive(Clone, Debug)]
pub struct Row {
    schema: Arc<Schema>,
    values: Vec<Object>,
}

impl Row {
    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cell at column position `pos`.
    pub fn at(&self, pos: usize) -> Result<&Object> {
        let count = self.values.len();
        self.values
            .get(pos)
            .ok_or(Error::IndexOutOfRange { index: pos, count })
    }

    pub fn at_mut(&mut self, pos: usize) -> Result<CellMut<'_>> {
        let count = self.values.len();
        self.values
            .get_mut(pos)
            .map(|obj| CellMut { obj })
            .ok_or(Error::IndexOutOfRange { index: pos, count })
    }

    /// Cell of a column given by name or id.
    pub fn get<'k>(&self, key: impl Into<ColumnKey<'k>>) -> Result<&Object> {
        let pos = self.schema.index_of(key.into())?;
        Ok(&self.values[pos])
    }

    pub fn get_mut<'k>(&mut self, key: impl Into<ColumnKey<'k>>) -> Result<CellMut<'_>> {
        let pos = self.schema.index_of(key.into())?;
        Ok(CellMut {
            obj: &mut self.values[pos],
        })
    }

    /// Assign a cell, coercing the value into the column type.
    pub fn set<'k>(&mut self, key: impl Into<ColumnKey<'k>>, value: impl Into<Value>) -> Result<()> {
        self.get_mut(key)?.set(value)
    }

    /// Columns this row was built for.
    pub fn columns(&self) -> &[Column] {
        &self.schema.columns
    }

    pub fn values(&self) -> &[Object] {
        &self.values
    }

    /// Iterate `(column, cell)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&Column, &Object)> {
        self.schema.columns.iter().zip(self.values.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Column, CellMut<'_>)> {
        self.schema
            .columns
            .iter()
            .zip(self.values.iter_mut().map(|obj| CellMut { obj }))
    }

    /// Cast every cell to its column type.
    fn conform(&mut self) -> Result<()> {
        for (col, obj) in self.schema.columns.iter().zip(self.values.iter_mut()) {
            if obj.ty() != col.ty {
                obj.convert(col.ty)?;
            }
        }
        Ok(())
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values && self.schema == other.schema
    }
}

impl Index<&str> for Row {
    type Output = Object;

    fn index(&self, name: &str) -> &Object {
        match self.schema.index_of(ColumnKey::Name(name)) {
            Ok(pos) => &self.values[pos],
            Err(_) => panic!("no column named '{name}'"),
        }
    }
}

impl Index<usize> for Row {
    type Output = Object;

    fn index(&self, pos: usize) -> &Object {
        &self.values[pos]
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<row ")?;
        for obj in &self.values {
            write!(f, "{}\t", obj)?;
        }
        write!(f, " />")
    }
}

/// Write access to one cell.
///
/// Only value assignments are offered, so the cell keeps the type of its
/// column. Reads go through `Deref` to the [`Object`].
#[derive(Debug)]
pub struct CellMut<'a> {
    obj: &'a mut Object,
}

impl CellMut<'_> {
    /// Assign `value`, cast into the column type.
    pub fn set(&mut self, value: impl Into<Value>) -> Result<()> {
        self.obj.set(value)
    }

    /// Parse `text` as the column type.
    pub fn parse(&mut self, text: &str) -> Result<()> {
        self.obj.parse(text)
    }
}

impl Deref for CellMut<'_> {
    type Target = Object;

    fn deref(&self) -> &Object {
        &*self.obj
    }
}

/// Write access to a row stored in a [`Table`].
///
/// Cells can be assigned but the row cannot be replaced, so it always
/// matches the table's columns.
#[derive(Debug)]
pub struct RowMut<'a> {
    row: &'a mut Row,
}

impl RowMut<'_> {
    pub fn at_mut(&mut self, pos: usize) -> Result<CellMut<'_>> {
        self.row.at_mut(pos)
    }

    pub fn get_mut<'k>(&mut self, key: impl Into<ColumnKey<'k>>) -> Result<CellMut<'_>> {
        self.row.get_mut(key)
    }

    /// Assign a cell, coercing the value into the column type.
    pub fn set<'k>(&mut self, key: impl Into<ColumnKey<'k>>, value: impl Into<Value>) -> Result<()> {
        self.row.set(key, value)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Column, CellMut<'_>)> {
        self.row.iter_mut()
    }
}

impl Deref for RowMut<'_> {
    type Target = Row;

    fn deref(&self) -> &Row {
        &*self.row
    }
}

/// Iterator over the rows of a table as [`RowMut`] handles.
#[derive(Debug)]
pub struct RowsMut<'a> {
    inner: std::slice::IterMut<'a, Row>,
}

impl<'a> Iterator for RowsMut<'a> {
    type Item = RowMut<'a>;

    fn next(&mut self) -> Option<RowMut<'a>> {
        self.inner.next().map(|row| RowMut { row })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for RowsMut<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|row| RowMut { row })
    }
}

impl ExactSizeIterator for RowsMut<'_> {}

/// One parsed sort key: column position and direction.
#[derive(Clone, Copy, Debug)]
struct SortKey {
    pos: usize,
    descending: bool,
}

/// A schema of typed columns plus an ordered collection of rows.
///
/// # Example
///
/// ```
/// use emcore::core::{Column, Table};
/// use emcore::util::Type;
///
/// let mut table = Table::new();
/// table.add_column(Column::new("rlnImageName", Type::STRING)).unwrap();
/// table.add_column(Column::new("rlnDefocusU", Type::DOUBLE)).unwrap();
///
/// let mut row = table.create_row();
/// row.set("rlnImageName", "1@particles.mrcs").unwrap();
/// row.set("rlnDefocusU", 15060.5).unwrap();
/// table.add_row(&row).unwrap();
///
/// assert_eq!(table.len(), 1);
/// assert_eq!(table[0]["rlnDefocusU"], 15060.5);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Table {
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl Table {
    /// Empty table without columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the given columns, added in order.
    pub fn with_columns(columns: impl IntoIterator<Item = Column>) -> Result<Self> {
        let mut table = Self::new();
        for col in columns {
            table.add_column(col)?;
        }
        Ok(table)
    }

    // === Columns ===

    /// Append a column; returns its position.
    pub fn add_column(&mut self, column: Column) -> Result<usize> {
        let pos = self.schema.columns.len();
        self.insert_column_impl(column, pos, None)
    }

    /// Append a column, filling existing rows with `default`.
    pub fn add_column_with_default(
        &mut self,
        column: Column,
        default: impl Into<Value>,
    ) -> Result<usize> {
        let pos = self.schema.columns.len();
        self.insert_column_impl(column, pos, Some(default.into()))
    }

    /// Insert a column at `pos`; later columns shift right by one.
    pub fn insert_column(&mut self, column: Column, pos: usize) -> Result<usize> {
        self.insert_column_impl(column, pos, None)
    }

    pub fn insert_column_with_default(
        &mut self,
        column: Column,
        pos: usize,
        default: impl Into<Value>,
    ) -> Result<usize> {
        self.insert_column_impl(column, pos, Some(default.into()))
    }

    fn insert_column_impl(
        &mut self,
        mut column: Column,
        pos: usize,
        default: Option<Value>,
    ) -> Result<usize> {
        let count = self.schema.columns.len();
        if pos > count {
            return Err(Error::IndexOutOfRange { index: pos, count });
        }
        if column.ty.is_null() {
            return Err(Error::invalid(format!(
                "column '{}' has no type",
                column.name
            )));
        }
        if self.schema.by_name.contains_key(&column.name) {
            return Err(Error::DuplicateColumn(column.name));
        }
        if column.id == Column::NO_ID {
            column.id = self.schema.max_id + 1;
        } else if self.schema.by_id.contains_key(&column.id) {
            return Err(Error::DuplicateColumn(format!("id {}", column.id)));
        }

        let fill = match default {
            Some(v) => Object::from(v.cast(column.ty)?),
            None => Object::with_type(column.ty),
        };

        tracing::trace!(name = %column.name, id = column.id, pos, "insert column");

        let mut schema = (*self.schema).clone();
        schema.max_id = schema.max_id.max(column.id);
        schema.columns.insert(pos, column);
        schema.reindex();
        let schema = Arc::new(schema);

        for row in &mut self.rows {
            row.values.insert(pos, fill.clone());
            row.schema = Arc::clone(&schema);
        }
        self.schema = schema;
        Ok(pos)
    }

    /// Remove a column and its cell from every row.
    pub fn remove_column<'k>(&mut self, key: impl Into<ColumnKey<'k>>) -> Result<Column> {
        let pos = self.schema.index_of(key.into())?;

        let mut schema = (*self.schema).clone();
        let removed = schema.columns.remove(pos);
        schema.reindex();
        let schema = Arc::new(schema);

        for row in &mut self.rows {
            row.values.remove(pos);
            row.schema = Arc::clone(&schema);
        }
        self.schema = schema;
        Ok(removed)
    }

    /// Position of a column given by name or id.
    pub fn get_index<'k>(&self, key: impl Into<ColumnKey<'k>>) -> Result<usize> {
        self.schema.index_of(key.into())
    }

    pub fn column<'k>(&self, key: impl Into<ColumnKey<'k>>) -> Result<&Column> {
        let pos = self.get_index(key)?;
        Ok(&self.schema.columns[pos])
    }

    pub fn column_at(&self, pos: usize) -> Option<&Column> {
        self.schema.columns.get(pos)
    }

    pub fn columns(&self) -> &[Column] {
        &self.schema.columns
    }

    pub fn column_count(&self) -> usize {
        self.schema.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.columns.iter().map(|c| c.name()).collect()
    }

    // === Rows ===

    /// A detached row matching the current schema, all cells zero.
    pub fn create_row(&self) -> Row {
        Row {
            schema: Arc::clone(&self.schema),
            values: self
                .schema
                .columns
                .iter()
                .map(|c| Object::with_type(c.ty))
                .collect(),
        }
    }

    /// Append a copy of `row`. The row must have been created for a schema
    /// with the same columns; cells are cast to the column types.
    pub fn add_row(&mut self, row: &Row) -> Result<()> {
        if !Arc::ptr_eq(&row.schema, &self.schema) && *row.schema != *self.schema {
            return Err(Error::MalformedRow {
                line: self.rows.len() + 1,
                reason: "row columns do not match the table".to_string(),
            });
        }
        let mut row = Row {
            schema: Arc::clone(&self.schema),
            values: row.values.clone(),
        };
        row.conform()?;
        self.rows.push(row);
        Ok(())
    }

    /// Append a row built by [`Table::create_row`] on this table, without
    /// copying or casting.
    pub(crate) fn push_row(&mut self, row: Row) {
        debug_assert!(Arc::ptr_eq(&row.schema, &self.schema));
        self.rows.push(row);
    }

    pub fn get(&self, index: usize) -> Result<&Row> {
        let count = self.rows.len();
        self.rows
            .get(index)
            .ok_or(Error::IndexOutOfRange { index, count })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<RowMut<'_>> {
        let count = self.rows.len();
        self.rows
            .get_mut(index)
            .map(|row| RowMut { row })
            .ok_or(Error::IndexOutOfRange { index, count })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn iter_mut(&mut self) -> RowsMut<'_> {
        RowsMut {
            inner: self.rows.iter_mut(),
        }
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove all rows; columns are kept.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Stable multi-key sort.
    ///
    /// Each key is a column name, optionally followed by `ASC` or `DESC`
    /// (case insensitive). Ties fall through to the next key, then keep
    /// their original order.
    pub fn sort(&mut self, by: &[&str]) -> Result<()> {
        let mut keys: SmallVec<[SortKey; 4]> = SmallVec::new();
        for key in by {
            keys.push(self.parse_sort_key(key)?);
        }
        if keys.is_empty() {
            return Ok(());
        }

        self.rows.sort_by(|a, b| {
            for key in &keys {
                let ord = a.values[key.pos]
                    .value()
                    .compare(b.values[key.pos].value());
                let ord = if key.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }

    fn parse_sort_key(&self, text: &str) -> Result<SortKey> {
        let mut parts = text.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| Error::invalid("empty sort key"))?;
        let descending = match parts.next() {
            None => false,
            Some(dir) if dir.eq_ignore_ascii_case("ASC") => false,
            Some(dir) if dir.eq_ignore_ascii_case("DESC") => true,
            Some(dir) => {
                return Err(Error::invalid(format!(
                    "bad sort direction '{dir}' in '{text}'"
                )))
            }
        };
        if parts.next().is_some() {
            return Err(Error::invalid(format!("bad sort key '{text}'")));
        }
        Ok(SortKey {
            pos: self.get_index(name)?,
            descending,
        })
    }

    // === File I/O ===

    /// Read the first block of a table file.
    pub fn read(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.read_block(path, "")
    }

    /// Read the named block of a table file (empty name: first block).
    /// On error the table is left unchanged.
    pub fn read_block(&mut self, path: impl AsRef<Path>, name: &str) -> Result<()> {
        let mut file = TableFile::new();
        file.open(path, FileMode::ReadOnly)?;
        file.read(name, self)?;
        file.close()
    }

    /// Append this table as block `name` to a table file, creating it if
    /// needed.
    pub fn write(&self, path: impl AsRef<Path>, name: &str) -> Result<()> {
        let mut file = TableFile::new();
        file.open(path, FileMode::ReadWrite)?;
        file.write(name, self)?;
        file.close()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.rows.len() == other.rows.len()
            && self
                .rows
                .iter()
                .zip(&other.rows)
                .all(|(a, b)| a.values == b.values)
    }
}

impl Index<usize> for Table {
    type Output = Row;

    fn index(&self, index: usize) -> &Row {
        &self.rows[index]
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a mut Table {
    type Item = RowMut<'a>;
    type IntoIter = RowsMut<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<table>")?;
        writeln!(f, "   <columns>")?;
        for col in self.columns() {
            writeln!(f, "      {}", col)?;
        }
        writeln!(f, "   </columns>")?;
        writeln!(f, "   <rows>")?;
        for row in &self.rows {
            write!(f, "     ")?;
            for obj in &row.values {
                write!(f, " {}", obj)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "   </rows>")?;
        writeln!(f, "</table>")
    }
}
