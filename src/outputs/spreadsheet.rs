//! The collection spreadsheet.
//!
//! The workbook is opened once per run. Existing rows are kept, new rows are
//! appended to the first worksheet, and the workbook is written back to disk
//! after every append so a crash loses at most the row in flight.
//!
//! Writing back keeps every worksheet and every cell's type: numbers stay
//! numbers and native dates stay dates.

use crate::error::{EtlError, Result};
use crate::models::{ArticleRecord, SHEET_HEADERS, TIMESTAMP_FORMAT};
use calamine::{Data, DataType, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// A sheet row as text; `None` is an empty cell.
pub type SheetRow = Vec<Option<String>>;

const NEW_SHEET_NAME: &str = "Sheet1";
const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const DURATION_NUM_FORMAT: &str = "[h]:mm:ss";

/// Destination for collected records.
pub trait RecordSink {
    fn append(&mut self, record: &ArticleRecord) -> Result<()>;
}

/// One worksheet's cells, anchored at A1.
#[derive(Debug, Clone)]
struct StoredSheet {
    name: String,
    cells: Vec<Vec<Data>>,
}

impl StoredSheet {
    fn from_range(name: String, range: &calamine::Range<Data>) -> Self {
        let (row0, col0) = range.start().unwrap_or((0, 0));
        let mut cells: Vec<Vec<Data>> = vec![Vec::new(); row0 as usize];
        cells.extend(range.rows().map(|row| {
            let mut padded = vec![Data::Empty; col0 as usize];
            padded.extend(row.iter().cloned());
            padded
        }));
        Self { name, cells }
    }
}

/// An xlsx workbook held in memory and saved after each append.
#[derive(Debug)]
pub struct XlsxSheet {
    path: PathBuf,
    sheets: Vec<StoredSheet>,
}

impl XlsxSheet {
    /// Load `path` if it exists, otherwise start a workbook with the header row.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let sheets = if path.exists() {
            let sheets = read_sheets(&path)?;
            info!(
                worksheets = sheets.len(),
                rows = sheets[0].cells.len(),
                "Loaded existing spreadsheet"
            );
            sheets
        } else {
            info!("Creating new spreadsheet");
            vec![StoredSheet {
                name: NEW_SHEET_NAME.to_string(),
                cells: vec![
                    SHEET_HEADERS
                        .iter()
                        .map(|h| Data::String(h.to_string()))
                        .collect(),
                ],
            }]
        };
        Ok(Self { path, sheets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows of the collection worksheet, header included.
    pub fn row_count(&self) -> usize {
        self.sheets[0].cells.len()
    }

    fn save(&self) -> Result<()> {
        let datetime = Format::new().set_num_format(DATETIME_NUM_FORMAT);
        let duration = Format::new().set_num_format(DURATION_NUM_FORMAT);

        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;
            for (r, row) in sheet.cells.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    write_cell(worksheet, r as u32, c as u16, cell, &datetime, &duration)?;
                }
            }
        }
        workbook.save(&self.path)?;
        debug!(
            worksheets = self.sheets.len(),
            rows = self.row_count(),
            "Spreadsheet saved"
        );
        Ok(())
    }
}

impl RecordSink for XlsxSheet {
    fn append(&mut self, record: &ArticleRecord) -> Result<()> {
        let row = record
            .sheet_cells()
            .into_iter()
            .map(|cell| cell.map_or(Data::Empty, Data::String))
            .collect();
        self.sheets[0].cells.push(row);
        self.save()
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Data,
    datetime: &Format,
    duration: &Format,
) -> Result<()> {
    match cell {
        Data::Empty => {}
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            worksheet.write_string(row, col, s)?;
        }
        Data::Float(f) => {
            worksheet.write_number(row, col, *f)?;
        }
        Data::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        Data::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Data::DateTime(dt) => {
            let format = if dt.is_duration() { duration } else { datetime };
            worksheet.write_number_with_format(row, col, dt.as_f64(), format)?;
        }
        Data::Error(e) => {
            worksheet.write_string(row, col, e.to_string())?;
        }
    }
    Ok(())
}

fn read_sheets(path: &Path) -> Result<Vec<StoredSheet>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let names = workbook.sheet_names();
    if names.is_empty() {
        return Err(EtlError::EmptyWorkbook {
            path: path.display().to_string(),
        });
    }
    names
        .into_iter()
        .map(|name| -> Result<StoredSheet> {
            let range = workbook.worksheet_range(&name)?;
            Ok(StoredSheet::from_range(name, &range))
        })
        .collect()
}

/// Read every row of the first worksheet as text.
///
/// Native date cells are rendered with [`TIMESTAMP_FORMAT`]; empty and
/// error cells become `None`.
pub fn read_rows(path: &Path) -> Result<Vec<SheetRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EtlError::EmptyWorkbook {
            path: path.display().to_string(),
        })??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string()),
        other => Some(other.to_string()),
    }
}
