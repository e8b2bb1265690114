use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{PipelineError, Result, Stage, StructureProblem};

const WORD_MARKER : &str = "Word";

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_field(field : &str) -> Cell
    {
        if field.is_empty()
        {
            Cell::Empty
        }
        else
        {
            Cell::Text(field.to_string())
        }
    }
    fn from_sheet(data : &Data) -> Cell
    {
        match data
        {
            Data::Empty => Cell::Empty,
            Data::Int(x) => Cell::Number(*x as f64),
            Data::Float(x) => Cell::Number(*x),
            Data::String(s) => Cell::from_field(s),
            other => Cell::Text(other.to_string()),
        }
    }
    /// Text form of the cell, `None` when the cell is missing.
    pub fn as_text(&self) -> Option<String>
    {
        match self
        {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(x) => Some(x.to_string()),
        }
    }
    /// Numeric form of the cell, `None` when missing or not a finite number.
    pub fn as_number(&self) -> Option<f64>
    {
        let value = match self
        {
            Cell::Empty => return None,
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
            Cell::Number(x) => *x,
        };
        if value.is_finite()
        {
            Some(value)
        }
        else
        {
            None
        }
    }
}

/// A sheet as read from disk: the header row plus the data rows below it.
#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
pub struct WideTable {
    pub headers : Vec<String>,
    pub rows : Vec<Vec<Cell>>,
}

impl WideTable {
    pub fn new(headers : Vec<String>, rows : Vec<Vec<Cell>>) -> WideTable
    {
        WideTable { headers, rows }
    }
    pub fn cell(&self, row : usize, column : usize) -> &Cell
    {
        self.rows[row].get(column).unwrap_or(&Cell::Empty)
    }
}

fn is_spreadsheet(path : &Path) -> bool
{
    match path.extension().and_then(|x| x.to_str()).map(|x| x.to_ascii_lowercase())
    {
        Some(ext) => matches!(ext.as_str(), "xlsx" | "xlsm" | "xls" | "xlsb" | "ods"),
        None => false,
    }
}

/// Reads the wide frequency source: spreadsheets through calamine, anything else as delimited text.
pub fn read_wide_table(path : &Path) -> Result<WideTable>
{
    if is_spreadsheet(path)
    {
        read_spreadsheet(path)
    }
    else
    {
        let delimiter = match path.extension().and_then(|x| x.to_str())
        {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
            _ => b'\t',
        };
        read_delimited(path, delimiter)
    }
}

fn read_spreadsheet(path : &Path) -> Result<WideTable>
{
    let fail = |message : String| PipelineError::Spreadsheet { stage : Stage::Normalize, path : path.to_path_buf(), message };

    let mut workbook = open_workbook_auto(path).map_err(|err| fail(err.to_string()))?;
    let range = match workbook.worksheet_range_at(0)
    {
        Some(range) => range.map_err(|err| fail(err.to_string()))?,
        None => return Err(fail("workbook has no worksheets".to_string())),
    };

    let mut rows = range.rows();
    let headers = match rows.next()
    {
        Some(header_row) => header_row.iter().map(|x| x.to_string()).collect::<Vec<_>>(),
        None => return Err(PipelineError::structure(Stage::Normalize, path, StructureProblem::EmptyTable)),
    };
    let rows = rows.map(|row| row.iter().map(Cell::from_sheet).collect()).collect();
    Ok(WideTable::new(headers, rows))
}

fn read_delimited(path : &Path, delimiter : u8) -> Result<WideTable>
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| PipelineError::csv(Stage::Normalize, path, err))?;

    let mut records = reader.records();
    let headers = match records.next()
    {
        Some(record) => record.map_err(|err| PipelineError::csv(Stage::Normalize, path, err))?.iter().map(|x| x.to_string()).collect::<Vec<_>>(),
        None => return Err(PipelineError::structure(Stage::Normalize, path, StructureProblem::EmptyTable)),
    };
    let mut rows = Vec::new();
    for record in records
    {
        let record = record.map_err(|err| PipelineError::csv(Stage::Normalize, path, err))?;
        rows.push(record.iter().map(Cell::from_field).collect());
    }
    Ok(WideTable::new(headers, rows))
}

/// One `Word` column and the frequency column to its right.
#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct ColumnPair {
    pub label : String,
    pub word_column : usize,
    pub frequency_column : usize,
}

/// Typed view of the header row: the wordform/frequency pairs in column order.
#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
#[derive(PartialEq)]
pub struct HeaderSchema {
    pub pairs : Vec<ColumnPair>,
}

fn is_word_header(header : &str) -> bool
{
    header.trim().starts_with(WORD_MARKER)
}

impl HeaderSchema {
    pub fn parse(headers : &[String]) -> std::result::Result<HeaderSchema, StructureProblem>
    {
        let mut pairs = Vec::new();
        for (i, header) in headers.iter().enumerate()
        {
            if !is_word_header(header)
            {
                continue;
            }
            match headers.get(i + 1)
            {
                None =>
                {
                    tracing::warn!(column = i, label = %header.trim(), "trailing `Word` column has no frequency column; skipping");
                }
                Some(next) if is_word_header(next) =>
                {
                    return Err(StructureProblem::AdjacentWordColumns { column : i, label : header.trim().to_string() });
                }
                Some(_) => pairs.push(ColumnPair { label : header.trim().to_string(), word_column : i, frequency_column : i + 1 }),
            }
        }
        Ok(HeaderSchema { pairs })
    }
    pub fn is_empty(&self) -> bool
    {
        self.pairs.is_empty()
    }
}
