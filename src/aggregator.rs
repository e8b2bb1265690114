use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use regex::Regex;

use crate::error::{PipelineError, Result, Stage, StructureProblem};
use crate::lexicon::LexiconEntry;
use crate::normalizer::WordformFrequency;

pub const BAND_TABLE_HEADER : [&str; 4] = ["lemma", "frequency", "rank", "band_id"];

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct LemmaFrequency {
    pub lemma : String,
    pub frequency : f64,
    pub rank : u64,
    pub band_id : u32,
}

/// Lemmas in rank order, plus the highest band reached.
#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
#[derive(PartialEq)]
pub struct BandTable {
    pub lemmas : Vec<LemmaFrequency>,
    pub max_band : u32,
}

/// One joined row: a corpus frequency credited to a lemma.
#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct Contribution<'a> {
    pub lemma : &'a str,
    pub frequency : f64,
}

/// Inner join on wordform. A wordform listed under several lemmas yields one
/// contribution per lexicon entry; nothing is deduplicated.
pub fn join<'a>(forms : &'a [WordformFrequency], lexicon : &'a [LexiconEntry]) -> Vec<Contribution<'a>>
{
    let mut lemmas_by_form : HashMap<&str, Vec<&str>> = HashMap::new();
    for entry in lexicon
    {
        lemmas_by_form.entry(entry.wordform.as_str()).or_default().push(entry.lemma.as_str());
    }

    let mut out = Vec::new();
    for form in forms
    {
        if let Some(lemmas) = lemmas_by_form.get(form.wordform.as_str())
        {
            for &lemma in lemmas
            {
                out.push(Contribution { lemma, frequency : form.frequency });
            }
        }
    }
    out
}

/// Sums frequency per lemma, keeping only lemmas that match `pattern`.
/// Lemmas come out in ascending order.
pub fn aggregate(contributions : &[Contribution], pattern : &Regex) -> Vec<(String, f64)>
{
    let mut totals : BTreeMap<&str, f64> = BTreeMap::new();
    for contribution in contributions
    {
        if !pattern.is_match(contribution.lemma)
        {
            continue;
        }
        *totals.entry(contribution.lemma).or_insert(0.0) += contribution.frequency;
    }
    totals.into_iter().map(|(lemma, frequency)| (lemma.to_string(), frequency)).collect()
}

pub fn band_of(rank : u64, band_size : usize) -> u32
{
    ((rank - 1) / band_size as u64 + 1) as u32
}

/// Ranks by descending frequency. The sort is stable over the ascending-lemma
/// input, so equal frequencies rank alphabetically.
pub fn rank_and_band(mut totals : Vec<(String, f64)>, band_size : usize) -> BandTable
{
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));
    let lemmas = totals.into_iter()
        .enumerate()
        .map(|(i, (lemma, frequency))|
        {
            let rank = i as u64 + 1;
            LemmaFrequency { lemma, frequency, rank, band_id : band_of(rank, band_size) }
        })
        .collect::<Vec<_>>();
    let max_band = lemmas.last().map(|x| x.band_id).unwrap_or(0);
    BandTable { lemmas, max_band }
}

pub fn build_band_table(forms : &[WordformFrequency], lexicon : &[LexiconEntry], pattern : &Regex, band_size : usize) -> BandTable
{
    let joined = join(forms, lexicon);
    tracing::info!("Lemmatized {} corpus wordforms", joined.len());
    let totals = aggregate(&joined, pattern);
    tracing::info!("Produced {} lemmas", totals.len());
    rank_and_band(totals, band_size)
}

pub fn write_band_table(path : &Path, table : &BandTable) -> Result<()>
{
    let fail = |err : csv::Error| PipelineError::csv(Stage::Aggregate, path, err);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(path)
        .map_err(fail)?;
    writer.write_record(BAND_TABLE_HEADER).map_err(fail)?;
    for row in &table.lemmas
    {
        writer.write_record([row.lemma.clone(), row.frequency.to_string(), row.rank.to_string(), row.band_id.to_string()]).map_err(fail)?;
    }
    writer.flush().map_err(|err| PipelineError::io(Stage::Aggregate, path, err))
}

fn column_index(headers : &csv::StringRecord, name : &'static str, stage : Stage, path : &Path) -> Result<usize>
{
    headers.iter()
        .position(|x| x == name)
        .ok_or_else(|| PipelineError::structure(stage, path, StructureProblem::MissingColumn(name)))
}

fn bad_cell(record : &csv::StringRecord, column : &'static str, value : &str, stage : Stage, path : &Path) -> PipelineError
{
    let line = record.position().map(|x| x.line()).unwrap_or(0);
    PipelineError::structure(stage, path, StructureProblem::BadCell { line, column, value : value.to_string() })
}

fn text_field(record : &csv::StringRecord, index : usize, column : &'static str, stage : Stage, path : &Path) -> Result<String>
{
    match record.get(index)
    {
        Some(value) => Ok(value.to_string()),
        None => Err(bad_cell(record, column, "", stage, path)),
    }
}

fn parse_field<T : std::str::FromStr>(record : &csv::StringRecord, index : usize, column : &'static str, stage : Stage, path : &Path) -> Result<T>
{
    let value = record.get(index).unwrap_or("");
    value.parse::<T>().map_err(|_| bad_cell(record, column, value, stage, path))
}

/// Reads a band table written by `write_band_table`; `stage` names the consumer.
pub fn read_band_table(path : &Path, stage : Stage) -> Result<BandTable>
{
    let fail = |err : csv::Error| PipelineError::csv(stage, path, err);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(fail)?;

    let headers = reader.headers().map_err(fail)?.clone();
    let lemma_index = column_index(&headers, "lemma", stage, path)?;
    let frequency_index = column_index(&headers, "frequency", stage, path)?;
    let rank_index = column_index(&headers, "rank", stage, path)?;
    let band_index = column_index(&headers, "band_id", stage, path)?;

    let mut lemmas = Vec::new();
    for record in reader.records()
    {
        let record = record.map_err(fail)?;
        lemmas.push(LemmaFrequency {
            lemma : text_field(&record, lemma_index, "lemma", stage, path)?,
            frequency : parse_field(&record, frequency_index, "frequency", stage, path)?,
            rank : parse_field(&record, rank_index, "rank", stage, path)?,
            band_id : parse_field(&record, band_index, "band_id", stage, path)?,
        });
    }
    let max_band = lemmas.iter().map(|x| x.band_id).max().unwrap_or(0);
    Ok(BandTable { lemmas, max_band })
}
