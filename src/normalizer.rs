use regex::Regex;

use crate::table::{Cell, HeaderSchema, WideTable};

/// A wordform observed in the corpus together with its raw frequency.
#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct WordformFrequency {
    pub wordform : String,
    pub frequency : f64,
}

/// Counts of rows removed while cleaning, for logging.
#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(Default)]
#[derive(PartialEq, Eq)]
pub struct CleaningStats {
    pub stacked : usize,
    pub missing : usize,
    pub non_positive : usize,
    pub non_alphabetic : usize,
}

impl CleaningStats {
    pub fn kept(&self) -> usize
    {
        self.stacked - self.missing - self.non_positive - self.non_alphabetic
    }
}

/// Stacks every wordform/frequency pair block into one long list of cells,
/// blocks in column order and rows in source order.
pub fn reshape<'a>(table : &'a WideTable, schema : &HeaderSchema) -> Vec<(&'a Cell, &'a Cell)>
{
    let mut stacked = Vec::with_capacity(table.rows.len() * schema.pairs.len());
    for pair in &schema.pairs
    {
        for row in 0..table.rows.len()
        {
            stacked.push((table.cell(row, pair.word_column), table.cell(row, pair.frequency_column)));
        }
    }
    stacked
}

/// Lowercases and trims wordforms, coerces frequencies, and drops rows that are
/// missing a field, have frequency <= 0 or fail `pattern`.
pub fn clean(stacked : &[(&Cell, &Cell)], pattern : &Regex) -> (Vec<WordformFrequency>, CleaningStats)
{
    let mut stats = CleaningStats { stacked : stacked.len(), ..CleaningStats::default() };
    let mut out = Vec::with_capacity(stacked.len());
    for (word, frequency) in stacked
    {
        let (wordform, frequency) = match (word.as_text(), frequency.as_number())
        {
            (Some(wordform), Some(frequency)) => (wordform.to_lowercase().trim().to_string(), frequency),
            _ =>
            {
                stats.missing += 1;
                continue;
            }
        };
        if frequency <= 0.0
        {
            stats.non_positive += 1;
            continue;
        }
        if !pattern.is_match(&wordform)
        {
            stats.non_alphabetic += 1;
            continue;
        }
        out.push(WordformFrequency { wordform, frequency });
    }
    (out, stats)
}

pub fn normalize(table : &WideTable, schema : &HeaderSchema, pattern : &Regex) -> (Vec<WordformFrequency>, CleaningStats)
{
    let stacked = reshape(table, schema);
    clean(&stacked, pattern)
}
