use std::path::Path;

use crate::error::{PipelineError, Result, Stage};

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct LexiconEntry {
    pub wordform : String,
    pub lemma : String,
}

/// Paradigm size is kept as read; it is only coerced after the merge.
#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct ParadigmSizeEntry {
    pub lemma : String,
    pub paradigm_size : String,
}

fn normalize_key(text : &str) -> String
{
    text.to_lowercase().trim().to_string()
}

/// Reads a headerless, unquoted, tab-separated file and returns its first two fields per row.
/// Rows with fewer than two fields are skipped.
pub(crate) fn read_two_columns(path : &Path, stage : Stage) -> Result<Vec<(String, String)>>
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| PipelineError::csv(stage, path, err))?;

    let mut out = Vec::new();
    let mut short_rows = 0usize;
    for record in reader.records()
    {
        let record = record.map_err(|err| PipelineError::csv(stage, path, err))?;
        match (record.get(0), record.get(1))
        {
            (Some(a), Some(b)) => out.push((a.to_string(), b.to_string())),
            _ => short_rows += 1,
        }
    }
    if short_rows > 0
    {
        tracing::debug!(path = %path.display(), short_rows, "skipped rows with fewer than two fields");
    }
    Ok(out)
}

pub fn lexicon_from_pairs(pairs : Vec<(String, String)>) -> Vec<LexiconEntry>
{
    pairs.into_iter()
        .map(|(wordform, lemma)| LexiconEntry { wordform : normalize_key(&wordform), lemma : normalize_key(&lemma) })
        .collect()
}

pub fn load_lexicon(path : &Path) -> Result<Vec<LexiconEntry>>
{
    Ok(lexicon_from_pairs(read_two_columns(path, Stage::Aggregate)?))
}

pub fn load_paradigm_sizes(path : &Path) -> Result<Vec<ParadigmSizeEntry>>
{
    let pairs = read_two_columns(path, Stage::Validate)?;
    Ok(pairs.into_iter().map(|(lemma, paradigm_size)| ParadigmSizeEntry { lemma, paradigm_size }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lexicon_is_lowercased_and_trimmed()
    {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Casas \tCasa\nperros\tperro\tNCMP000\n\nsolo\n\"\t\"\n").unwrap();
        let lexicon = load_lexicon(file.path()).unwrap();
        assert_eq!(lexicon, vec!(
            LexiconEntry { wordform : "casas".to_string(), lemma : "casa".to_string() },
            LexiconEntry { wordform : "perros".to_string(), lemma : "perro".to_string() },
            LexiconEntry { wordform : "\"".to_string(), lemma : "\"".to_string() },
        ));
    }

    #[test]
    fn paradigm_sizes_are_kept_raw()
    {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "casa\t2\nperro\t\nir\tmany\n").unwrap();
        let sizes = load_paradigm_sizes(file.path()).unwrap();
        assert_eq!(sizes.len(), 3);
        assert_eq!(sizes[1], ParadigmSizeEntry { lemma : "perro".to_string(), paradigm_size : "".to_string() });
        assert_eq!(sizes[2].paradigm_size, "many");
    }

    #[test]
    fn missing_file_reports_stage()
    {
        let dir = tempfile::tempdir().unwrap();
        let err = load_lexicon(&dir.path().join("nope.txt")).unwrap_err();
        assert_eq!(err.stage(), Stage::Aggregate);
    }
}
