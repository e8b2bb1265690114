use std::fs::File;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::aggregator::{self, BandTable};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage, StructureProblem};
use crate::lexicon;
use crate::normalizer::{self, WordformFrequency};
use crate::sanity;
use crate::table::{self, HeaderSchema};
use crate::validator::{self, BandSummary, ValidationResult};

fn hash_file(path : &Path, stage : Stage) -> Result<String>
{
    let mut file = File::open(path).map_err(|err| PipelineError::io(stage, path, err))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|err| PipelineError::io(stage, path, err))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Logs the SHA-256 of an input so runs can be matched to the data they used.
fn log_input(path : &Path, stage : Stage) -> Result<()>
{
    let sha256 = hash_file(path, stage)?;
    tracing::info!(%stage, path = %path.display(), %sha256, "input");
    Ok(())
}

/// Reads the wide corpus table and returns its cleaned wordform/frequency rows.
pub fn load_corpus(config : &PipelineConfig) -> Result<Vec<WordformFrequency>>
{
    let path = config.workspace(&config.corpus);
    tracing::info!("Loading corpus from {}", path.display());
    log_input(&path, Stage::Normalize)?;

    let table = table::read_wide_table(&path)?;
    let schema = HeaderSchema::parse(&table.headers).map_err(|problem| PipelineError::structure(Stage::Normalize, &path, problem))?;
    if schema.is_empty()
    {
        return Err(PipelineError::structure(Stage::Normalize, &path, StructureProblem::NoWordColumns));
    }
    for pair in &schema.pairs
    {
        tracing::debug!(label = %pair.label, word_column = pair.word_column, frequency_column = pair.frequency_column, "wordform/frequency block");
    }

    let pattern = config.wordform_regex()?;
    let (forms, stats) = normalizer::normalize(&table, &schema, &pattern);
    tracing::debug!(stacked = stats.stacked, kept = stats.kept(), missing = stats.missing, non_positive = stats.non_positive, non_alphabetic = stats.non_alphabetic, "cleaned corpus rows");
    tracing::info!("Loaded {} corpus wordform-frequency pairs", forms.len());
    Ok(forms)
}

/// Normalize + aggregate: writes the lemma frequency band table.
pub fn build_bands(config : &PipelineConfig) -> Result<BandTable>
{
    let forms = load_corpus(config)?;

    let lexicon_path = config.workspace(&config.lexicon);
    tracing::info!("Loading lexicon from {}", lexicon_path.display());
    log_input(&lexicon_path, Stage::Aggregate)?;
    let lexicon = lexicon::load_lexicon(&lexicon_path)?;
    if lexicon.is_empty()
    {
        return Err(PipelineError::structure(Stage::Aggregate, &lexicon_path, StructureProblem::EmptyLexicon));
    }
    tracing::info!("Loaded {} lexicon entries", lexicon.len());

    let pattern = config.wordform_regex()?;
    let table = aggregator::build_band_table(&forms, &lexicon, &pattern, config.band_size);
    if table.lemmas.is_empty()
    {
        return Err(PipelineError::structure(Stage::Aggregate, &lexicon_path, StructureProblem::NoLemmas));
    }
    tracing::info!("Total bands: {}", table.max_band);

    let output = config.workspace(&config.bands_output);
    aggregator::write_band_table(&output, &table)?;
    tracing::info!("Saved: {}", output.display());
    Ok(table)
}

/// Merge with paradigm sizes, summarize per band, run both tests and write the outputs.
pub fn validate(config : &PipelineConfig) -> Result<(Vec<BandSummary>, ValidationResult)>
{
    let bands_path = config.workspace(&config.bands_output);
    log_input(&bands_path, Stage::Validate)?;
    let bands = aggregator::read_band_table(&bands_path, Stage::Validate)?;
    tracing::info!("Loaded {} frequency-banded lemmas", bands.lemmas.len());

    let paradigms_path = config.workspace(&config.paradigms);
    log_input(&paradigms_path, Stage::Validate)?;
    let paradigms = lexicon::load_paradigm_sizes(&paradigms_path)?;
    if paradigms.is_empty()
    {
        return Err(PipelineError::structure(Stage::Validate, &paradigms_path, StructureProblem::EmptyParadigms));
    }
    tracing::info!("Loaded {} paradigm-size entries", paradigms.len());

    let (merged, dropped) = validator::merge(&bands.lemmas, &paradigms);
    tracing::debug!(dropped, "dropped merged rows with non-numeric paradigm size");
    if merged.is_empty()
    {
        return Err(PipelineError::structure(Stage::Validate, &paradigms_path, StructureProblem::NoMergedRows));
    }
    tracing::info!("Merged dataset contains {} lemmas", merged.len());

    let groups = validator::group_by_band(&merged);
    let summary = validator::summarize(&groups);
    for row in &summary
    {
        tracing::info!(band_id = row.band_id, count = row.count, mean = row.mean, median = row.median, "paradigm size by band");
    }
    // the per-band summary is kept even when a test then rejects the dataset
    let summary_path = config.workspace(&config.summary_output);
    validator::write_summary(&summary_path, &summary)?;

    let result = validator::run_tests(&merged, &groups)?;
    tracing::info!(rho = result.spearman_rho, p = result.spearman_p, "{}", validator::SPEARMAN_LABEL);
    tracing::info!(h = result.kruskal_h, p = result.kruskal_p, "{}", validator::KRUSKAL_LABEL);

    let report_path = config.workspace(&config.report_output);
    validator::write_report(&report_path, &result)?;
    tracing::info!("Saved: {} and {}", summary_path.display(), report_path.display());
    Ok((summary, result))
}

pub fn sanity_check(config : &PipelineConfig) -> Result<String>
{
    let path = config.workspace(&config.bands_output);
    let table = aggregator::read_band_table(&path, Stage::SanityCheck)?;
    Ok(sanity::sanity_report(&table, &config.sanity_bands, config.sanity_rows))
}

pub fn run_all(config : &PipelineConfig) -> Result<()>
{
    build_bands(config)?;
    validate(config)?;
    Ok(())
}
