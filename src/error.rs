use std::fmt;
use std::path::PathBuf;

use crate::stats::StatsError;

/// Pipeline stage a failure belongs to.
#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
pub enum Stage {
    Config,
    Normalize,
    Aggregate,
    Validate,
    SanityCheck,
}

impl fmt::Display for Stage {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self
        {
            Stage::Config => "config",
            Stage::Normalize => "normalize",
            Stage::Aggregate => "aggregate",
            Stage::Validate => "validate",
            Stage::SanityCheck => "sanity_check",
        };
        f.write_str(name)
    }
}

/// Structural preconditions on the input files.
#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub enum StructureProblem {
    EmptyTable,
    NoWordColumns,
    AdjacentWordColumns { column : usize, label : String },
    EmptyLexicon,
    EmptyParadigms,
    NoLemmas,
    NoMergedRows,
    MissingColumn(&'static str),
    BadCell { line : u64, column : &'static str, value : String },
}

impl fmt::Display for StructureProblem {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            StructureProblem::EmptyTable => write!(f, "table has no header row"),
            StructureProblem::NoWordColumns => write!(f, "no `Word` column with a frequency column to its right"),
            StructureProblem::AdjacentWordColumns { column, label } =>
                write!(f, "`Word` column {} ({:?}) is followed by another `Word` column instead of a frequency column", column, label),
            StructureProblem::EmptyLexicon => write!(f, "lexicon has no wordform/lemma entries"),
            StructureProblem::EmptyParadigms => write!(f, "paradigm size table has no entries"),
            StructureProblem::NoLemmas => write!(f, "no corpus wordform survived lemmatization"),
            StructureProblem::NoMergedRows => write!(f, "no banded lemma has a numeric paradigm size"),
            StructureProblem::MissingColumn(name) => write!(f, "missing column `{}`", name),
            StructureProblem::BadCell { line, column, value } =>
                write!(f, "line {}: cannot parse `{}` value {:?}", line, column, value),
        }
    }
}

#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum PipelineError {
    #[error("[{stage}] cannot access {}: {source}", .path.display())]
    Io { stage : Stage, path : PathBuf, #[source] source : std::io::Error },

    #[error("[{stage}] malformed delimited file {}: {source}", .path.display())]
    Csv { stage : Stage, path : PathBuf, #[source] source : csv::Error },

    #[error("[{stage}] cannot read spreadsheet {}: {message}", .path.display())]
    Spreadsheet { stage : Stage, path : PathBuf, message : String },

    #[error("[{stage}] {}: {problem}", .path.display())]
    Structure { stage : Stage, path : PathBuf, problem : StructureProblem },

    #[error("[{stage}] {test}: {source}")]
    Statistics { stage : Stage, test : &'static str, #[source] source : StatsError },

    #[error("[config] {} line {line}: {message}", .path.display())]
    Config { path : PathBuf, line : usize, message : String },

    #[error("[config] invalid wordform pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl PipelineError {
    pub fn stage(&self) -> Stage
    {
        match self
        {
            PipelineError::Io { stage, .. }
            | PipelineError::Csv { stage, .. }
            | PipelineError::Spreadsheet { stage, .. }
            | PipelineError::Structure { stage, .. }
            | PipelineError::Statistics { stage, .. } => *stage,
            PipelineError::Config { .. } | PipelineError::Pattern(_) => Stage::Config,
        }
    }
    pub(crate) fn structure(stage : Stage, path : impl Into<PathBuf>, problem : StructureProblem) -> PipelineError
    {
        PipelineError::Structure { stage, path : path.into(), problem }
    }
    pub(crate) fn io(stage : Stage, path : impl Into<PathBuf>, source : std::io::Error) -> PipelineError
    {
        PipelineError::Io { stage, path : path.into(), source }
    }
    pub(crate) fn csv(stage : Stage, path : impl Into<PathBuf>, source : csv::Error) -> PipelineError
    {
        PipelineError::Csv { stage, path : path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_stage_and_precondition()
    {
        let err = PipelineError::structure(Stage::Normalize, "corpus.xlsx", StructureProblem::NoWordColumns);
        let text = err.to_string();
        assert!(text.starts_with("[normalize] corpus.xlsx"));
        assert!(text.contains("no `Word` column"));
        assert_eq!(err.stage(), Stage::Normalize);

        let err = PipelineError::Statistics { stage : Stage::Validate, test : "Kruskal-Wallis test", source : StatsError::TooFewGroups { groups : 1 } };
        assert!(err.to_string().starts_with("[validate] Kruskal-Wallis test"));
    }
}
