use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{PipelineError, Result, Stage};

pub const DEFAULT_BAND_SIZE : usize = 1000;
pub const DEFAULT_WORDFORM_PATTERN : &str = r"^[a-záéíóúüñ]+$";

/// Settings shared by every stage. Paths are relative to the workspace folder.
#[derive(Clone)]
#[derive(Debug)]
pub struct PipelineConfig {
    pub workspace_folder : PathBuf,

    pub corpus : String,
    pub lexicon : String,
    pub paradigms : String,

    pub bands_output : String,
    pub summary_output : String,
    pub report_output : String,

    pub band_size : usize,
    pub wordform_pattern : String,

    pub sanity_bands : Vec<u32>,
    pub sanity_rows : usize,
}

impl PipelineConfig {
    pub fn with_workspace(workspace_folder : impl Into<PathBuf>) -> PipelineConfig
    {
        PipelineConfig {
            workspace_folder : workspace_folder.into(),

            corpus : "SUBTLEX-ESP.xlsx".to_string(),
            lexicon : "ancora_lexicon.txt".to_string(),
            paradigms : "lemma_paradigm_sizes.txt".to_string(),

            bands_output : "spanish_lemma_frequency_bands.tsv".to_string(),
            summary_output : "morphological_complexity_by_band.tsv".to_string(),
            report_output : "statistical_validation_results.txt".to_string(),

            band_size : DEFAULT_BAND_SIZE,
            wordform_pattern : DEFAULT_WORDFORM_PATTERN.to_string(),

            sanity_bands : vec!(1, 5, 10),
            sanity_rows : 20,
        }
    }

    /// Defaults for `workspace_folder`, overridden by `config/pipeline.txt` when present.
    pub fn load(workspace_folder : impl Into<PathBuf>) -> Result<PipelineConfig>
    {
        let mut config = PipelineConfig::with_workspace(workspace_folder);
        let path = config.config_path();
        match fs::read_to_string(&path)
        {
            Ok(text) => config.apply(&path, &text)?,
            Err(err) if err.kind() == ErrorKind::NotFound =>
            {
                tracing::debug!(path = %path.display(), "no pipeline config; using defaults");
            }
            Err(err) => return Err(PipelineError::io(Stage::Config, path, err)),
        }
        Ok(config)
    }

    pub fn config_path(&self) -> PathBuf
    {
        self.workspace_folder.join("config").join("pipeline.txt")
    }

    /// Applies `key = value` lines on top of the current settings.
    pub fn apply(&mut self, path : &Path, text : &str) -> Result<()>
    {
        for (index, line) in text.lines().enumerate()
        {
            let line_number = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#')
            {
                continue;
            }
            let bad = |message : String| PipelineError::Config { path : path.to_path_buf(), line : line_number, message };

            let (key, value) = match line.split_once('=')
            {
                Some((key, value)) => (key.trim(), value.trim()),
                None => return Err(bad(format!("expected `key = value`, got {:?}", line))),
            };
            match key
            {
                "corpus" => self.corpus = value.to_string(),
                "lexicon" => self.lexicon = value.to_string(),
                "paradigms" => self.paradigms = value.to_string(),
                "bands_output" => self.bands_output = value.to_string(),
                "summary_output" => self.summary_output = value.to_string(),
                "report_output" => self.report_output = value.to_string(),
                "band_size" =>
                {
                    self.band_size = match value.parse::<usize>()
                    {
                        Ok(size) if size > 0 => size,
                        _ => return Err(bad(format!("band_size must be a positive integer, got {:?}", value))),
                    };
                }
                "wordform_pattern" => self.wordform_pattern = value.to_string(),
                "sanity_bands" =>
                {
                    let mut bands = Vec::new();
                    for field in value.split(',').map(str::trim).filter(|x| !x.is_empty())
                    {
                        match field.parse::<u32>()
                        {
                            Ok(band) if band > 0 => bands.push(band),
                            _ => return Err(bad(format!("sanity_bands entries must be positive integers, got {:?}", field))),
                        }
                    }
                    self.sanity_bands = bands;
                }
                "sanity_rows" =>
                {
                    self.sanity_rows = value.parse::<usize>().map_err(|_| bad(format!("sanity_rows must be an integer, got {:?}", value)))?;
                }
                _ => return Err(bad(format!("unknown key {:?}", key))),
            }
        }
        Ok(())
    }

    pub fn workspace(&self, sub : &str) -> PathBuf
    {
        self.workspace_folder.join(sub)
    }

    pub fn wordform_regex(&self) -> Result<Regex>
    {
        Ok(Regex::new(&self.wordform_pattern)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_layout()
    {
        let config = PipelineConfig::with_workspace("ws");
        assert_eq!(config.band_size, 1000);
        assert_eq!(config.workspace("ancora_lexicon.txt"), PathBuf::from("ws").join("ancora_lexicon.txt"));
        let pattern = config.wordform_regex().unwrap();
        assert!(pattern.is_match("niño"));
        assert!(pattern.is_match("pingüino"));
        assert!(!pattern.is_match("Niño"));
        assert!(!pattern.is_match("r2d2"));
        assert!(!pattern.is_match("a-b"));
    }

    #[test]
    fn overrides_and_comments()
    {
        let mut config = PipelineConfig::with_workspace("ws");
        let text = "# local run\n\nband_size = 500\ncorpus = corpus.tsv\nsanity_bands = 1, 2\nsanity_rows=5\n";
        config.apply(Path::new("pipeline.txt"), text).unwrap();
        assert_eq!(config.band_size, 500);
        assert_eq!(config.corpus, "corpus.tsv");
        assert_eq!(config.sanity_bands, vec!(1, 2));
        assert_eq!(config.sanity_rows, 5);
    }

    #[test]
    fn rejects_bad_lines_with_line_numbers()
    {
        let mut config = PipelineConfig::with_workspace("ws");
        let err = config.apply(Path::new("pipeline.txt"), "corpus = a.xlsx\nband_size = 0\n").unwrap_err();
        match err
        {
            PipelineError::Config { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {:?}", other),
        }

        let err = config.apply(Path::new("pipeline.txt"), "colour = blue\n").unwrap_err();
        assert!(err.to_string().contains("unknown key"));

        let err = config.apply(Path::new("pipeline.txt"), "just words\n").unwrap_err();
        assert_eq!(err.stage(), Stage::Config);
    }

    #[test]
    fn missing_config_file_means_defaults()
    {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.band_size, DEFAULT_BAND_SIZE);

        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/pipeline.txt"), "band_size = 2\n").unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.band_size, 2);
    }

    #[test]
    fn invalid_pattern_is_a_config_error()
    {
        let mut config = PipelineConfig::with_workspace("ws");
        config.wordform_pattern = "[a-".to_string();
        assert_eq!(config.wordform_regex().unwrap_err().stage(), Stage::Config);
    }
}
