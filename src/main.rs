use std::env;
use std::process::ExitCode;
use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod aggregator;
mod config;
mod error;
mod lexicon;
mod normalizer;
mod pipeline;
mod sanity;
mod stats;
mod table;
mod validator;

use config::PipelineConfig;

static INIT : Once = Once::new();

/// Reads `LEMMABANDS_LOG` (e.g. `LEMMABANDS_LOG=lemmabands=debug`), defaulting to `lemmabands=info`.
fn init_tracing()
{
    INIT.call_once(||
    {
        let filter = EnvFilter::try_from_env("LEMMABANDS_LOG")
            .unwrap_or_else(|_| EnvFilter::new("lemmabands=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

fn print_help()
{
    eprintln!("usage: ./lemmabands [mode] [workspace]");
    eprintln!("modes:");
    eprintln!("  build_bands");
    eprintln!("      reshapes the corpus table, lemmatizes it through the lexicon and writes the lemma frequency band table");
    eprintln!("  validate");
    eprintln!("      merges the band table with paradigm sizes and writes the per-band summary and test results");
    eprintln!("  sanity_check");
    eprintln!("      prints the top lemmas of selected bands and the bottom of the last band");
    eprintln!("  run_all");
    eprintln!("      build_bands followed by validate");
    eprintln!("workspace defaults to `workspace`; settings are read from <workspace>/config/pipeline.txt if present");
}

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
enum Mode {
    BuildBands,
    Validate,
    SanityCheck,
    RunAll,
}

impl Mode {
    fn parse(name : &str) -> Option<Mode>
    {
        match name
        {
            "build_bands" => Some(Mode::BuildBands),
            "validate" => Some(Mode::Validate),
            "sanity_check" => Some(Mode::SanityCheck),
            "run_all" => Some(Mode::RunAll),
            _ => None,
        }
    }
}

fn run(mode : Mode, config : &PipelineConfig) -> error::Result<()>
{
    match mode
    {
        Mode::BuildBands =>
        {
            pipeline::build_bands(config)?;
        }
        Mode::Validate =>
        {
            pipeline::validate(config)?;
        }
        Mode::SanityCheck =>
        {
            print!("{}", pipeline::sanity_check(config)?);
        }
        Mode::RunAll => pipeline::run_all(config)?,
    }
    Ok(())
}

fn main() -> ExitCode
{
    init_tracing();

    let args = env::args().collect::<Vec<_>>();
    let mode = match args.get(1).and_then(|x| Mode::parse(x))
    {
        Some(mode) => mode,
        None =>
        {
            print_help();
            return ExitCode::from(2);
        }
    };
    let workspace_folder = args.get(2).map(|x| x.as_str()).unwrap_or("workspace");

    let result = PipelineConfig::load(workspace_folder).and_then(|config| run(mode, &config));
    match result
    {
        Ok(()) =>
        {
            tracing::info!("DONE!");
            ExitCode::SUCCESS
        }
        Err(err) =>
        {
            tracing::error!(stage = %err.stage(), "{}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_by_name()
    {
        assert_eq!(Mode::parse("build_bands"), Some(Mode::BuildBands));
        assert_eq!(Mode::parse("validate"), Some(Mode::Validate));
        assert_eq!(Mode::parse("sanity_check"), Some(Mode::SanityCheck));
        assert_eq!(Mode::parse("run_all"), Some(Mode::RunAll));
        assert_eq!(Mode::parse("Validate"), None);
        assert_eq!(Mode::parse(""), None);
    }
}
