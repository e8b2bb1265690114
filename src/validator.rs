use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::aggregator::LemmaFrequency;
use crate::error::{PipelineError, Result, Stage};
use crate::lexicon::ParadigmSizeEntry;
use crate::stats::{self, StatsError, TestResult};

pub const SPEARMAN_LABEL : &str = "Spearman rank correlation";
pub const KRUSKAL_LABEL : &str = "Kruskal-Wallis test";

/// Band of a merged lemma and its numeric paradigm size.
#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct MergedRow {
    pub band_id : u32,
    pub paradigm_size : f64,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct BandSummary {
    pub band_id : u32,
    pub count : usize,
    pub mean : f64,
    pub median : f64,
}

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct ValidationResult {
    pub spearman_rho : f64,
    pub spearman_p : f64,
    pub kruskal_h : f64,
    pub kruskal_p : f64,
}

fn coerce_size(raw : &str) -> Option<f64>
{
    match raw.trim().parse::<f64>()
    {
        Ok(x) if x.is_finite() => Some(x),
        _ => None,
    }
}

/// Inner join on lemma in band-table order, one row per matching paradigm
/// entry. Entries whose size is not numeric are dropped; returns the dropped count too.
pub fn merge(bands : &[LemmaFrequency], paradigms : &[ParadigmSizeEntry]) -> (Vec<MergedRow>, usize)
{
    let mut sizes_by_lemma : HashMap<&str, Vec<&str>> = HashMap::new();
    for entry in paradigms
    {
        sizes_by_lemma.entry(entry.lemma.as_str()).or_default().push(entry.paradigm_size.as_str());
    }

    let mut merged = Vec::new();
    let mut dropped = 0;
    for band in bands
    {
        for &raw in sizes_by_lemma.get(band.lemma.as_str()).into_iter().flatten()
        {
            match coerce_size(raw)
            {
                Some(paradigm_size) => merged.push(MergedRow { band_id : band.band_id, paradigm_size }),
                None => dropped += 1,
            }
        }
    }
    (merged, dropped)
}

/// Paradigm sizes grouped by band, bands ascending.
pub fn group_by_band(rows : &[MergedRow]) -> BTreeMap<u32, Vec<f64>>
{
    let mut groups : BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for row in rows
    {
        groups.entry(row.band_id).or_default().push(row.paradigm_size);
    }
    groups
}

pub fn summarize(groups : &BTreeMap<u32, Vec<f64>>) -> Vec<BandSummary>
{
    groups.iter()
        .map(|(band_id, sizes)| BandSummary { band_id : *band_id, count : sizes.len(), mean : stats::mean(sizes), median : stats::median(sizes) })
        .collect()
}

fn statistics_error(test : &'static str) -> impl Fn(StatsError) -> PipelineError
{
    move |source| PipelineError::Statistics { stage : Stage::Validate, test, source }
}

/// Runs both tests over the whole merged dataset. Kruskal-Wallis goes first so a
/// single-band dataset is reported by the test that needs several bands.
pub fn run_tests(rows : &[MergedRow], groups : &BTreeMap<u32, Vec<f64>>) -> Result<ValidationResult>
{
    let group_list = groups.values().cloned().collect::<Vec<_>>();
    let kruskal : TestResult = stats::kruskal_wallis(&group_list).map_err(statistics_error(KRUSKAL_LABEL))?;

    let bands = rows.iter().map(|x| x.band_id as f64).collect::<Vec<_>>();
    let sizes = rows.iter().map(|x| x.paradigm_size).collect::<Vec<_>>();
    let spearman : TestResult = stats::spearman(&bands, &sizes).map_err(statistics_error(SPEARMAN_LABEL))?;

    Ok(ValidationResult {
        spearman_rho : spearman.statistic,
        spearman_p : spearman.p_value,
        kruskal_h : kruskal.statistic,
        kruskal_p : kruskal.p_value,
    })
}

/// Scientific notation with six digits after the point and a signed,
/// at least two-digit exponent (`1.234568e-05`).
pub fn format_scientific(x : f64) -> String
{
    if !x.is_finite()
    {
        return x.to_string();
    }
    let text = format!("{:.6e}", x);
    match text.split_once('e')
    {
        Some((mantissa, exponent)) =>
        {
            let (sign, digits) = match exponent.strip_prefix('-')
            {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

pub fn format_report(result : &ValidationResult) -> String
{
    let mut out = String::new();
    out += &format!("{}\n", SPEARMAN_LABEL);
    out += &format!("rho\t{:.6}\n", result.spearman_rho);
    out += &format!("p\t{}\n\n", format_scientific(result.spearman_p));
    out += &format!("{}\n", KRUSKAL_LABEL);
    out += &format!("H\t{:.6}\n", result.kruskal_h);
    out += &format!("p\t{}\n", format_scientific(result.kruskal_p));
    out
}

pub fn write_summary(path : &Path, summary : &[BandSummary]) -> Result<()>
{
    let fail = |err : csv::Error| PipelineError::csv(Stage::Validate, path, err);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(path)
        .map_err(fail)?;
    writer.write_record(["band_id", "count", "mean", "median"]).map_err(fail)?;
    for row in summary
    {
        writer.write_record([row.band_id.to_string(), row.count.to_string(), row.mean.to_string(), row.median.to_string()]).map_err(fail)?;
    }
    writer.flush().map_err(|err| PipelineError::io(Stage::Validate, path, err))
}

pub fn write_report(path : &Path, result : &ValidationResult) -> Result<()>
{
    fs::write(path, format_report(result)).map_err(|err| PipelineError::io(Stage::Validate, path, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(lemma : &str, rank : u64, band_id : u32) -> LemmaFrequency
    {
        LemmaFrequency { lemma : lemma.to_string(), frequency : 1000.0 - rank as f64, rank, band_id }
    }

    fn size(lemma : &str, paradigm_size : &str) -> ParadigmSizeEntry
    {
        ParadigmSizeEntry { lemma : lemma.to_string(), paradigm_size : paradigm_size.to_string() }
    }

    #[test]
    fn non_numeric_sizes_are_excluded()
    {
        let bands = vec!(band("ser", 1, 1), band("casa", 2, 1), band("perro", 3, 2), band("gato", 4, 2));
        let paradigms = vec!(size("ser", "50"), size("casa", ""), size("perro", "4"), size("gato", "abc"), size("nube", "2"));
        let (merged, dropped) = merge(&bands, &paradigms);
        assert_eq!(dropped, 2);
        assert_eq!(merged, vec!(
            MergedRow { band_id : 1, paradigm_size : 50.0 },
            MergedRow { band_id : 2, paradigm_size : 4.0 },
        ));

        let summary = summarize(&group_by_band(&merged));
        assert_eq!(summary, vec!(
            BandSummary { band_id : 1, count : 1, mean : 50.0, median : 50.0 },
            BandSummary { band_id : 2, count : 1, mean : 4.0, median : 4.0 },
        ));
    }

    #[test]
    fn duplicate_paradigm_rows_fan_out()
    {
        let bands = vec!(band("ser", 1, 1));
        let (merged, _) = merge(&bands, &[size("ser", "50"), size("ser", "48")]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn summary_is_sorted_by_band()
    {
        let rows = vec!(
            MergedRow { band_id : 3, paradigm_size : 2.0 },
            MergedRow { band_id : 1, paradigm_size : 10.0 },
            MergedRow { band_id : 1, paradigm_size : 20.0 },
            MergedRow { band_id : 3, paradigm_size : 4.0 },
            MergedRow { band_id : 3, paradigm_size : 9.0 },
        );
        let summary = summarize(&group_by_band(&rows));
        assert_eq!(summary.iter().map(|x| x.band_id).collect::<Vec<_>>(), vec!(1, 3));
        assert_eq!(summary[0].median, 15.0);
        assert_eq!(summary[1].count, 3);
        assert_eq!(summary[1].mean, 5.0);
        assert_eq!(summary[1].median, 4.0);
    }

    #[test]
    fn single_band_is_a_degenerate_kruskal_input()
    {
        let rows = vec!(
            MergedRow { band_id : 1, paradigm_size : 10.0 },
            MergedRow { band_id : 1, paradigm_size : 3.0 },
            MergedRow { band_id : 1, paradigm_size : 7.0 },
        );
        let err = run_tests(&rows, &group_by_band(&rows)).unwrap_err();
        match &err
        {
            PipelineError::Statistics { stage, test, source } =>
            {
                assert_eq!(*stage, Stage::Validate);
                assert_eq!(*test, KRUSKAL_LABEL);
                assert_eq!(*source, StatsError::TooFewGroups { groups : 1 });
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("at least two non-empty groups"));
    }

    #[test]
    fn two_observations_are_rejected_by_spearman()
    {
        let rows = vec!(
            MergedRow { band_id : 1, paradigm_size : 50.0 },
            MergedRow { band_id : 2, paradigm_size : 4.0 },
        );
        let groups = group_by_band(&rows);
        // two singleton bands are a valid Kruskal-Wallis input
        assert!(stats::kruskal_wallis(&groups.values().cloned().collect::<Vec<_>>()).is_ok());
        match run_tests(&rows, &groups).unwrap_err()
        {
            PipelineError::Statistics { stage, test, source } =>
            {
                assert_eq!(stage, Stage::Validate);
                assert_eq!(test, SPEARMAN_LABEL);
                assert_eq!(source, StatsError::TooFewObservations { n : 2, needed : 3 });
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn tests_run_over_the_full_dataset()
    {
        let rows = [(1, 9.0), (1, 8.0), (1, 7.0), (2, 5.0), (2, 6.0), (3, 1.0), (3, 2.0)]
            .iter()
            .map(|(band_id, size)| MergedRow { band_id : *band_id, paradigm_size : *size })
            .collect::<Vec<_>>();
        let result = run_tests(&rows, &group_by_band(&rows)).unwrap();
        assert!(result.spearman_rho < -0.9);
        assert!(result.spearman_p < 0.01);
        // ranks 7,6,5 | 3,4 | 1,2 give H = 12 / 56 * 137 - 24
        assert!((result.kruskal_h - (12.0 / 56.0 * 137.0 - 24.0)).abs() < 1e-9);
        assert!(result.kruskal_p < 0.1);
    }

    #[test]
    fn scientific_format_follows_printf_convention()
    {
        assert_eq!(format_scientific(1.2345678e-5), "1.234568e-05");
        assert_eq!(format_scientific(0.5), "5.000000e-01");
        assert_eq!(format_scientific(0.0), "0.000000e+00");
        assert_eq!(format_scientific(1.5e-120), "1.500000e-120");
        assert_eq!(format_scientific(12345.0), "1.234500e+04");
    }

    #[test]
    fn report_layout()
    {
        let result = ValidationResult { spearman_rho : 0.25, spearman_p : 1.0e-10, kruskal_h : 123.4567891, kruskal_p : 0.031 };
        assert_eq!(format_report(&result),
            "Spearman rank correlation\nrho\t0.250000\np\t1.000000e-10\n\nKruskal-Wallis test\nH\t123.456789\np\t3.100000e-02\n");
    }

    #[test]
    fn summary_file_layout()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.tsv");
        write_summary(&path, &[BandSummary { band_id : 1, count : 2, mean : 2.5, median : 2.5 }]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "band_id\tcount\tmean\tmedian\n1\t2\t2.5\t2.5\n");
    }
}
