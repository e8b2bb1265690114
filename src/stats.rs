use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};
use statrs::statistics::{Data, Median, OrderStatistics, RankTieBreaker, Statistics};

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(thiserror::Error)]
pub enum StatsError {
    #[error("needs at least two non-empty groups, got {groups}")]
    TooFewGroups { groups : usize },

    #[error("needs at least {needed} observations, got {n}")]
    TooFewObservations { n : usize, needed : usize },

    #[error("all values are tied ({0}); the statistic is undefined")]
    ConstantInput(&'static str),

    #[error("paired samples differ in length ({left} vs {right})")]
    LengthMismatch { left : usize, right : usize },

    #[error("distribution: {0}")]
    Distribution(String),
}

/// A test statistic and its p-value.
#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq)]
pub struct TestResult {
    pub statistic : f64,
    pub p_value : f64,
}

pub(crate) fn mean(x : &[f64]) -> f64
{
    x.iter().mean()
}

pub(crate) fn median(x : &[f64]) -> f64
{
    Data::new(x.to_vec()).median()
}

/// 1-based ranks, ties get the average of the ranks they span.
fn average_ranks(x : &[f64]) -> Vec<f64>
{
    Data::new(x.to_vec()).ranks(RankTieBreaker::Average)
}

/// Sum of t^3 - t over every group of tied values.
fn tie_term(x : &[f64]) -> f64
{
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut total = 0.0;
    let mut run = 1.0;
    for i in 1..=sorted.len()
    {
        if i < sorted.len() && sorted[i] == sorted[i - 1]
        {
            run += 1.0;
            continue;
        }
        total += run * run * run - run;
        run = 1.0;
    }
    total
}

fn is_constant(x : &[f64]) -> bool
{
    x.windows(2).all(|w| w[0] == w[1])
}

/// Spearman rank correlation with a two-sided p-value from Student's t on n - 2 degrees of freedom.
///
/// Fewer than three pairs leave no degree of freedom for the t distribution and are
/// rejected with `TooFewObservations`, as is a constant variable with `ConstantInput`.
pub fn spearman(x : &[f64], y : &[f64]) -> Result<TestResult, StatsError>
{
    if x.len() != y.len()
    {
        return Err(StatsError::LengthMismatch { left : x.len(), right : y.len() });
    }
    let n = x.len();
    if n < 3
    {
        return Err(StatsError::TooFewObservations { n, needed : 3 });
    }
    if is_constant(x) || is_constant(y)
    {
        return Err(StatsError::ConstantInput("one of the correlated variables"));
    }

    let rx = average_ranks(x);
    let ry = average_ranks(y);
    let covariance = rx.iter().covariance(ry.iter());
    let rho = (covariance / (rx.iter().std_dev() * ry.iter().std_dev())).clamp(-1.0, 1.0);

    let df = (n - 2) as f64;
    let remainder = 1.0 - rho * rho;
    let p_value = if remainder <= 0.0
    {
        0.0
    }
    else
    {
        let t = rho * (df / remainder).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).map_err(|err| StatsError::Distribution(err.to_string()))?;
        (2.0 * dist.sf(t.abs())).min(1.0)
    };
    Ok(TestResult { statistic : rho, p_value })
}

/// Kruskal-Wallis H with tie correction; p-value from chi-squared on k - 1 degrees of freedom.
pub fn kruskal_wallis(groups : &[Vec<f64>]) -> Result<TestResult, StatsError>
{
    let groups = groups.iter().filter(|g| !g.is_empty()).collect::<Vec<_>>();
    if groups.len() < 2
    {
        return Err(StatsError::TooFewGroups { groups : groups.len() });
    }

    let pooled = groups.iter().flat_map(|g| g.iter().copied()).collect::<Vec<_>>();
    let n = pooled.len() as f64;
    let ties = 1.0 - tie_term(&pooled) / (n * n * n - n);
    if ties <= 0.0
    {
        return Err(StatsError::ConstantInput("every observation has the same value"));
    }

    let ranks = average_ranks(&pooled);
    let mut offset = 0;
    let mut rank_term = 0.0;
    for group in &groups
    {
        let rank_sum = ranks[offset..offset + group.len()].iter().sum::<f64>();
        rank_term += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }
    let h = (12.0 / (n * (n + 1.0)) * rank_term - 3.0 * (n + 1.0)) / ties;

    let dist = ChiSquared::new((groups.len() - 1) as f64).map_err(|err| StatsError::Distribution(err.to_string()))?;
    Ok(TestResult { statistic : h, p_value : dist.sf(h) })
}
