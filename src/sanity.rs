use crate::aggregator::{BandTable, LemmaFrequency};

fn push_rows(out : &mut String, rows : &[&LemmaFrequency])
{
    for row in rows
    {
        out.push_str(&format!("{:>8}  {}\t{}\n", row.rank, row.lemma, row.frequency));
    }
}

/// Top `rows` lemmas of each requested band, then the bottom `rows` of the last band.
pub fn sanity_report(table : &BandTable, bands : &[u32], rows : usize) -> String
{
    let mut out = String::new();
    for (i, band) in bands.iter().enumerate()
    {
        if i > 0
        {
            out.push('\n');
        }
        out.push_str(&format!("Top {} lemmas in Band {}:\n", rows, band));
        let top = table.lemmas.iter().filter(|x| x.band_id == *band).take(rows).collect::<Vec<_>>();
        if top.is_empty()
        {
            out.push_str("  (no lemmas in this band)\n");
        }
        push_rows(&mut out, &top);
    }

    if !out.is_empty()
    {
        out.push('\n');
    }
    out.push_str(&format!("Bottom {} lemmas (last band, {}):\n", rows, table.max_band));
    let last = table.lemmas.iter().filter(|x| x.band_id == table.max_band).collect::<Vec<_>>();
    let start = last.len().saturating_sub(rows);
    push_rows(&mut out, &last[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::rank_and_band;

    fn table() -> BandTable
    {
        let totals = (0..7).map(|i| (format!("l{}", i), 100.0 - i as f64)).collect::<Vec<_>>();
        rank_and_band(totals, 3)
    }

    #[test]
    fn top_rows_per_band_and_tail_of_last_band()
    {
        let report = sanity_report(&table(), &[1, 2], 2);
        let expected = "Top 2 lemmas in Band 1:\n       1  l0\t100\n       2  l1\t99\n\n\
                        Top 2 lemmas in Band 2:\n       4  l3\t97\n       5  l4\t96\n\n\
                        Bottom 2 lemmas (last band, 3):\n       7  l6\t94\n";
        assert_eq!(report, expected);
    }

    #[test]
    fn absent_band_is_reported_empty()
    {
        let report = sanity_report(&table(), &[10], 5);
        assert!(report.starts_with("Top 5 lemmas in Band 10:\n  (no lemmas in this band)\n\nBottom 5 lemmas"));
    }
}
