use std::collections::BTreeSet;

/// Distinct non-null values, sorted ascending and joined with ", ".
/// Input order and repetition never affect the result.
pub fn aggregate_unique<I, S>(values: I) -> String
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let set: BTreeSet<String> = values
        .into_iter()
        .flatten()
        .map(|v| v.as_ref().to_string())
        .collect();
    set.into_iter().collect::<Vec<_>>().join(", ")
}

/// `"min-max"` over the non-null years, `None` when there are none.
/// A single year still renders as `"2020-2020"`.
pub fn year_range<I>(years: I) -> Option<String>
where
    I: IntoIterator<Item = Option<i32>>,
{
    let mut bounds: Option<(i32, i32)> = None;
    for year in years.into_iter().flatten() {
        bounds = Some(match bounds {
            Some((lo, hi)) => (lo.min(year), hi.max(year)),
            None => (year, year),
        });
    }
    bounds.map(|(lo, hi)| format!("{lo}-{hi}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_is_sorted_deduped_and_skips_nulls() {
        let values = vec![Some("mkv"), None, Some("avi"), Some("mkv"), Some("mp4")];
        assert_eq!(aggregate_unique(values), "avi, mkv, mp4");
    }

    #[test]
    fn unique_ignores_order_and_repetition() {
        let a = vec![Some("HEVC"), Some("H264"), None];
        let b = vec![Some("H264"), None, Some("HEVC"), Some("H264"), Some("HEVC")];
        assert_eq!(aggregate_unique(a), aggregate_unique(b));
    }

    #[test]
    fn unique_of_nothing_is_empty_string() {
        assert_eq!(aggregate_unique(Vec::<Option<String>>::new()), "");
        assert_eq!(aggregate_unique(vec![None::<&str>, None]), "");
    }

    #[test]
    fn year_ranges() {
        assert_eq!(year_range(Vec::new()), None);
        assert_eq!(year_range(vec![None, None]), None);
        assert_eq!(year_range(vec![Some(2020)]).as_deref(), Some("2020-2020"));
        assert_eq!(
            year_range(vec![Some(2019), Some(2021), None]).as_deref(),
            Some("2019-2021")
        );
        assert_eq!(
            year_range(vec![Some(2021), Some(1999), Some(2005)]).as_deref(),
            Some("1999-2021")
        );
    }
}
