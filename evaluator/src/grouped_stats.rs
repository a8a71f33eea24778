use polars::prelude::*;
use std::fmt;

use crate::models::Metric;

/// One evaluation group: a metric crossed with a simulated tree size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub metric: Metric,
    pub tree_size: i64,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / n = {}", self.metric, self.tree_size)
    }
}

/// Why a group produced no statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyGroup,
    ConstantOutcome,
    ConstantPredictor,
    SingularFit,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::EmptyGroup => "no rows for this group",
            SkipReason::ConstantOutcome => "all outcome values are identical",
            SkipReason::ConstantPredictor => "predictor has no spread",
            SkipReason::SingularFit => "singular matrix in fit",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone)]
pub enum GroupOutcome<T> {
    Value(T),
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct GroupResult<T> {
    pub key: GroupKey,
    pub outcome: GroupOutcome<T>,
}

/// Distinct simulated tree sizes, ascending.
pub fn unique_tree_sizes(df: &DataFrame) -> PolarsResult<Vec<i64>> {
    let mut sizes: Vec<i64> = df
        .column("tree.size")?
        .i64()?
        .into_no_null_iter()
        .collect();
    sizes.sort_unstable();
    sizes.dedup();
    Ok(sizes)
}

/// Rows of `df` belonging to one metric-by-size group.
pub fn group_frame(df: &DataFrame, key: GroupKey) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .filter(
            col("metric")
                .eq(lit(key.metric.as_str()))
                .and(col("tree.size").eq(lit(key.tree_size))),
        )
        .collect()
}

/// Applies `stat` to every metric-by-size group of `df`, in metric order then
/// ascending size. Empty groups are recorded as skips without calling `stat`;
/// any error from `stat` aborts the sweep.
pub fn evaluate_groups<T, F>(df: &DataFrame, mut stat: F) -> PolarsResult<Vec<GroupResult<T>>>
where
    F: FnMut(GroupKey, &DataFrame) -> PolarsResult<GroupOutcome<T>>,
{
    let sizes = unique_tree_sizes(df)?;
    let mut results = Vec::with_capacity(Metric::ALL.len() * sizes.len());
    for metric in Metric::ALL {
        for &tree_size in &sizes {
            let key = GroupKey { metric, tree_size };
            let rows = group_frame(df, key)?;
            let outcome = if rows.height() == 0 {
                GroupOutcome::Skipped(SkipReason::EmptyGroup)
            } else {
                stat(key, &rows)?
            };
            results.push(GroupResult { key, outcome });
        }
    }
    Ok(results)
}
