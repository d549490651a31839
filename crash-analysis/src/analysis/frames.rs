//! DataFrame building blocks shared by the analyses.

use crate::prelude::*;
use crate::schema::CRASH_ID;
use arrow::array::AsArray;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::logical_expr::{ident, lit, Expr, JoinType, SortExpr};
use std::collections::HashSet;

/// Name of the row-count column produced by [`count_rows`].
pub const COUNT: &str = "count";

/// `COUNT(*)` aliased to [`COUNT`].
pub fn count_rows() -> Expr {
    count(lit(1)).alias(COUNT)
}

/// Substring match on a text column. Nulls never match.
pub fn contains(column: &str, needle: &str) -> Expr {
    ident(column).like(lit(format!("%{needle}%")))
}

/// True when the column equals none of `values`. Nulls never match.
pub fn not_in(column: &str, values: &[&str]) -> Expr {
    ident(column).in_list(values.iter().map(|value| lit(*value)).collect(), true)
}

/// True when the column equals one of `values`; an empty list matches nothing.
pub fn is_in(column: &str, values: &[String]) -> Expr {
    if values.is_empty() {
        return lit(false);
    }
    ident(column).in_list(values.iter().map(|value| lit(value.as_str())).collect(), false)
}

/// Most frequent first; equal counts fall back to `key` ascending.
pub fn by_count_desc(key: &str) -> Vec<SortExpr> {
    vec![ident(COUNT).sort(false, false), ident(key).sort(true, false)]
}

/// Inner join on CRASH_ID that keeps a single key column.
///
/// Columns of `right` whose names already exist in `left` are suffixed with
/// `_<right_label>` so the joined table has unique column names.
pub fn join_on_crash_id(left: DataFrame, right: DataFrame, right_label: &str) -> Result<DataFrame> {
    let left_names: HashSet<&str> = left
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().as_str())
        .collect();

    let right_key = format!("{CRASH_ID}_{right_label}");
    let projection: Vec<Expr> = right
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            if left_names.contains(name.as_str()) {
                ident(name).alias(format!("{name}_{right_label}"))
            } else {
                ident(name)
            }
        })
        .collect();
    let right = right.select(projection)?;

    let joined = left.join_on(
        right,
        JoinType::Inner,
        [ident(CRASH_ID).eq(ident(right_key.as_str()))],
    )?;

    // Column names are matched exactly; string-based column helpers would
    // fold the upper-case names to lower case.
    let kept: Vec<Expr> = joined
        .schema()
        .fields()
        .iter()
        .filter(|field| *field.name() != right_key)
        .map(|field| ident(field.name()))
        .collect();
    Ok(joined.select(kept)?)
}

/// Keeps only the named columns, matched exactly.
pub fn select_exact(frame: DataFrame, columns: &[&str]) -> Result<DataFrame> {
    Ok(frame.select(columns.iter().map(|name| ident(*name)).collect::<Vec<_>>())?)
}

/// Reads one column of a collected result as optional strings.
pub fn string_values(batches: &[RecordBatch], column: &str) -> Result<Vec<Option<String>>> {
    let mut values = Vec::new();
    for batch in batches {
        let array = batch.column_by_name(column).ok_or_else(|| {
            CrashError::Internal(format!("Result has no column '{column}'"))
        })?;
        let text = arrow::compute::cast(array, &DataType::Utf8)?;
        values.extend(
            text.as_string::<i32>()
                .iter()
                .map(|value| value.map(str::to_string)),
        );
    }
    Ok(values)
}

/// The `n` most frequent values of `column`.
///
/// A null group occupies one of the `n` places but is left out of the
/// returned list, so the list can be shorter than `n`.
pub async fn top_values(frame: DataFrame, column: &str, n: usize) -> Result<Vec<String>> {
    let rows = frame
        .aggregate(vec![ident(column)], vec![count_rows()])?
        .sort(by_count_desc(column))?
        .limit(0, Some(n))?
        .collect()
        .await?;
    Ok(string_values(&rows, column)?.into_iter().flatten().collect())
}
