//! Adaptive total counting.
//!
//! Exact counts are cheap on small tables and painful on large ones. The
//! strategy keys off the catalog row estimate of the base table: below the
//! threshold the rows are really counted, at or above it the caller gets
//! the catalog figure, or the planner's estimate when filters apply.

use sqlx::{PgPool, Row};

use tabula_core::Error;
use tabula_data::sql::{self, BuiltSelect};
use tabula_data::{SqlValue, TotalCount};

use crate::error::{classify_with_statement, SqlxErrorExt};
use crate::executor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// `count(*)` against the base table.
    ExactTable,
    /// `count(*)` around the unpaged statement.
    ExactFiltered,
    /// The catalog figure, already in hand.
    Catalog,
    /// The planner's row estimate for the unpaged statement.
    Planner,
}

fn pick(size: i64, threshold: i64, filtered: bool) -> Strategy {
    match (size < threshold, filtered) {
        (true, false) => Strategy::ExactTable,
        (true, true) => Strategy::ExactFiltered,
        (false, false) => Strategy::Catalog,
        (false, true) => Strategy::Planner,
    }
}

/// Total row count for a built list statement.
///
/// `base_table` is the schema-qualified relation whose statistics drive the
/// strategy; without one there is nothing to count against and the total
/// reports as an estimated zero.
pub(crate) async fn total(
    pool: &PgPool,
    base_table: Option<&str>,
    built: &BuiltSelect,
    threshold: i64,
) -> Result<TotalCount, Error> {
    let Some(base) = base_table else {
        return Ok(TotalCount::unknown());
    };
    let size = executor::fetch_scalar(
        pool,
        sql::RELTUPLES_STATEMENT,
        &[SqlValue::Text(base.to_string())],
    )
    .await?;

    match pick(size, threshold, built.has_conditions) {
        Strategy::ExactTable => {
            let value =
                executor::fetch_scalar(pool, &sql::count_table_statement(base), &[]).await?;
            Ok(TotalCount {
                value,
                is_estimated: false,
            })
        }
        Strategy::ExactFiltered => {
            let value =
                executor::fetch_scalar(pool, &built.count_statement(), built.unpaged_args())
                    .await?;
            Ok(TotalCount {
                value,
                is_estimated: false,
            })
        }
        Strategy::Catalog => Ok(TotalCount {
            value: size,
            is_estimated: true,
        }),
        Strategy::Planner => {
            let value = planned_rows(pool, built).await?;
            Ok(TotalCount {
                value,
                is_estimated: true,
            })
        }
    }
}

async fn planned_rows(pool: &PgPool, built: &BuiltSelect) -> Result<i64, Error> {
    let statement = sql::explain_statement(&built.unpaged_statement);
    let mut query = sqlx::query(&statement);
    for arg in built.unpaged_args() {
        query = executor::bind_value(query, arg);
    }
    let row = query
        .fetch_one(pool)
        .await
        .map_err(|e| classify_with_statement(e, &statement))?;
    // The plan column is json on current servers; older ones hand back text.
    let plan: serde_json::Value = match row.try_get::<serde_json::Value, _>(0) {
        Ok(plan) => plan,
        Err(_) => {
            let text = row.try_get::<String, _>(0).map_err(SqlxErrorExt::classify)?;
            serde_json::from_str(&text)
                .map_err(|e| Error::internal(format!("unreadable plan: {e}")))?
        }
    };
    plan_rows(&plan).ok_or_else(|| Error::internal("plan carries no row estimate"))
}

fn plan_rows(plan: &serde_json::Value) -> Option<i64> {
    let rows = plan.get(0)?.get("Plan")?.get("Plan Rows")?;
    rows.as_i64().or_else(|| rows.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_splits_exact_from_estimated() {
        assert_eq!(pick(9_999, 10_000, false), Strategy::ExactTable);
        assert_eq!(pick(9_999, 10_000, true), Strategy::ExactFiltered);
        assert_eq!(pick(10_000, 10_000, false), Strategy::Catalog);
        assert_eq!(pick(10_000, 10_000, true), Strategy::Planner);
    }

    #[test]
    fn unanalyzed_tables_count_exactly() {
        // reltuples reports -1 until the first vacuum or analyze.
        assert_eq!(pick(-1, 10_000, false), Strategy::ExactTable);
        assert_eq!(pick(-1, 10_000, true), Strategy::ExactFiltered);
    }

    #[test]
    fn plan_rows_reads_the_first_plan() {
        let plan = serde_json::json!([{
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "items",
                "Plan Rows": 40_123,
                "Plan Width": 36
            }
        }]);
        assert_eq!(plan_rows(&plan), Some(40_123));
    }

    #[test]
    fn plan_rows_accepts_fractional_estimates() {
        let plan = serde_json::json!([{"Plan": {"Plan Rows": 40123.0}}]);
        assert_eq!(plan_rows(&plan), Some(40_123));
    }

    #[test]
    fn malformed_plans_read_as_none() {
        assert_eq!(plan_rows(&serde_json::json!([])), None);
        assert_eq!(plan_rows(&serde_json::json!({"Plan": {}})), None);
        assert_eq!(plan_rows(&serde_json::json!([{"Plan": {}}])), None);
    }
}
