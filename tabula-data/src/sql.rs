//! Statement building.
//!
//! Every statement the stores execute is assembled here, as plain text with
//! dollar-numbered placeholders, paired with the [`SqlValue`] arguments in
//! placeholder order. No user-supplied value is ever concatenated into the
//! statement text; identifiers come from descriptors and configuration, and
//! values always travel through placeholders.
//!
//! List statements follow the stem
//! `SELECT <cols> FROM <source> WHERE 1=1<conditions><order><paging>`,
//! so condition fragments can be appended unconditionally with ` AND (…)`.

use tabula_core::Error;

use crate::condition::{Condition, ConditionValue, Operator};
use crate::descriptor::{FieldDescriptor, RecordDescriptor};
use crate::params::SelectParams;
use crate::value::{PkValue, SqlValue};

/// SQL words that must be double-quoted when used as identifiers.
/// Kept sorted for binary search.
pub const RESERVED_WORDS: [&str; 11] = [
    "case",
    "cast",
    "check",
    "column",
    "constraint",
    "default",
    "distinct",
    "offset",
    "references",
    "table",
    "user",
];

/// Live column list of a relation, in ordinal order. Read on every archive
/// and restore so the protocol stays correct under online DDL.
pub const TABLE_COLUMNS_STATEMENT: &str = "SELECT column_name FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position";

/// Catalog row estimate for a relation, bound as `schema.table`.
pub const RELTUPLES_STATEMENT: &str =
    "SELECT reltuples::bigint FROM pg_class WHERE oid = $1::regclass";

/// Double-quote a storage name when it collides with a reserved word.
pub fn quote_storage(name: &str) -> String {
    if RESERVED_WORDS.binary_search(&name).is_ok() {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}

/// Exact count of a whole relation.
pub fn count_table_statement(qualified: &str) -> String {
    format!("SELECT count(*) FROM {qualified}")
}

/// Plan the statement instead of running it; the row estimate is read from
/// the JSON plan.
pub fn explain_statement(statement: &str) -> String {
    format!("EXPLAIN (FORMAT JSON) {statement}")
}

/// Where a list query reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    /// A table or updatable view addressed as `schema.name`.
    Relation { schema: String, name: String },
    /// A table-valued function taking positional text arguments declared
    /// by name; the names double as mandatory query parameters.
    SetFunc {
        schema: String,
        name: String,
        arg_names: Vec<String>,
    },
}

impl TableSource {
    pub fn relation(schema: impl Into<String>, name: impl Into<String>) -> Self {
        TableSource::Relation {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn set_func(
        schema: impl Into<String>,
        name: impl Into<String>,
        arg_names: &[&str],
    ) -> Self {
        TableSource::SetFunc {
            schema: schema.into(),
            name: name.into(),
            arg_names: arg_names.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Query-parameter names a list request must supply. Empty for relations.
    pub fn set_arg_names(&self) -> &[String] {
        match self {
            TableSource::Relation { .. } => &[],
            TableSource::SetFunc { arg_names, .. } => arg_names,
        }
    }

    /// The `(schema, name)` pair of a writable relation. Function-backed
    /// sources cannot be written to or fetched by key.
    pub fn write_target(&self) -> Result<(&str, &str), Error> {
        match self {
            TableSource::Relation { schema, name } => Ok((schema, name)),
            TableSource::SetFunc { schema, name, .. } => Err(Error::config(format!(
                "{schema}.{name} is function-sourced and not writable"
            ))),
        }
    }
}

/// A ready-to-bind list statement plus its pre-paging form.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltSelect {
    /// Full statement, `LIMIT`/`OFFSET` included.
    pub statement: String,
    /// The same statement without the paging clause, for counting.
    pub unpaged_statement: String,
    /// Arguments in placeholder order; the final two page.
    pub args: Vec<SqlValue>,
    /// How many leading arguments the unpaged statement uses.
    pub unpaged_arg_count: usize,
    /// Whether any filter condition was emitted.
    pub has_conditions: bool,
}

impl BuiltSelect {
    /// Exact count of the filtered, unpaged row set.
    pub fn count_statement(&self) -> String {
        format!("SELECT count(*) FROM ({}) res", self.unpaged_statement)
    }

    /// Arguments for [`count_statement`](Self::count_statement) and for
    /// planning the unpaged statement.
    pub fn unpaged_args(&self) -> &[SqlValue] {
        &self.args[..self.unpaged_arg_count]
    }
}

/// Build the list statement for `params` against `source`.
pub fn build_select(
    source: &TableSource,
    descriptor: &RecordDescriptor,
    params: &SelectParams,
) -> Result<BuiltSelect, Error> {
    let projection = descriptor.projection(params.fields.as_deref())?;
    let columns = projection
        .iter()
        .map(|f| quote_storage(f.storage()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("SELECT {columns} FROM ");
    let mut args = Vec::new();
    let mut placeholder = 0usize;

    append_source(&mut sql, source, &params.set_args, &mut args, &mut placeholder)?;
    sql.push_str(" WHERE 1=1");
    for condition in &params.conditions {
        let field = descriptor
            .wire_field(&condition.field)
            .ok_or_else(|| Error::user(format!("invalid filter field: {}", condition.field)))?;
        append_condition(&mut sql, field, condition, &mut args, &mut placeholder)?;
    }
    append_order(&mut sql, descriptor, &params.sorts);

    let unpaged_statement = sql.clone();
    let unpaged_arg_count = args.len();

    // Zero means "all rows"; the driver still wants an integer limit.
    let limit = if params.limit == 0 {
        i64::from(i32::MAX)
    } else {
        params.limit
    };
    placeholder += 1;
    sql.push_str(&format!(" LIMIT ${placeholder}"));
    args.push(SqlValue::Int(limit));
    placeholder += 1;
    sql.push_str(&format!(" OFFSET ${placeholder}"));
    args.push(SqlValue::Int(params.offset));

    Ok(BuiltSelect {
        statement: sql,
        unpaged_statement,
        args,
        unpaged_arg_count,
        has_conditions: !params.conditions.is_empty(),
    })
}

/// Single-row fetch by primary key. The projection is the full wire-visible
/// field set.
pub fn build_select_one(
    source: &TableSource,
    descriptor: &RecordDescriptor,
    pk_column: &str,
    pk: PkValue,
) -> Result<(String, SqlValue), Error> {
    let (schema, name) = source.write_target()?;
    let columns = descriptor
        .projection(None)?
        .iter()
        .map(|f| quote_storage(f.storage()))
        .collect::<Vec<_>>()
        .join(", ");
    let statement = format!(
        "SELECT {columns} FROM {schema}.{name} WHERE {} = $1",
        quote_storage(pk_column)
    );
    Ok((statement, pk.to_sql()))
}

/// `INSERT … RETURNING <pk>` from pre-extracted `(field, value)` pairs.
pub fn build_insert(
    source: &TableSource,
    pk_column: &str,
    fields: Vec<(&FieldDescriptor, SqlValue)>,
) -> Result<(String, Vec<SqlValue>), Error> {
    let (schema, name) = source.write_target()?;
    if fields.is_empty() {
        return Err(Error::config("input record has no storage fields"));
    }
    let mut columns = String::new();
    let mut values = String::new();
    let mut args = Vec::with_capacity(fields.len());
    for (i, (field, value)) in fields.into_iter().enumerate() {
        if i > 0 {
            columns.push_str(", ");
            values.push_str(", ");
        }
        columns.push_str(&quote_storage(field.storage()));
        values.push_str(&format!("${}", i + 1));
        args.push(value);
    }
    let statement = format!(
        "INSERT INTO {schema}.{name} ({columns}) VALUES ({values}) RETURNING {}",
        quote_storage(pk_column)
    );
    Ok((statement, args))
}

/// Full-row update keyed on the primary key. The key column and any `omit`
/// storage names are dropped from the assignment list.
pub fn build_update(
    source: &TableSource,
    pk_column: &str,
    fields: Vec<(&FieldDescriptor, SqlValue)>,
    omit: &[String],
    pk: PkValue,
) -> Result<(String, Vec<SqlValue>), Error> {
    let (schema, name) = source.write_target()?;
    let mut assignments = String::new();
    let mut args = Vec::new();
    for (field, value) in fields {
        if field.storage() == pk_column || omit.iter().any(|o| o == field.storage()) {
            continue;
        }
        if !args.is_empty() {
            assignments.push_str(", ");
        }
        assignments.push_str(&format!(
            "{} = ${}",
            quote_storage(field.storage()),
            args.len() + 1
        ));
        args.push(value);
    }
    if args.is_empty() {
        return Err(Error::config("update has no assignments"));
    }
    let statement = format!(
        "UPDATE {schema}.{name} SET {assignments} WHERE {} = ${}",
        quote_storage(pk_column),
        args.len() + 1
    );
    args.push(pk.to_sql());
    Ok((statement, args))
}

/// Partial update from a `{storageName: value}` map. Keys are checked
/// against an explicit allow-list before the descriptor is consulted;
/// assignments follow the map's iteration order.
pub fn build_update_partial(
    source: &TableSource,
    descriptor: &RecordDescriptor,
    pk_column: &str,
    patch: &serde_json::Map<String, serde_json::Value>,
    allowed: &[String],
    pk: PkValue,
) -> Result<(String, Vec<SqlValue>), Error> {
    let (schema, name) = source.write_target()?;
    let mut assignments = String::new();
    let mut args = Vec::new();
    for (key, value) in patch {
        if !allowed.iter().any(|a| a == key) {
            return Err(Error::user(format!("invalid field: {key}")));
        }
        let field = descriptor
            .storage_field(key)
            .ok_or_else(|| Error::config(format!("unknown column: {key}")))?;
        let coerced = field
            .logical()
            .from_json(value)
            .map_err(|e| Error::user(format!("invalid value for field {key}: {e}")))?;
        if !args.is_empty() {
            assignments.push_str(", ");
        }
        assignments.push_str(&format!("{} = ${}", quote_storage(key), args.len() + 1));
        args.push(coerced);
    }
    if args.is_empty() {
        return Err(Error::user("no fields to update"));
    }
    let statement = format!(
        "UPDATE {schema}.{name} SET {assignments} WHERE {} = ${}",
        quote_storage(pk_column),
        args.len() + 1
    );
    args.push(pk.to_sql());
    Ok((statement, args))
}

/// Single-row delete keyed on the primary key.
pub fn build_delete(
    source: &TableSource,
    pk_column: &str,
    pk: PkValue,
) -> Result<(String, SqlValue), Error> {
    let (schema, name) = source.write_target()?;
    let statement = format!(
        "DELETE FROM {schema}.{name} WHERE {} = $1",
        quote_storage(pk_column)
    );
    Ok((statement, pk.to_sql()))
}

/// Copy a row into the `_archived` sibling, stamping `archived_at` and the
/// cascade flag. `columns` is the live column list of the source table; the
/// cascade flag is a trusted boolean and is inlined, the key still binds.
pub fn build_archive_copy(
    source: &TableSource,
    pk_column: &str,
    columns: &[String],
    cascade: bool,
) -> Result<String, Error> {
    let (schema, name) = source.write_target()?;
    let cols = joined_columns(schema, name, columns)?;
    Ok(format!(
        "INSERT INTO {schema}.{name}_archived ({cols}, archived_at, archived_by_cascade) \
         SELECT {cols}, now(), {cascade} FROM {schema}.{name} WHERE {} = $1",
        quote_storage(pk_column)
    ))
}

/// Copy a row back from the `_archived` sibling. The cascade predicate
/// restricts restores to rows archived the same way.
pub fn build_restore_copy(
    source: &TableSource,
    pk_column: &str,
    columns: &[String],
    cascade: bool,
) -> Result<String, Error> {
    let (schema, name) = source.write_target()?;
    let cols = joined_columns(schema, name, columns)?;
    Ok(format!(
        "INSERT INTO {schema}.{name} ({cols}) \
         SELECT {cols} FROM {schema}.{name}_archived \
         WHERE archived_by_cascade = {cascade} AND {} = $1",
        quote_storage(pk_column)
    ))
}

/// Drop the archived copy once a restore has re-inserted the row.
pub fn build_restore_delete(
    source: &TableSource,
    pk_column: &str,
    cascade: bool,
) -> Result<String, Error> {
    let (schema, name) = source.write_target()?;
    Ok(format!(
        "DELETE FROM {schema}.{name}_archived \
         WHERE archived_by_cascade = {cascade} AND {} = $1",
        quote_storage(pk_column)
    ))
}

fn joined_columns(schema: &str, name: &str, columns: &[String]) -> Result<String, Error> {
    if columns.is_empty() {
        return Err(Error::config(format!(
            "no columns found for {schema}.{name}"
        )));
    }
    Ok(columns
        .iter()
        .map(|c| quote_storage(c))
        .collect::<Vec<_>>()
        .join(", "))
}

fn append_source(
    sql: &mut String,
    source: &TableSource,
    set_args: &[String],
    args: &mut Vec<SqlValue>,
    placeholder: &mut usize,
) -> Result<(), Error> {
    match source {
        TableSource::Relation { schema, name } => {
            sql.push_str(schema);
            sql.push('.');
            sql.push_str(name);
        }
        TableSource::SetFunc {
            schema,
            name,
            arg_names,
        } => {
            if set_args.len() != arg_names.len() {
                return Err(Error::config(format!(
                    "{schema}.{name} takes {} args, got {}",
                    arg_names.len(),
                    set_args.len()
                )));
            }
            sql.push_str(schema);
            sql.push('.');
            sql.push_str(name);
            sql.push('(');
            for (i, value) in set_args.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                *placeholder += 1;
                sql.push_str(&format!("${placeholder}"));
                args.push(SqlValue::Text(value.clone()));
            }
            sql.push(')');
        }
    }
    Ok(())
}

fn append_condition(
    sql: &mut String,
    field: &FieldDescriptor,
    condition: &Condition,
    args: &mut Vec<SqlValue>,
    placeholder: &mut usize,
) -> Result<(), Error> {
    let column = quote_storage(field.storage());
    match condition.operator {
        Operator::Eq => append_comparison(sql, &column, "=", field, condition, args, placeholder),
        Operator::Neq => append_comparison(sql, &column, "!=", field, condition, args, placeholder),
        Operator::Lt => append_comparison(sql, &column, "<", field, condition, args, placeholder),
        Operator::Le => append_comparison(sql, &column, "<=", field, condition, args, placeholder),
        Operator::Gt => append_comparison(sql, &column, ">", field, condition, args, placeholder),
        Operator::Ge => append_comparison(sql, &column, ">=", field, condition, args, placeholder),
        Operator::In | Operator::NotIn => {
            let members = set_members(condition)?;
            let value = field
                .logical()
                .parse_set(members)
                .map_err(|_| invalid_value(field))?;
            *placeholder += 1;
            if condition.operator == Operator::In {
                sql.push_str(&format!(" AND ({column} = ANY(${placeholder}))"));
            } else {
                sql.push_str(&format!(" AND NOT ({column} = ANY(${placeholder}))"));
            }
            args.push(value);
            Ok(())
        }
        Operator::StartsWith => {
            let raw = scalar_member(condition)?;
            *placeholder += 1;
            sql.push_str(&format!(" AND ({column}::text ILIKE ${placeholder} || '%')"));
            args.push(SqlValue::Text(raw.to_string()));
            Ok(())
        }
        Operator::EndsWith => {
            let raw = scalar_member(condition)?;
            *placeholder += 1;
            sql.push_str(&format!(" AND ({column}::text ILIKE '%' || ${placeholder})"));
            args.push(SqlValue::Text(raw.to_string()));
            Ok(())
        }
        Operator::Contains => {
            let raw = scalar_member(condition)?;
            *placeholder += 1;
            sql.push_str(&format!(
                " AND ({column}::text ILIKE '%' || ${placeholder} || '%')"
            ));
            args.push(SqlValue::Text(raw.to_string()));
            Ok(())
        }
        Operator::NotContains => {
            let raw = scalar_member(condition)?;
            *placeholder += 1;
            sql.push_str(&format!(
                " AND ({column}::text NOT ILIKE '%' || ${placeholder} || '%')"
            ));
            args.push(SqlValue::Text(raw.to_string()));
            Ok(())
        }
        Operator::ContainsAny => {
            let members = set_members(condition)?;
            if members.is_empty() {
                return Err(invalid_value(field));
            }
            sql.push_str(" AND (");
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" OR ");
                }
                *placeholder += 1;
                sql.push_str(&format!("{column}::text ILIKE '%'||${placeholder}||'%'"));
                args.push(SqlValue::Text(member.clone()));
            }
            sql.push(')');
            Ok(())
        }
        Operator::Empty | Operator::NotEmpty => {
            let op = if condition.operator == Operator::Empty {
                "="
            } else {
                ">"
            };
            *placeholder += 1;
            sql.push_str(&format!(" AND (LENGTH({column}) {op} ${placeholder})"));
            args.push(SqlValue::Int(0));
            Ok(())
        }
        // A bound null compares as a value under IS [NOT] DISTINCT FROM, so
        // null predicates share the placeholder path with everything else.
        Operator::Null | Operator::NotNull => {
            let form = if condition.operator == Operator::Null {
                "IS NOT DISTINCT FROM"
            } else {
                "IS DISTINCT FROM"
            };
            *placeholder += 1;
            sql.push_str(&format!(" AND ({column} {form} ${placeholder})"));
            args.push(field.logical().null());
            Ok(())
        }
    }
}

fn append_comparison(
    sql: &mut String,
    column: &str,
    symbol: &str,
    field: &FieldDescriptor,
    condition: &Condition,
    args: &mut Vec<SqlValue>,
    placeholder: &mut usize,
) -> Result<(), Error> {
    let raw = scalar_member(condition)?;
    let value = field
        .logical()
        .parse_scalar(raw)
        .map_err(|_| invalid_value(field))?;
    *placeholder += 1;
    sql.push_str(&format!(" AND ({column} {symbol} ${placeholder})"));
    args.push(value);
    Ok(())
}

fn append_order(sql: &mut String, descriptor: &RecordDescriptor, sorts: &[String]) {
    let entries = if sorts.is_empty() {
        descriptor.default_order()
    } else {
        sorts
    };
    if entries.is_empty() {
        return;
    }
    sql.push_str(" ORDER BY ");
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        let (name, descending) = match entry.strip_suffix(" DESC") {
            Some(rest) => (rest, true),
            None => (entry.as_str(), false),
        };
        sql.push_str(&quote_storage(name));
        if descending {
            sql.push_str(" DESC");
        }
    }
}

fn scalar_member(condition: &Condition) -> Result<&str, Error> {
    match &condition.value {
        ConditionValue::Scalar(v) => Ok(v),
        _ => Err(Error::config(format!(
            "condition on {} expected a scalar value",
            condition.field
        ))),
    }
}

fn set_members(condition: &Condition) -> Result<&[String], Error> {
    match &condition.value {
        ConditionValue::Set(vs) => Ok(vs),
        _ => Err(Error::config(format!(
            "condition on {} expected a set value",
            condition.field
        ))),
    }
}

fn invalid_value(field: &FieldDescriptor) -> Error {
    Error::user(format!("invalid filter value for field: {}", field.wire()))
}
