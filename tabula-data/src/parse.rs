//! Query-string parsing.
//!
//! [`parse`] turns decoded query pairs into [`SelectParams`] against a
//! [`RecordDescriptor`]: reserved parameters (format, fields, paging, sort)
//! are read by the names configured in [`TabulaConfig`], declared set-func
//! argument names are collected positionally, and every remaining key is a
//! filter whose value is matched against an ordered pattern table.
//!
//! The pattern table is order-sensitive: `!a|b` is `NOT_IN {a, b}` because
//! the separator test runs before the plain `!` test. [`render`] is the
//! inverse, up to expressibility (a one-member `IN` renders as `EQ`).

use tabula_core::{Error, TabulaConfig};

use crate::condition::{Condition, ConditionValue, Operator};
use crate::descriptor::RecordDescriptor;
use crate::params::{OutputFormat, SelectParams};

/// Parse decoded query pairs into select parameters.
///
/// `set_arg_names` lists the mandatory positional arguments of a
/// function-backed source; pass an empty slice for plain relations.
/// Duplicate reserved keys keep their first occurrence; duplicate filter
/// keys each yield a condition.
pub fn parse(
    pairs: &[(String, String)],
    descriptor: &RecordDescriptor,
    options: &TabulaConfig,
    set_arg_names: &[String],
) -> Result<SelectParams, Error> {
    let mut params = SelectParams::default();

    if let Some(raw) = first(pairs, &options.format_param) {
        params.format = OutputFormat::parse(raw).ok_or_else(|| {
            Error::user(format!(
                "{} param value is invalid: {raw}",
                options.format_param
            ))
        })?;
    }
    params.include_total = params.format == OutputFormat::Json;

    if params.format == OutputFormat::Json {
        if let Some(raw) = first(pairs, &options.fields_param) {
            let mut fields = Vec::new();
            for name in raw.split(',') {
                if descriptor.wire_field(name).is_none() {
                    return Err(Error::user(format!(
                        "{} param value is invalid: {name}",
                        options.fields_param
                    )));
                }
                fields.push(name.to_string());
            }
            params.fields = Some(fields);
        }
    }

    if let Some(raw) = first(pairs, &options.sort_param) {
        for element in raw.split(',') {
            let (name, descending) = match element.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (element, false),
            };
            let field = descriptor.wire_field(name).ok_or_else(|| {
                Error::user(format!(
                    "{} param value is invalid: {element}",
                    options.sort_param
                ))
            })?;
            let mut sort = field.storage().to_string();
            if descending {
                sort.push_str(" DESC");
            }
            params.sorts.push(sort);
        }
    }

    if params.format == OutputFormat::Json {
        let page = match first(pairs, &options.page_param) {
            Some(raw) => at_least_one(raw, &options.page_param)?,
            None => 1,
        };
        let per_page = match first(pairs, &options.per_page_param) {
            Some(raw) => at_least_one(raw, &options.per_page_param)?.min(options.max_per_page),
            None => options.default_per_page,
        };
        params.limit = per_page;
        params.offset = (page - 1).saturating_mul(per_page);
    } else {
        params.limit = options.max_file_records;
    }

    for name in set_arg_names {
        let value = first(pairs, name)
            .ok_or_else(|| Error::user(format!("setFunc param name {name} is missing")))?;
        params.set_args.push(value.to_string());
    }

    let reserved = options.reserved_params();
    for (key, value) in pairs {
        if reserved.contains(&key.as_str()) || set_arg_names.iter().any(|n| n == key) {
            continue;
        }
        if descriptor.wire_field(key).is_none() {
            return Err(Error::user(format!("invalid filter field: {key}")));
        }
        let condition = match_filter(key, value, options.separator);
        condition.validate()?;
        params.conditions.push(condition);
    }

    Ok(params)
}

/// Render select parameters back into decoded query pairs.
///
/// The output re-parses to the same parameters as long as every condition
/// is expressible in the URL value language.
pub fn render(
    params: &SelectParams,
    descriptor: &RecordDescriptor,
    options: &TabulaConfig,
    set_arg_names: &[String],
) -> Result<Vec<(String, String)>, Error> {
    let mut pairs = Vec::new();

    if params.format != OutputFormat::Json {
        pairs.push((
            options.format_param.clone(),
            params.format.as_str().to_string(),
        ));
    }
    if let Some(fields) = &params.fields {
        pairs.push((options.fields_param.clone(), fields.join(",")));
    }
    if !params.sorts.is_empty() {
        let mut rendered = Vec::with_capacity(params.sorts.len());
        for sort in &params.sorts {
            let (storage, descending) = match sort.strip_suffix(" DESC") {
                Some(name) => (name, true),
                None => (sort.as_str(), false),
            };
            let field = descriptor
                .storage_field(storage)
                .ok_or_else(|| Error::config(format!("unknown sort column: {storage}")))?;
            if descending {
                rendered.push(format!("-{}", field.wire()));
            } else {
                rendered.push(field.wire().to_string());
            }
        }
        pairs.push((options.sort_param.clone(), rendered.join(",")));
    }
    if params.format == OutputFormat::Json && params.limit > 0 {
        let page = params.offset / params.limit + 1;
        pairs.push((options.page_param.clone(), page.to_string()));
        pairs.push((options.per_page_param.clone(), params.limit.to_string()));
    }

    if set_arg_names.len() != params.set_args.len() {
        return Err(Error::config(format!(
            "expected {} set-func args, got {}",
            set_arg_names.len(),
            params.set_args.len()
        )));
    }
    for (name, value) in set_arg_names.iter().zip(&params.set_args) {
        pairs.push((name.clone(), value.clone()));
    }

    for condition in &params.conditions {
        pairs.push((
            condition.field.clone(),
            render_value(condition, options.separator)?,
        ));
    }

    Ok(pairs)
}

fn first<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn at_least_one(raw: &str, name: &str) -> Result<i64, Error> {
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::user(format!("{name} param value is invalid: {raw}"))),
    }
}

fn split_members(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator).map(str::to_string).collect()
}

// First match wins; reordering these tests changes which queries callers
// observe.
fn match_filter(field: &str, raw: &str, separator: char) -> Condition {
    if let Some(v) = raw.strip_prefix(">eq") {
        return Condition::scalar(field, Operator::Ge, v);
    }
    if let Some(v) = raw.strip_prefix('>') {
        return Condition::scalar(field, Operator::Gt, v);
    }
    if let Some(v) = raw.strip_prefix("<eq") {
        return Condition::scalar(field, Operator::Le, v);
    }
    if let Some(v) = raw.strip_prefix('<') {
        return Condition::scalar(field, Operator::Lt, v);
    }
    if raw.len() >= 4 && raw.starts_with("~[") && raw.ends_with("]~") {
        let members = split_members(&raw[2..raw.len() - 2], separator);
        return Condition::set(field, Operator::ContainsAny, members);
    }
    if raw.len() >= 3 && raw.starts_with("!~") && raw.ends_with('~') {
        return Condition::scalar(field, Operator::NotContains, &raw[2..raw.len() - 1]);
    }
    if raw.len() >= 2 && raw.starts_with('~') && raw.ends_with('~') {
        return Condition::scalar(field, Operator::Contains, &raw[1..raw.len() - 1]);
    }
    if let Some(v) = raw.strip_suffix('~') {
        return Condition::scalar(field, Operator::StartsWith, v);
    }
    if let Some(v) = raw.strip_prefix('~') {
        return Condition::scalar(field, Operator::EndsWith, v);
    }
    match raw {
        "{empty}" => return Condition::flag(field, Operator::Empty),
        "{!empty}" => return Condition::flag(field, Operator::NotEmpty),
        "{null}" => return Condition::flag(field, Operator::Null),
        "{!null}" => return Condition::flag(field, Operator::NotNull),
        _ => {}
    }
    if let Some(v) = raw.strip_prefix('!') {
        if v.contains(separator) {
            return Condition::set(field, Operator::NotIn, split_members(v, separator));
        }
        return Condition::scalar(field, Operator::Neq, v);
    }
    if raw.contains(separator) {
        return Condition::set(field, Operator::In, split_members(raw, separator));
    }
    Condition::scalar(field, Operator::Eq, raw)
}

fn render_value(condition: &Condition, separator: char) -> Result<String, Error> {
    let sep = separator.to_string();
    match (condition.operator, &condition.value) {
        (Operator::Eq, ConditionValue::Scalar(v)) => Ok(v.clone()),
        (Operator::Neq, ConditionValue::Scalar(v)) => Ok(format!("!{v}")),
        (Operator::Gt, ConditionValue::Scalar(v)) => Ok(format!(">{v}")),
        (Operator::Ge, ConditionValue::Scalar(v)) => Ok(format!(">eq{v}")),
        (Operator::Lt, ConditionValue::Scalar(v)) => Ok(format!("<{v}")),
        (Operator::Le, ConditionValue::Scalar(v)) => Ok(format!("<eq{v}")),
        (Operator::StartsWith, ConditionValue::Scalar(v)) => Ok(format!("{v}~")),
        (Operator::EndsWith, ConditionValue::Scalar(v)) => Ok(format!("~{v}")),
        (Operator::Contains, ConditionValue::Scalar(v)) => Ok(format!("~{v}~")),
        (Operator::NotContains, ConditionValue::Scalar(v)) => Ok(format!("!~{v}~")),
        (Operator::In, ConditionValue::Set(vs)) => Ok(vs.join(&sep)),
        (Operator::NotIn, ConditionValue::Set(vs)) => Ok(format!("!{}", vs.join(&sep))),
        (Operator::ContainsAny, ConditionValue::Set(vs)) => Ok(format!("~[{}]~", vs.join(&sep))),
        (Operator::Empty, ConditionValue::None) => Ok("{empty}".to_string()),
        (Operator::NotEmpty, ConditionValue::None) => Ok("{!empty}".to_string()),
        (Operator::Null, ConditionValue::None) => Ok("{null}".to_string()),
        (Operator::NotNull, ConditionValue::None) => Ok("{!null}".to_string()),
        _ => Err(Error::config(format!(
            "condition on {} has mismatched operator and value",
            condition.field
        ))),
    }
}
