//! Raw query-string handling.

/// Parse a query string into key-value pairs, preserving order and
/// duplicates. Both are significant: filters apply in request order, and
/// repeated reserved parameters resolve to their first occurrence.
pub fn parse_query_string(query: Option<&str>) -> Vec<(String, String)> {
    match query {
        Some(q) => form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_order_and_duplicates() {
        let pairs = parse_query_string(Some("b=2&a=1&b=3"));
        assert_eq!(
            pairs,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn decodes_percent_escapes() {
        let pairs = parse_query_string(Some("c_text=%7Eabc%7E&x=a%7Cb"));
        assert_eq!(
            pairs,
            vec![
                ("c_text".to_string(), "~abc~".to_string()),
                ("x".to_string(), "a|b".to_string()),
            ]
        );
    }

    #[test]
    fn none_yields_no_pairs() {
        assert!(parse_query_string(None).is_empty());
    }
}
