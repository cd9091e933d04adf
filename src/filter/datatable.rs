//! DataTables server-side processing.
//!
//! The admin grids send `draw`, `start`, `length`, `search[value]`,
//! `order[i][column]`, `order[i][dir]` and `columns[i][data]` as query
//! parameters and expect `{draw, recordsTotal, recordsFiltered, data}`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::error::FilterError;
use super::types::{FilterData, SortDirection};

#[derive(Debug, Clone, PartialEq)]
pub struct DataTableRequest {
    pub draw: u64,
    pub start: i32,
    pub length: i32,
    pub search: Option<String>,
    pub order: Vec<(String, SortDirection)>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTablePage<T: Serialize> {
    pub draw: u64,
    pub records_total: i64,
    pub records_filtered: i64,
    pub data: Vec<T>,
}

impl DataTableRequest {
    pub fn from_params(
        params: &HashMap<String, String>,
        default_length: i32,
        max_length: i32,
    ) -> Result<Self, FilterError> {
        let draw = parse_or(params, "draw", 0u64)?;
        let start = parse_or(params, "start", 0i32)?;
        if start < 0 {
            return Err(FilterError::InvalidOffset("start must be non-negative".to_string()));
        }

        // length=-1 means "all rows", which is still bounded by the server maximum
        let length = match parse_or(params, "length", default_length)? {
            -1 => max_length,
            l if l < 0 => return Err(FilterError::InvalidLimit("length must be -1 or non-negative".to_string())),
            l => l.min(max_length),
        };

        let search = params
            .get("search[value]")
            .or_else(|| params.get("search"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut order = vec![];
        for i in 0.. {
            let Some(column) = params.get(&format!("order[{}][column]", i)) else { break };
            let name = match column.parse::<usize>() {
                Ok(idx) => params
                    .get(&format!("columns[{}][data]", idx))
                    .or_else(|| params.get(&format!("columns[{}][name]", idx)))
                    .cloned()
                    .ok_or_else(|| FilterError::InvalidParameter(format!("order column {} has no data key", idx)))?,
                Err(_) => column.clone(),
            };
            let dir = params
                .get(&format!("order[{}][dir]", i))
                .map(|d| SortDirection::parse(d))
                .unwrap_or(SortDirection::Asc);
            order.push((name, dir));
        }
        if order.is_empty() {
            if let Some(column) = params.get("order_by") {
                let dir = params.get("order_dir").map(|d| SortDirection::parse(d)).unwrap_or(SortDirection::Asc);
                order.push((column.clone(), dir));
            }
        }

        Ok(Self { draw, start, length, search, order })
    }

    /// WHERE tree for the global search box: case-insensitive substring
    /// match over the searchable columns
    pub fn search_clause(&self, searchable: &[&str]) -> Option<Value> {
        let term = self.search.as_ref()?;
        if searchable.is_empty() {
            return None;
        }
        let pattern = format!("%{}%", escape_like(term));
        let alternatives: Vec<Value> = searchable
            .iter()
            .map(|column| {
                let mut condition = Map::new();
                condition.insert(column.to_string(), json!({ "$ilike": pattern }));
                Value::Object(condition)
            })
            .collect();
        Some(json!({ "$or": alternatives }))
    }

    /// Filter for the current page. `base` holds resource-specific filters
    /// that also apply to `recordsTotal`.
    pub fn to_filter_data(&self, base: Option<Value>, searchable: &[&str], default_order: &str) -> FilterData {
        let where_clause = match (base, self.search_clause(searchable)) {
            (Some(base), Some(search)) => Some(json!({ "$and": [base, search] })),
            (base, search) => base.or(search),
        };

        // An array keeps the client's sort priority; the first mention of a column wins
        let order = if self.order.is_empty() {
            Value::String(default_order.to_string())
        } else {
            let mut seen = Vec::with_capacity(self.order.len());
            let mut terms = Vec::with_capacity(self.order.len());
            for (column, dir) in &self.order {
                if !seen.contains(&column) {
                    seen.push(column);
                    terms.push(Value::String(format!("{} {}", column, dir.to_sql())));
                }
            }
            Value::Array(terms)
        };

        FilterData {
            where_clause,
            order: Some(order),
            limit: Some(self.length),
            offset: Some(self.start),
        }
    }
}

fn parse_or<T: std::str::FromStr>(params: &HashMap<String, String>, key: &str, default: T) -> Result<T, FilterError> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|_| FilterError::InvalidParameter(format!("{} must be a number", key))),
        None => Ok(default),
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Extract simple equality filters (`?status=pending`) from the query string
pub fn equality_filters(params: &HashMap<String, String>, keys: &[(&str, FilterValueKind)]) -> Result<Option<Value>, FilterError> {
    let mut map = Map::new();
    for (key, kind) in keys {
        let Some(raw) = params.get(*key).map(|s| s.trim()).filter(|s| !s.is_empty()) else { continue };
        let value = match kind {
            FilterValueKind::Text => Value::String(raw.to_string()),
            FilterValueKind::Boolean => Value::Bool(
                raw.parse()
                    .map_err(|_| FilterError::InvalidParameter(format!("{} must be true or false", key)))?,
            ),
        };
        map.insert(key.to_string(), value);
    }
    Ok(if map.is_empty() { None } else { Some(Value::Object(map)) })
}

#[derive(Debug, Clone, Copy)]
pub enum FilterValueKind {
    Text,
    Boolean,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_datatables_query() {
        let req = DataTableRequest::from_params(
            &params(&[
                ("draw", "3"),
                ("start", "20"),
                ("length", "10"),
                ("search[value]", " widget "),
                ("columns[0][data]", "sku"),
                ("columns[1][data]", "name"),
                ("order[0][column]", "1"),
                ("order[0][dir]", "desc"),
            ]),
            25,
            100,
        )
        .unwrap();

        assert_eq!(req.draw, 3);
        assert_eq!(req.start, 20);
        assert_eq!(req.length, 10);
        assert_eq!(req.search.as_deref(), Some("widget"));
        assert_eq!(req.order, vec![("name".to_string(), SortDirection::Desc)]);
    }

    #[test]
    fn defaults_and_caps() {
        let req = DataTableRequest::from_params(&params(&[]), 25, 100).unwrap();
        assert_eq!((req.draw, req.start, req.length), (0, 0, 25));

        let all = DataTableRequest::from_params(&params(&[("length", "-1")]), 25, 100).unwrap();
        assert_eq!(all.length, 100);

        let big = DataTableRequest::from_params(&params(&[("length", "5000")]), 25, 100).unwrap();
        assert_eq!(big.length, 100);

        assert!(DataTableRequest::from_params(&params(&[("start", "-5")]), 25, 100).is_err());
        assert!(DataTableRequest::from_params(&params(&[("draw", "x")]), 25, 100).is_err());
    }

    #[test]
    fn simple_order_parameters() {
        let req = DataTableRequest::from_params(&params(&[("order_by", "created_at"), ("order_dir", "desc")]), 25, 100)
            .unwrap();
        assert_eq!(req.order, vec![("created_at".to_string(), SortDirection::Desc)]);
    }

    #[test]
    fn search_escapes_like_wildcards() {
        let req = DataTableRequest::from_params(&params(&[("search", "50%_off")]), 25, 100).unwrap();
        let clause = req.search_clause(&["name", "sku"]).unwrap();
        assert_eq!(clause["$or"][0]["name"]["$ilike"], "%50\\%\\_off%");
        assert_eq!(clause["$or"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn filter_data_combines_base_and_search() {
        let req = DataTableRequest::from_params(&params(&[("search", "bolt")]), 25, 100).unwrap();
        let data = req.to_filter_data(Some(json!({ "category": "hardware" })), &["name"], "created_at desc");
        let where_clause = data.where_clause.unwrap();
        assert_eq!(where_clause["$and"][0]["category"], "hardware");
        assert_eq!(data.order, Some(json!("created_at desc")));
        assert_eq!((data.limit, data.offset), (Some(25), Some(0)));
    }

    #[test]
    fn multi_column_sort_keeps_priority() {
        use crate::filter::filter_order::FilterOrder;
        use crate::filter::types::{ColumnDef, ColumnKind, FilterOptions};

        let req = DataTableRequest::from_params(
            &params(&[
                ("columns[0][data]", "name"),
                ("columns[1][data]", "category"),
                ("order[0][column]", "0"),
                ("order[0][dir]", "asc"),
                ("order[1][column]", "1"),
                ("order[1][dir]", "desc"),
                ("order[2][column]", "0"),
                ("order[2][dir]", "desc"),
            ]),
            25,
            100,
        )
        .unwrap();
        let data = req.to_filter_data(None, &[], "created_at desc");
        assert_eq!(data.order, Some(json!(["name ASC", "category DESC"])));

        static COLUMNS: &[ColumnDef] =
            &[ColumnDef::new("name", ColumnKind::Text), ColumnDef::new("category", ColumnKind::Text)];
        let options = FilterOptions { columns: COLUMNS, ..Default::default() };
        let infos = FilterOrder::validate_and_parse(data.order.as_ref().unwrap(), &options).unwrap();
        assert_eq!(FilterOrder::generate(&infos), "ORDER BY \"name\" ASC, \"category\" DESC");
    }

    #[test]
    fn page_serializes_in_datatables_shape() {
        let page = DataTablePage { draw: 2, records_total: 10, records_filtered: 4, data: vec![1, 2] };
        let value = serde_json::to_value(page).unwrap();
        assert_eq!(value, json!({ "draw": 2, "recordsTotal": 10, "recordsFiltered": 4, "data": [1, 2] }));
    }

    #[test]
    fn equality_filters_parse_types() {
        let p = params(&[("status", "pending"), ("is_active", "true"), ("ignored", "x")]);
        let value = equality_filters(&p, &[("status", FilterValueKind::Text), ("is_active", FilterValueKind::Boolean)])
            .unwrap()
            .unwrap();
        assert_eq!(value, json!({ "status": "pending", "is_active": true }));

        let bad = params(&[("is_active", "maybe")]);
        assert!(equality_filters(&bad, &[("is_active", FilterValueKind::Boolean)]).is_err());
    }
}
