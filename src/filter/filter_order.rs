use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOptions, FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value, options: &FilterOptions) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s),
            // Expect array of strings like ["created_at desc", "name asc"]
            Value::Array(arr) => arr
                .iter()
                .filter_map(Value::as_str)
                .flat_map(Self::parse_order_string)
                .collect(),
            // { "created_at": "desc", "name": "asc" }
            Value::Object(obj) => obj
                .iter()
                .map(|(k, v)| FilterOrderInfo {
                    column: k.clone(),
                    sort: SortDirection::parse(v.as_str().unwrap_or("asc")),
                })
                .collect(),
            Value::Null => vec![],
            _ => return Err(FilterError::InvalidParameter("order must be a string, array or object".to_string())),
        };

        for info in &infos {
            if options.column(&info.column).is_none() {
                return Err(FilterError::InvalidColumn(format!("Cannot order by {}", info.column)));
            }
        }
        Ok(infos)
    }

    // split on commas, then each token into column and direction
    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        s.split(',')
            .filter_map(|part| {
                let mut it = part.split_whitespace();
                let column = it.next()?;
                Some(FilterOrderInfo {
                    column: column.to_string(),
                    sort: SortDirection::parse(it.next().unwrap_or("asc")),
                })
            })
            .collect()
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
