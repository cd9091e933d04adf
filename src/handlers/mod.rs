// handlers/mod.rs - HTTP handlers in two tiers
//
// Public (no auth): /, /health, /auth/*
// Protected (Bearer JWT): /api/*

pub mod protected;
pub mod public;

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ApiError;
use crate::filter::DataTableRequest;
use crate::state::AppState;

/// DataTables paging bounded by the configured page sizes
pub(crate) fn table_request(state: &AppState, params: &HashMap<String, String>) -> Result<DataTableRequest, ApiError> {
    let api = &state.config.api;
    Ok(DataTableRequest::from_params(params, api.default_page_size, api.max_page_size)?)
}

/// Optional typed query parameter; a present but unparsable value is a 400
pub(crate) fn query_param<T: FromStr>(params: &HashMap<String, String>, key: &str) -> Result<Option<T>, ApiError> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid value for query parameter '{}': {}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_parses_or_rejects() {
        let params: HashMap<String, String> =
            [("days".to_string(), "14".to_string()), ("limit".to_string(), "ten".to_string())].into();
        assert_eq!(query_param::<i64>(&params, "days").unwrap(), Some(14));
        assert_eq!(query_param::<i64>(&params, "missing").unwrap(), None);
        assert!(query_param::<i64>(&params, "limit").is_err());
    }
}
