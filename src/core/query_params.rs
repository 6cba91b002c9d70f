use std::collections::HashMap;

use crate::core::errors::ApiError;

/// Parse query parameters from a URI string
///
/// Values are URL decoded. Repeated keys keep the last value; a key without
/// `=` maps to an empty string.
///
/// # Example
/// ```
/// use circle::core::query_params::parse_query_params;
///
/// let params = parse_query_params("/usuarios/list?page=2&limit=5");
/// assert_eq!(params.get("page"), Some(&"2".to_string()));
/// assert_eq!(params.get("limit"), Some(&"5".to_string()));
/// ```
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if let Some(query_start) = uri.find('?') {
        let query = &uri[query_start + 1..];
        for param in query.split('&').filter(|p| !p.is_empty()) {
            if let Some(eq_idx) = param.find('=') {
                let key = &param[..eq_idx];
                let encoded_value = &param[eq_idx + 1..];
                let decoded = urlencoding::decode(encoded_value)
                    .unwrap_or(std::borrow::Cow::Borrowed(encoded_value))
                    .to_string();
                params.insert(key.to_string(), decoded);
            } else {
                params.insert(param.to_string(), String::new());
            }
        }
    }

    params
}

/// Reads a positive integer parameter. Missing or empty falls back to
/// `default`; anything else that is not a number >= 1 is rejected.
pub fn get_positive_int(
    params: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, ApiError> {
    match params.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| ApiError::Validation(format!("{} must be a positive integer", key))),
    }
}
