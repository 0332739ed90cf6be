use crate::client::ApiClient;
use anyhow::{Context, Result};
use serde_json::{Map, Value};

#[derive(Debug)]
pub struct AssetClient<'a> {
    api: &'a ApiClient,
}

impl<'a> AssetClient<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Lists the names of object types that can be searched for.
    pub fn list_types(&self) -> Result<Vec<Value>> {
        let response = self.api.get("/api.json", &[])?;
        let json = response.json.context("asset type response was not JSON")?;
        json.get("list")
            .and_then(Value::as_array)
            .cloned()
            .context("asset type response missing list")
    }

    /// Lists the queryable fields of an asset type.
    pub fn fields_for(&self, asset_type: &str) -> Result<Vec<Value>> {
        let response = self
            .api
            .get(&format!("/api/{}.json", asset_type), &[])?;
        let json = response.json.context("asset field response was not JSON")?;
        json.get("attributes")
            .and_then(Value::as_array)
            .cloned()
            .context("asset field response missing attributes")
    }

    /// Queries assets of one type for those matching the given fields.
    /// An empty match set returns every asset of the type.
    pub fn query(&self, asset_type: &str, matches: &Map<String, Value>) -> Result<Vec<Value>> {
        let mut query: Vec<(&str, String)> = vec![("name", asset_type.to_string())];
        let chql = encode_chql(matches);
        if !chql.is_empty() {
            query.push(("query", chql));
        }

        let response = self.api.get("/api/search.json", &query)?;
        let json = response.json.context("asset query response was not JSON")?;
        json.get("list")
            .and_then(Value::as_array)
            .cloned()
            .context("asset query response missing list")
    }
}

/// Encodes a match object into the CloudHealth query language: string
/// values are single-quoted, booleans become 1/0, numbers stay bare, and
/// clauses are joined with `and`.
fn encode_chql(matches: &Map<String, Value>) -> String {
    let mut expr = String::new();
    for (key, value) in matches {
        if !expr.is_empty() {
            expr.push_str(" and ");
        }
        expr.push_str(key);
        expr.push('=');
        match value {
            Value::String(s) => {
                expr.push('\'');
                expr.push_str(s);
                expr.push('\'');
            }
            Value::Bool(b) => expr.push_str(if *b { "1" } else { "0" }),
            other => expr.push_str(&other.to_string()),
        }
    }
    expr
}
