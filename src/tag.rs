use crate::client::ApiClient;
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};

const BASE: &str = "/customer_tags";

/// What a tag operation applies to: a whole account (by AWS owner id) or
/// a single asset within an account.
#[derive(Debug, Clone)]
pub enum TagTarget {
    Account { owner_id: String },
    Asset { aws_account_id: String, instance_id: String },
}

#[derive(Debug)]
pub struct TagClient<'a> {
    api: &'a ApiClient,
}

impl<'a> TagClient<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Adds or updates tags on the target. API-reported failures surface
    /// as an error carrying the first failure message.
    pub fn set(&self, target: &TagTarget, tags: &Map<String, Value>) -> Result<Value> {
        let mut asset = Map::new();
        asset.insert("tags".to_string(), Value::Object(tags.clone()));
        match target {
            TagTarget::Account { owner_id } => {
                asset.insert("type".to_string(), json!("AwsAccount"));
                asset.insert("owner_id".to_string(), json!(owner_id));
            }
            TagTarget::Asset {
                aws_account_id,
                instance_id,
            } => {
                asset.insert("aws_account_id".to_string(), json!(aws_account_id));
                asset.insert("instance_id".to_string(), json!(instance_id));
            }
        }
        let body = json!({ "assets": [Value::Object(asset)] });

        let response = self.api.post_json(BASE, &[], Some(&body))?;
        let json = response.json.context("tag response was not JSON")?;

        if let Some(failure) = json
            .get("failures")
            .and_then(Value::as_array)
            .and_then(|failures| failures.first())
        {
            return Err(anyhow!("tag update failed: {}", failure));
        }
        Ok(json.get("successful").cloned().unwrap_or(json))
    }

    /// Deletes tags by setting each named key to null.
    pub fn delete(&self, target: &TagTarget, keys: &[String]) -> Result<Value> {
        let mut nulled = Map::new();
        for key in keys {
            nulled.insert(key.clone(), Value::Null);
        }
        self.set(target, &nulled)
    }
}
