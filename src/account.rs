use crate::client::ApiClient;
use anyhow::{anyhow, Context, Result};
use log::debug;
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{json, Value};

const BASE: &str = "/v1/aws_accounts";

/// Pagination stats derived from the list response headers.
#[derive(Debug, Clone, Serialize)]
pub struct ListStats {
    pub page_count: u32,
    pub per_page: Option<u64>,
    pub total: Option<u64>,
}

#[derive(Debug)]
pub struct AccountClient<'a> {
    api: &'a ApiClient,
}

impl<'a> AccountClient<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Lists a single page of accounts.
    pub fn list(&self, page: Option<u32>, page_count: Option<u32>) -> Result<Vec<Value>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(count) = page_count {
            query.push(("page_count", count.to_string()));
        }

        let response = self.api.get(BASE, &query)?;
        let json = response.json.context("account list response was not JSON")?;
        let accounts = json
            .get("aws_accounts")
            .and_then(Value::as_array)
            .cloned()
            .context("account list response missing aws_accounts")?;
        Ok(accounts)
    }

    /// Reads pagination stats from the list response headers: the page
    /// number of the `rel="last"` link plus `x-per-page` and `x-total`.
    pub fn stats(&self) -> Result<ListStats> {
        let response = self.api.get(BASE, &[])?;

        let link = response
            .headers
            .get("link")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let last_page = Regex::new(r#"&page=([0-9]+)>;\s?rel="last""#)
            .expect("static regex")
            .captures(link)
            .and_then(|caps| caps[1].parse::<u32>().ok());

        let header_number = |name: &str| {
            response
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        Ok(ListStats {
            // no rel="last" link means everything fits on one page
            page_count: last_page.unwrap_or(1),
            per_page: header_number("x-per-page"),
            total: header_number("x-total"),
        })
    }

    /// Fetches every page concurrently and joins the results. Page fetches
    /// run in parallel, so callers must treat the result as a set rather
    /// than relying on page order.
    pub fn list_all(&self) -> Result<Vec<Value>> {
        let stats = self.stats()?;
        debug!("fetching {} account pages", stats.page_count);

        let pages: Vec<Vec<Value>> = (1..=stats.page_count)
            .into_par_iter()
            .map(|page| self.list(Some(page), None))
            .collect::<Result<_>>()?;

        Ok(pages.into_iter().flatten().collect())
    }

    pub fn get(&self, id: &str) -> Result<Value> {
        let response = self.api.get(&format!("{}/{}", BASE, id), &[])?;
        response.json.context("account response was not JSON")
    }

    /// Returns accounts whose `field` matches `value` as a case-insensitive
    /// regex. Pass a pre-fetched list to search without another round of
    /// HTTP requests.
    pub fn find_by(&self, field: &str, value: &str, list: Option<&[Value]>) -> Result<Vec<Value>> {
        let pattern = RegexBuilder::new(value)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("compiling pattern `{}`", value))?;

        let matches = |account: &Value| {
            account
                .get(field)
                .map(|v| pattern.is_match(&field_text(v)))
                .unwrap_or(false)
        };

        match list {
            Some(accounts) => Ok(accounts.iter().filter(|a| matches(*a)).cloned().collect()),
            None => {
                let accounts = self.list_all()?;
                Ok(accounts.into_iter().filter(matches).collect())
            }
        }
    }

    pub fn create(&self, account: Value) -> Result<Value> {
        let response = self.api.post_json(BASE, &[], Some(&account))?;
        response.json.context("account response was not JSON")
    }

    /// Updates the account identified by the body's `id` field; the id is
    /// stripped from the body before the PUT.
    pub fn update(&self, mut account: Value) -> Result<Value> {
        let id = match account.as_object_mut().and_then(|map| map.remove("id")) {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(anyhow!("account update body has no id field")),
        };
        let response = self
            .api
            .put_json(&format!("{}/{}", BASE, id), &[], Some(&account))?;
        response.json.context("account response was not JSON")
    }

    pub fn destroy(&self, id: &str) -> Result<String> {
        self.api.delete(&format!("{}/{}", BASE, id), &[])?;
        Ok("account destroyed".to_string())
    }

    /// CSV-driven bulk update: configures every pending account (an
    /// account whose name still equals its owner id) from the matching
    /// spreadsheet row. Returns one summary line per pending account.
    pub fn bulk_update_from_csv(&self, csv: &str) -> Result<Vec<String>> {
        let rows = parse_rows(csv)?;
        let pending: Vec<Value> = self
            .list_all()?
            .into_iter()
            .filter(|acct| {
                let name = acct.get("name").and_then(Value::as_str);
                let owner = acct.get("owner_id").and_then(Value::as_str);
                name.is_some() && name == owner
            })
            .collect();

        let mut summary = Vec::new();
        for acct in &pending {
            let owner_id = acct.get("owner_id").and_then(Value::as_str).unwrap_or("");
            let id = id_text(acct);
            match rows.iter().find(|row| row.owner_id == owner_id) {
                Some(row) => {
                    self.update(row.build_update(&id))
                        .with_context(|| format!("updating account `{}` (id: {})", row.name, id))?;
                    summary.push(format!(
                        "Successfully updated account \"{}\" (id: {})",
                        row.name, id
                    ));
                }
                None => {
                    let name = acct.get("name").and_then(Value::as_str).unwrap_or("");
                    summary.push(format!(
                        "Could not resolve account \"{}\" (id: {})",
                        name, id
                    ));
                }
            }
        }
        Ok(summary)
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn id_text(account: &Value) -> String {
    match account.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CsvRow {
    owner_id: String,
    name: String,
    short: String,
}

impl CsvRow {
    fn build_update(&self, id: &str) -> Value {
        let mut update = json!({
            "id": id,
            "name": self.name,
            "authentication": {
                "access_key": "HASNOTBEENSET",
                "secret_key": "FakeSecretKey",
            },
        });
        if !self.short.is_empty() {
            let bucket = format!("{}.logs", self.short);
            update["cloudtrail"] = json!({"enabled": true, "bucket": bucket});
            update["aws_config"] = json!({"enabled": true, "bucket": bucket});
        }
        update
    }
}

/// Parses spreadsheet rows. Columns are located by header text: the
/// account id, the display label, and the short name.
fn parse_rows(csv: &str) -> Result<Vec<CsvRow>> {
    let mut lines = csv.lines().filter(|line| !line.trim().is_empty());
    let header: Vec<String> = lines
        .next()
        .context("CSV file is empty")?
        .split(',')
        .map(|field| field.trim().to_string())
        .collect();

    let column = |pattern: &str| -> Result<usize> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("static regex");
        header
            .iter()
            .position(|field| re.is_match(field))
            .ok_or_else(|| anyhow!("CSV header has no column matching `{}`", pattern))
    };

    let id_col = column("Account ID")?;
    let name_col = column("label")?;
    let short_col = column(r"short\s?name")?;

    let mut rows = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let cell = |idx: usize| fields.get(idx).copied().unwrap_or("").to_string();
        rows.push(CsvRow {
            owner_id: cell(id_col),
            name: cell(name_col),
            short: cell(short_col),
        });
    }
    Ok(rows)
}
