use crate::client::ApiClient;
use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

const BASE: &str = "/olap_reports";

/// A report topic parsed from the `links` map. Nested listing fills in
/// `reports` with the topics one level down.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Topic {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports: Option<Vec<Topic>>,
}

#[derive(Debug)]
pub struct ReportClient<'a> {
    api: &'a ApiClient,
}

impl<'a> ReportClient<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Lists topics, or the reports under one topic.
    pub fn list(&self, topic: Option<&str>) -> Result<Vec<Topic>> {
        let path = match topic {
            Some(topic) => format!("{}/{}", BASE, topic),
            None => BASE.to_string(),
        };
        let response = self.api.get(&path, &[])?;
        let json = response.json.context("report list response was not JSON")?;
        parse_links(&json)
    }

    /// Lists every topic with its reports attached, fetching the per-topic
    /// listings concurrently.
    pub fn list_nested(&self) -> Result<Vec<Topic>> {
        let topics = self.list(None)?;
        topics
            .into_par_iter()
            .map(|mut topic| {
                topic.reports = Some(self.list(Some(&topic.id))?);
                Ok(topic)
            })
            .collect()
    }

    /// Fetches report data. Numeric ids address custom reports.
    pub fn get(&self, id: &str) -> Result<Value> {
        let path = if id.chars().all(|c| c.is_ascii_digit()) && !id.is_empty() {
            format!("{}/custom/{}", BASE, id)
        } else {
            format!("{}/{}", BASE, id)
        };
        let response = self.api.get(&path, &[])?;
        response.json.context("report response was not JSON")
    }

    /// Lists the dimensions and measures available under a report base
    /// such as `cost/history`. Short mode keeps only label and name.
    pub fn dimensions(&self, base: &str, short: bool) -> Result<Value> {
        let response = self.api.get(&format!("{}/{}/new", BASE, base), &[])?;
        let mut json = response
            .json
            .context("report dimensions response was not JSON")?;

        if short {
            for key in ["dimensions", "measures"] {
                if let Some(entries) = json.get_mut(key).and_then(Value::as_array_mut) {
                    for entry in entries.iter_mut() {
                        *entry = serde_json::json!({
                            "label": entry.get("label").cloned().unwrap_or(Value::Null),
                            "name": entry.get("name").cloned().unwrap_or(Value::Null),
                        });
                    }
                }
            }
        }
        Ok(json)
    }

    /// Generates a custom report from a base, an x-axis dimension, a
    /// measure, a category dimension, and an optional time interval.
    pub fn generate(
        &self,
        base: &str,
        x: &str,
        y: &str,
        category: &str,
        interval: Option<&str>,
    ) -> Result<Value> {
        let mut query: Vec<(&str, String)> = vec![
            ("dimensions[]", x.to_string()),
            ("dimensions[]", category.to_string()),
            ("measures[]", y.to_string()),
        ];
        if let Some(interval) = interval {
            if !interval.is_empty() {
                query.push(("interval", interval.to_string()));
            }
        }
        let response = self.api.get(&format!("{}/{}", BASE, base), &query)?;
        response.json.context("report response was not JSON")
    }
}

/// Extracts `{name, id}` topics from a listing's `links` map. The id is
/// the `report_id` query parameter when present, otherwise the path after
/// `olap_reports/`.
fn parse_links(json: &Value) -> Result<Vec<Topic>> {
    let links = json
        .get("links")
        .and_then(Value::as_object)
        .context("report list response missing links")?;

    let report_id = Regex::new(r"report_id=([0-9]+)").expect("static regex");
    let tail = Regex::new(r"olap_reports/(.+)$").expect("static regex");

    let mut topics = Vec::new();
    for (name, link) in links {
        let href = link.get("href").and_then(Value::as_str).unwrap_or("");
        let id = report_id
            .captures(href)
            .or_else(|| tail.captures(href))
            .map(|caps| caps[1].to_string());
        if let Some(id) = id {
            topics.push(Topic {
                name: name.clone(),
                id,
                reports: None,
            });
        }
    }
    Ok(topics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn listing() -> Value {
        json!({
            "links": {
                "Cost History": {"href": "https://x/olap_reports/cost/history"},
                "My Custom": {"href": "https://x/olap_reports/custom?report_id=314"}
            }
        })
    }

    #[test]
    fn parse_links_prefers_report_id_over_path() {
        let topics = parse_links(&listing()).unwrap();

        assert!(topics.contains(&Topic {
            name: "Cost History".into(),
            id: "cost/history".into(),
            reports: None,
        }));
        assert!(topics.contains(&Topic {
            name: "My Custom".into(),
            id: "314".into(),
            reports: None,
        }));
    }

    #[test]
    fn get_routes_numeric_ids_to_custom() {
        let server = MockServer::start();
        let custom = server.mock(|when, then| {
            when.method(GET).path("/olap_reports/custom/314");
            then.status(200).json_body(json!({"report": "data"}));
        });
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let client = ReportClient::new(&api);

        client.get("314").unwrap();
        custom.assert();
    }

    #[test]
    fn dimensions_short_mode_projects_label_and_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/olap_reports/cost/history/new");
            then.status(200).json_body(json!({
                "dimensions": [{"label": "Time", "name": "time", "extra": 1}],
                "measures": [{"label": "Cost", "name": "cost", "extra": 2}]
            }));
        });
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let client = ReportClient::new(&api);

        let full = client.dimensions("cost/history", false).unwrap();
        assert_eq!(full["dimensions"][0]["extra"], 1);

        let short = client.dimensions("cost/history", true).unwrap();
        assert_eq!(short["dimensions"][0], json!({"label": "Time", "name": "time"}));
        assert_eq!(short["measures"][0], json!({"label": "Cost", "name": "cost"}));
    }

    #[test]
    fn generate_sends_dimensions_and_measures() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/olap_reports/cost/history")
                .query_param("measures[]", "cost")
                .query_param("interval", "monthly");
            then.status(200).json_body(json!({"data": []}));
        });
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let client = ReportClient::new(&api);

        client
            .generate("cost/history", "time", "cost", "service", Some("monthly"))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn nested_listing_attaches_reports_per_topic() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/olap_reports/cost/history");
            then.status(200).json_body(json!({
                "links": {
                    "Monthly": {"href": "https://x/olap_reports/custom?report_id=1"}
                }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/olap_reports");
            then.status(200).json_body(json!({
                "links": {
                    "Cost History": {"href": "https://x/olap_reports/cost/history"}
                }
            }));
        });
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let client = ReportClient::new(&api);

        let topics = client.list_nested().unwrap();

        assert_eq!(topics.len(), 1);
        let reports = topics[0].reports.as_ref().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "1");
    }
}
