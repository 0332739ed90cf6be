use anyhow::{Context, Result};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://chapi.cloudhealthtech.com";

/// A non-2xx response from the CloudHealth API. The body is still parsed
/// as JSON when present so API-provided error details reach the caller.
#[derive(Debug, Error)]
#[error("API request failed with status {status}{}", detail(.body))]
pub struct UpstreamError {
    pub status: u16,
    pub body: Option<Value>,
}

fn detail(body: &Option<Value>) -> String {
    match body {
        Some(json) => format!(": {}", json),
        None => String::new(),
    }
}

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    pub json: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let parsed = Url::parse(base_url).context("parsing base URL")?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static("chapi/0.1"))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            http,
            api_key: api_key.to_string(),
        })
    }

    pub fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ResponseData> {
        self.request(Method::GET, path, query, Option::<&Value>::None)
    }

    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&T>,
    ) -> Result<ResponseData> {
        self.request(Method::POST, path, query, body)
    }

    pub fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&T>,
    ) -> Result<ResponseData> {
        self.request(Method::PUT, path, query, body)
    }

    pub fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<ResponseData> {
        self.request(Method::DELETE, path, query, Option::<&Value>::None)
    }

    fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&T>,
    ) -> Result<ResponseData> {
        let normalized = path.trim_start_matches('/');
        let url = self
            .base_url
            .join(normalized)
            .with_context(|| format!("joining path `{}` to base URL", path))?;

        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, HeaderValue::from_static("chapi/0.1"))
            .query(query)
            .query(&[("api_key", self.api_key.as_str())]);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().context("sending request")?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().context("reading response body")?;
        let json: Option<Value> = serde_json::from_str(&text).ok();

        if !(200..300).contains(&status) {
            return Err(UpstreamError { status, body: json }.into());
        }

        Ok(ResponseData {
            status,
            headers,
            body: text,
            json,
        })
    }
}
