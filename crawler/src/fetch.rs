use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode};

/// One HTTP exchange. `final_url` is the URL after the client followed
/// redirects and is the key used for dedup sets and file naming.
#[derive(Debug)]
pub struct FetchResult {
    pub url: String,
    pub final_url: String,
    pub status: StatusCode,
    pub content_type: String,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

pub async fn fetch_url(
    client: &Client,
    url: &str,
    extra_headers: Option<HeaderMap>,
) -> Result<FetchResult, reqwest::Error> {
    let mut request = client.get(url);
    if let Some(headers) = extra_headers {
        request = request.headers(headers);
    }
    let response = request.send().await?;

    let final_url = response.url().to_string();
    let status = response.status();
    let headers = response.headers().clone();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = response.bytes().await?.to_vec();

    Ok(FetchResult { url: url.to_string(), final_url, status, content_type, body, headers })
}

/// Short classification string for journal records.
pub fn classify(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timeout: {err}")
    } else if err.is_connect() {
        format!("connect: {err}")
    } else if err.is_redirect() {
        format!("redirect: {err}")
    } else if err.is_builder() {
        format!("invalid url: {err}")
    } else if err.is_decode() {
        format!("decode: {err}")
    } else {
        err.to_string()
    }
}
