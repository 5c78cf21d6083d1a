use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch data from {url}, status code: {status}")]
    Status { url: String, status: StatusCode },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// GET `url` once and return the body. Anything but a 200 is an error.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let request_error = |source| FetchError::Request {
        url: url.to_string(),
        source,
    };

    info!("Fetching page: {}", url);
    let response = client.get(url).send().await.map_err(request_error)?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(request_error)?;
    debug!("Fetched {} bytes from {}", body.len(), url);
    Ok(body)
}
