use crate::http::{HttpHandler, HttpMethod, HttpRequest, HttpResponse};
use crate::Error;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use std::collections::HashMap;
use std::str::FromStr;

impl HttpHandler for Client {
    fn handle_request(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        let mut headers = HeaderMap::new();
        for (key, value) in &req.headers {
            let name = HeaderName::from_str(key)
                .map_err(|e| Error::Configuration(format!("invalid header name `{}`: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Configuration(format!("invalid value for `{}`: {}", key, e)))?;
            headers.insert(name, value);
        }

        let mut builder = match req.method {
            HttpMethod::Head => self.head(&req.url),
            HttpMethod::Patch => self.patch(&req.url),
            HttpMethod::Options => self.request(Method::OPTIONS, &req.url),
            HttpMethod::Post => self.post(&req.url),
            HttpMethod::Delete => self.delete(&req.url),
        }
        .headers(headers);

        if let Some(body) = &req.body {
            builder = builder.body(Vec::from(body.as_ref()));
        }

        let response = builder
            .send()
            .map_err(|err| Error::Transport(err.to_string()))?;

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            headers.insert(
                key.to_string(),
                value.to_str().map(String::from).unwrap_or_default(),
            );
        }

        Ok(HttpResponse {
            status_code: response.status().as_u16(),
            headers,
        })
    }
}
