#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use tus_upload::http::{HttpHandler, HttpMethod, HttpRequest, HttpResponse};
use tus_upload::Error;

pub const ENDPOINT: &str = "http://tus.test/files/";

#[derive(Debug, Clone, Default)]
pub struct StoredUpload {
    pub data: Vec<u8>,
    pub length: Option<u64>,
    pub metadata: Option<String>,
}

/// Misbehaviours the server can be told to show.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Leave `Tus-Resumable` out of every response.
    pub omit_resumable: bool,
    /// Answer every PATCH with a 500.
    pub fail_patches: bool,
    /// Answer this many PATCH requests with a 500, then recover.
    pub fail_next_patches: usize,
    /// Fail this many PATCH requests at the transport level.
    pub drop_next_patches: usize,
    /// Store at most this many bytes of each PATCH body.
    pub partial_write: Option<usize>,
    /// Answer creation with a path-only `Location`.
    pub relative_location: bool,
}

#[derive(Debug, Default)]
struct ServerState {
    uploads: HashMap<String, StoredUpload>,
    next_id: usize,
    requests: Vec<HttpRequest>,
    faults: Faults,
}

/// An in-memory tus 1.0.0 server.
#[derive(Debug, Default)]
pub struct MemoryServer {
    state: Mutex<ServerState>,
}

impl MemoryServer {
    pub fn new() -> Self {
        MemoryServer::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        let server = MemoryServer::new();
        server.state.lock().faults = faults;
        server
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state.lock().faults = faults;
    }

    pub fn upload(&self, url: &str) -> Option<StoredUpload> {
        let id = url.strip_prefix(ENDPOINT)?;
        self.state.lock().uploads.get(id).cloned()
    }

    pub fn upload_count(&self) -> usize {
        self.state.lock().uploads.len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    pub fn count(&self, method: HttpMethod) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

fn response(status_code: u16, headers: &[(&str, String)]) -> HttpResponse {
    HttpResponse {
        status_code,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    }
}

impl ServerState {
    fn handle(&mut self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        if req.method == HttpMethod::Options {
            return Ok(response(
                204,
                &[
                    ("Tus-Version", "1.0.0,0.2.2".to_owned()),
                    (
                        "Tus-Extension",
                        "creation,creation-defer-length,termination".to_owned(),
                    ),
                    ("Tus-Max-Size", "1073741824".to_owned()),
                ],
            ));
        }

        if req.header("tus-resumable") != Some("1.0.0") {
            return Ok(response(412, &[("Tus-Version", "1.0.0".to_owned())]));
        }

        match req.method {
            HttpMethod::Post => self.create(req),
            HttpMethod::Head => Ok(self.head(req)),
            HttpMethod::Patch => self.patch(req),
            HttpMethod::Delete => Ok(self.delete(req)),
            HttpMethod::Options => unreachable!(),
        }
    }

    fn id_of(&self, req: &HttpRequest) -> Option<String> {
        let id = req.url.strip_prefix(ENDPOINT)?;
        if self.uploads.contains_key(id) {
            Some(id.to_owned())
        } else {
            None
        }
    }

    fn create(&mut self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        if req.url != ENDPOINT {
            return Ok(response(404, &[]));
        }
        let length = match (req.header("upload-length"), req.header("upload-defer-length")) {
            (Some(length), None) => match length.parse() {
                Ok(length) => Some(length),
                Err(_) => return Ok(response(400, &[])),
            },
            (None, Some("1")) => None,
            _ => return Ok(response(400, &[])),
        };

        self.next_id += 1;
        let id = format!("upload-{}", self.next_id);
        self.uploads.insert(
            id.clone(),
            StoredUpload {
                data: Vec::new(),
                length,
                metadata: req.header("upload-metadata").map(String::from),
            },
        );
        let location = if self.faults.relative_location {
            format!("/files/{}", id)
        } else {
            format!("{}{}", ENDPOINT, id)
        };
        Ok(response(201, &[("Location", location)]))
    }

    fn head(&mut self, req: &HttpRequest) -> HttpResponse {
        let upload = match self.id_of(req) {
            Some(id) => &self.uploads[&id],
            None => return response(404, &[]),
        };
        let mut headers = vec![
            ("Upload-Offset", upload.data.len().to_string()),
            ("Cache-Control", "no-store".to_owned()),
        ];
        match upload.length {
            Some(length) => headers.push(("Upload-Length", length.to_string())),
            None => headers.push(("Upload-Defer-Length", "1".to_owned())),
        }
        response(200, &headers)
    }

    fn patch(&mut self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        if self.faults.drop_next_patches > 0 {
            self.faults.drop_next_patches -= 1;
            return Err(Error::Transport("connection reset by peer".to_owned()));
        }
        if self.faults.fail_patches {
            return Ok(response(500, &[]));
        }
        if self.faults.fail_next_patches > 0 {
            self.faults.fail_next_patches -= 1;
            return Ok(response(500, &[]));
        }
        if req.header("content-type") != Some("application/offset+octet-stream") {
            return Ok(response(415, &[]));
        }
        let id = match self.id_of(req) {
            Some(id) => id,
            None => return Ok(response(404, &[])),
        };
        let partial_write = self.faults.partial_write;
        let upload = self.uploads.get_mut(&id).expect("id was looked up");

        let offset: usize = match req.header("upload-offset").and_then(|o| o.parse().ok()) {
            Some(offset) => offset,
            None => return Ok(response(400, &[])),
        };
        if offset != upload.data.len() {
            return Ok(response(409, &[]));
        }
        if let Some(declared) = req.header("upload-length") {
            let declared: u64 = match declared.parse() {
                Ok(declared) => declared,
                Err(_) => return Ok(response(400, &[])),
            };
            if upload.length.is_some() {
                return Ok(response(400, &[]));
            }
            upload.length = Some(declared);
        }

        let body = req.body.clone().unwrap_or_default();
        let accepted = partial_write.map_or(body.len(), |max| max.min(body.len()));
        if let Some(length) = upload.length {
            if (upload.data.len() + accepted) as u64 > length {
                return Ok(response(413, &[]));
            }
        }
        upload.data.extend_from_slice(&body[..accepted]);
        Ok(response(
            204,
            &[("Upload-Offset", upload.data.len().to_string())],
        ))
    }

    fn delete(&mut self, req: &HttpRequest) -> HttpResponse {
        match self.id_of(req) {
            Some(id) => {
                self.uploads.remove(&id);
                response(204, &[])
            }
            None => response(404, &[]),
        }
    }
}

impl HttpHandler for MemoryServer {
    fn handle_request(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        let mut state = self.state.lock();
        state.requests.push(req.clone());
        let mut result = state.handle(req);
        if let Ok(res) = result.as_mut() {
            if !state.faults.omit_resumable {
                res.headers
                    .insert("Tus-Resumable".to_owned(), "1.0.0".to_owned());
            }
        }
        result
    }
}

/// Deterministic, non-repeating test content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Forwards to a `MemoryServer`, rewriting the `Upload-Offset` it reports
/// for PATCH requests.
pub struct RewriteAck<'a> {
    pub server: &'a MemoryServer,
    pub rewrite: fn(u64) -> u64,
}

impl HttpHandler for RewriteAck<'_> {
    fn handle_request(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        let mut res = self.server.handle_request(req)?;
        if req.method == HttpMethod::Patch {
            if let Some(offset) = res.headers.get_mut("Upload-Offset") {
                if let Ok(acked) = offset.parse() {
                    *offset = (self.rewrite)(acked).to_string();
                }
            }
        }
        Ok(res)
    }
}
