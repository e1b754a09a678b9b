use super::request::{HeaderVec, RequestKind};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Name of the segment used when the caller does not name one.
pub const DEFAULT_BODY: &str = "content";

/// Host output. The dispatcher hands the response to an emitter when it is
/// not asked to return it.
pub trait Emitter: Send {
    fn status(&mut self, _status: u16) -> io::Result<()> {
        Ok(())
    }
    fn header(&mut self, _name: &str, _value: &str) -> io::Result<()> {
        Ok(())
    }
    fn write_body(&mut self, chunk: &str) -> io::Result<()>;
}

/// Writes body chunks to stdout; status and headers belong to the host server.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutEmitter;

impl Emitter for StdoutEmitter {
    fn write_body(&mut self, chunk: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(chunk.as_bytes())?;
        out.flush()
    }
}

/// Everything a [`BufferEmitter`] received.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Number of body writes, one per flush.
    pub writes: usize,
}

/// In-memory emitter; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferEmitter {
    inner: Arc<Mutex<Emitted>>,
}

impl BufferEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what was emitted so far.
    #[must_use]
    pub fn emitted(&self) -> Emitted {
        self.lock().clone()
    }

    #[must_use]
    pub fn body(&self) -> String {
        self.lock().body.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Emitted> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Emitter for BufferEmitter {
    fn status(&mut self, status: u16) -> io::Result<()> {
        self.lock().status = Some(status);
        Ok(())
    }

    fn header(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.lock().headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn write_body(&mut self, chunk: &str) -> io::Result<()> {
        let mut inner = self.lock();
        inner.body.push_str(chunk);
        inner.writes += 1;
        Ok(())
    }
}

/// Response accumulated during a dispatch.
///
/// The body is an ordered list of named segments; unnamed operations target
/// the `content` segment.
#[derive(Debug, Clone)]
pub struct Response {
    kind: RequestKind,
    status: u16,
    headers: HeaderVec,
    segments: Vec<(String, String)>,
    headers_sent: bool,
}

impl Response {
    #[must_use]
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            status: 200,
            headers: HeaderVec::new(),
            segments: Vec::new(),
            headers_sent: false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Set a header. With `replace` an existing header of the same name
    /// (case-insensitive) is dropped first; otherwise a duplicate is added.
    pub fn set_header(&mut self, name: &str, value: &str, replace: bool) {
        if replace {
            self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
        self.headers.push((Arc::from(name), value.to_string()));
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &[(Arc<str>, String)] {
        &self.headers
    }

    pub fn clear_headers(&mut self) {
        self.headers.clear();
    }

    /// 302 redirect to `url`.
    pub fn set_redirect(&mut self, url: &str) {
        self.status = 302;
        self.set_header("Location", url, true);
    }

    pub fn append_body(&mut self, data: &str) {
        self.append_segment(DEFAULT_BODY, data);
    }

    pub fn prepend_body(&mut self, data: &str) {
        self.prepend_segment(DEFAULT_BODY, data);
    }

    pub fn set_body(&mut self, data: &str) {
        self.set_segment(DEFAULT_BODY, data);
    }

    /// Append to segment `name`, creating it at the end.
    pub fn append_segment(&mut self, name: &str, data: &str) {
        match self.segment_mut(name) {
            Some(body) => body.push_str(data),
            None => self.segments.push((name.to_string(), data.to_string())),
        }
    }

    /// Prepend to segment `name`, creating it at the front.
    pub fn prepend_segment(&mut self, name: &str, data: &str) {
        match self.segment_mut(name) {
            Some(body) => body.insert_str(0, data),
            None => self.segments.insert(0, (name.to_string(), data.to_string())),
        }
    }

    pub fn set_segment(&mut self, name: &str, data: &str) {
        match self.segment_mut(name) {
            Some(body) => *body = data.to_string(),
            None => self.segments.push((name.to_string(), data.to_string())),
        }
    }

    fn segment_mut(&mut self, name: &str) -> Option<&mut String> {
        self.segments
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Drop one segment, or all of them.
    pub fn clear_body(&mut self, name: Option<&str>) {
        match name {
            Some(name) => self.segments.retain(|(k, _)| k != name),
            None => self.segments.clear(),
        }
    }

    /// Content of one segment, or all segments concatenated in order.
    #[must_use]
    pub fn body(&self, name: Option<&str>) -> String {
        match name {
            Some(name) => self
                .segments
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            None => self.segments.iter().map(|(_, v)| v.as_str()).collect(),
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[(String, String)] {
        &self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|(_, v)| v.is_empty())
    }

    /// Flush to `emitter`, then clear the body. HTTP status and headers go
    /// out with the first flush only.
    pub fn response(&mut self, emitter: &mut dyn Emitter) -> io::Result<()> {
        if self.kind == RequestKind::Http && !self.headers_sent {
            emitter.status(self.status)?;
            for (name, value) in &self.headers {
                emitter.header(name, value)?;
            }
            self.headers_sent = true;
        }
        let body = self.body(None);
        if !body.is_empty() {
            emitter.write_body(&body)?;
        }
        self.segments.clear();
        Ok(())
    }
}
