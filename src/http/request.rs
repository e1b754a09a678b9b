use crate::error::Error;
use crate::ids::RequestId;
use http::Method;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Maximum number of params/query pairs before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Name of the param carrying the caught error into the error controller.
pub const EXCEPTION_PARAM: &str = "exception";

/// A request param: route/user text, or the error handed to the error controller.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Text(String),
    Exception(Arc<Error>),
}

impl ParamValue {
    /// Text content, `None` for exceptions.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::Exception(_) => None,
        }
    }

    #[must_use]
    pub fn as_exception(&self) -> Option<&Arc<Error>> {
        match self {
            ParamValue::Exception(e) => Some(e),
            ParamValue::Text(_) => None,
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Text(a), ParamValue::Text(b)) => a == b,
            (ParamValue::Exception(a), ParamValue::Exception(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Exception(e) => write!(f, "{} ({})", e, e.code()),
        }
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<Arc<Error>> for ParamValue {
    fn from(e: Arc<Error>) -> Self {
        ParamValue::Exception(e)
    }
}

/// Ordered request params. Names are shared `Arc<str>` since route configs
/// hand out the same names for every request.
pub type ParamVec = SmallVec<[(Arc<str>, ParamValue); MAX_INLINE_PARAMS]>;

/// Ordered query pairs.
pub type QueryVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Ordered headers, looked up case-insensitively.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Which host produced the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Http,
    Cli,
}

/// The request being dispatched.
///
/// Module/controller/action start empty and are filled by the router; the
/// dispatcher canonicalizes them before resolving the controller.
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    kind: RequestKind,
    method: Method,
    uri: String,
    base_uri: Option<String>,
    language: Option<String>,
    query: QueryVec,
    headers: HeaderVec,
    module: String,
    controller: String,
    action: String,
    params: ParamVec,
    routed: bool,
    dispatched: bool,
}

impl Request {
    /// HTTP request for `uri` (path plus optional `?query`).
    #[must_use]
    pub fn http(method: Method, uri: &str) -> Self {
        Self::build(RequestKind::Http, method, uri)
    }

    /// Command line request; the method is reported as `CLI`.
    #[must_use]
    pub fn cli(uri: &str) -> Self {
        let method = Method::from_bytes(b"CLI").unwrap_or(Method::GET);
        Self::build(RequestKind::Cli, method, uri)
    }

    fn build(kind: RequestKind, method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (uri, QueryVec::new()),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            id: RequestId::new(),
            kind,
            method,
            uri: path.to_string(),
            base_uri: None,
            language: None,
            query,
            headers: HeaderVec::new(),
            module: String::new(),
            controller: String::new(),
            action: String::new(),
            params: ParamVec::new(),
            routed: false,
            dispatched: false,
        }
    }

    /// Builder-style header insertion. An `X-Request-Id` header seeds the id.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("x-request-id") {
            self.id = RequestId::from_header_or_new(Some(value));
        }
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.to_string()));
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    #[must_use]
    pub fn is_cli(&self) -> bool {
        self.kind == RequestKind::Cli
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    #[must_use]
    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    #[must_use]
    pub fn is_put(&self) -> bool {
        self.method == Method::PUT
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.method == Method::DELETE
    }

    #[must_use]
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    #[must_use]
    pub fn is_options(&self) -> bool {
        self.method == Method::OPTIONS
    }

    #[must_use]
    pub fn is_xml_http_request(&self) -> bool {
        self.get_header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    /// Request path, without query string.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    #[must_use]
    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    /// Set the prefix stripped before routing; a lone `/` means none.
    pub fn set_base_uri(&mut self, base_uri: Option<&str>) {
        self.base_uri = base_uri
            .map(|b| b.trim_end_matches('/'))
            .filter(|b| !b.is_empty())
            .map(str::to_string);
    }

    /// Explicit language, else the first `Accept-Language` tag.
    #[must_use]
    pub fn get_language(&self) -> Option<&str> {
        if let Some(lang) = &self.language {
            return Some(lang);
        }
        self.get_header("accept-language")
            .and_then(|v| v.split(',').next())
            .map(|tag| tag.split(';').next().unwrap_or(tag).trim())
            .filter(|tag| !tag.is_empty())
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = Some(language.into());
    }

    /// Get a query parameter by name ("last write wins").
    #[inline]
    #[must_use]
    pub fn get_query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query(&self) -> &[(Arc<str>, String)] {
        &self.query
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn set_module(&mut self, module: impl Into<String>) {
        self.module = module.into();
    }

    #[must_use]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn set_controller(&mut self, controller: impl Into<String>) {
        self.controller = controller.into();
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Text param by name.
    #[must_use]
    pub fn get_param_str(&self, name: &str) -> Option<&str> {
        self.get_param(name).and_then(ParamValue::as_str)
    }

    /// Set a param; an existing name keeps its position.
    pub fn set_param(&mut self, name: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| k.as_ref() == name) {
            Some((_, slot)) => *slot = value,
            None => self.params.push((Arc::from(name), value)),
        }
    }

    pub fn set_params<I, K, V>(&mut self, params: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParamValue>,
    {
        for (k, v) in params {
            self.set_param(k.as_ref(), v);
        }
    }

    #[must_use]
    pub fn params(&self) -> &[(Arc<str>, ParamValue)] {
        &self.params
    }

    pub fn clear_params(&mut self) {
        self.params.clear();
    }

    /// The error handed to the error controller, if any.
    #[must_use]
    pub fn exception(&self) -> Option<&Arc<Error>> {
        self.get_param(EXCEPTION_PARAM)
            .and_then(ParamValue::as_exception)
    }

    #[must_use]
    pub fn is_routed(&self) -> bool {
        self.routed
    }

    pub fn set_routed(&mut self, routed: bool) {
        self.routed = routed;
    }

    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    pub fn set_dispatched(&mut self, dispatched: bool) {
        self.dispatched = dispatched;
    }
}

fn parse_query(query: &str) -> QueryVec {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (Arc::from(decode(k).as_str()), decode(v))
        })
        .collect()
}

fn decode(s: &str) -> String {
    let plus = s.replace('+', " ");
    urlencoding::decode(&plus)
        .map(|c| c.into_owned())
        .unwrap_or(plus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_query_is_split_from_path() {
        let req = Request::http(Method::GET, "/user/list?page=2&q=a+b&page=3");
        assert_eq!(req.uri(), "/user/list");
        assert_eq!(req.get_query("page"), Some("3"));
        assert_eq!(req.get_query("q"), Some("a b"));
        assert!(req.params().is_empty());
    }

    #[test]
    fn test_set_param_replaces_in_place() {
        let mut req = Request::http(Method::GET, "/");
        req.set_param("a", "1");
        req.set_param("b", "2");
        req.set_param("a", "3");
        let names: Vec<_> = req.params().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(req.get_param_str("a"), Some("3"));
    }

    #[test]
    fn test_exception_param() {
        let mut req = Request::http(Method::GET, "/");
        assert!(req.exception().is_none());
        let err = Arc::new(Error::new(ErrorCode::ActionNotFound, "nope"));
        req.set_param(EXCEPTION_PARAM, Arc::clone(&err));
        assert_eq!(req.exception().map(|e| e.code()), Some(ErrorCode::ActionNotFound));
        assert!(req.get_param_str(EXCEPTION_PARAM).is_none());
    }

    #[test]
    fn test_headers_and_language() {
        let req = Request::http(Method::POST, "/")
            .with_header("Accept-Language", "de-DE;q=0.9, en")
            .with_header("X-Requested-With", "XMLHttpRequest");
        assert_eq!(req.get_header("accept-language"), Some("de-DE;q=0.9, en"));
        assert_eq!(req.get_language(), Some("de-DE"));
        assert!(req.is_xml_http_request());
        assert!(req.is_post());
    }

    #[test]
    fn test_request_id_header_is_reused() {
        let id = RequestId::new();
        let req = Request::http(Method::GET, "/").with_header("X-Request-Id", &id.to_string());
        assert_eq!(req.request_id(), id);
    }

    #[test]
    fn test_cli_request() {
        let req = Request::cli("/index/index");
        assert!(req.is_cli());
        assert_eq!(req.method().as_str(), "CLI");
    }

    #[test]
    fn test_base_uri_normalization() {
        let mut req = Request::http(Method::GET, "/");
        req.set_base_uri(Some("/"));
        assert_eq!(req.base_uri(), None);
        req.set_base_uri(Some("/app/"));
        assert_eq!(req.base_uri(), Some("/app"));
    }
}
