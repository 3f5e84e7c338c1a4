//! 字段访问器
//!
//! 引擎从不直接读取请求内部结构，而是通过宿主注入的访问器函数取值。
//! 字段不存在时访问器返回 `None`，不会报错。

use crate::error::{ConfigurationError, Result};
use http::{HeaderMap, Request};
use serde_json::Value;
use std::sync::Arc;

/// 字段访问器：`(请求, 字段名) -> 观测值`
pub type FieldAccessor<R> = Arc<dyn Fn(&R, &str) -> Option<Value> + Send + Sync>;

/// 带有请求头集合的请求
///
/// 默认访问器通过它读取请求头。
pub trait HeaderSource {
    /// 按名称读取请求头，名称已归一化为小写
    fn header(&self, name: &str) -> Option<Value>;
}

/// JSON 请求：`{"headers": {...}}`
impl HeaderSource for Value {
    fn header(&self, name: &str) -> Option<Value> {
        let headers = self.get("headers")?.as_object()?;

        headers
            .get(name)
            .or_else(|| {
                headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .cloned()
    }
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<Value> {
        // 多值请求头只取第一个；非 ASCII 值视为缺失
        self.get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| Value::String(s.to_string()))
    }
}

impl<B> HeaderSource for Request<B> {
    fn header(&self, name: &str) -> Option<Value> {
        self.headers().header(name)
    }
}

/// 默认访问器：字段名转小写后读取请求头
pub fn header_accessor<R>() -> FieldAccessor<R>
where
    R: HeaderSource + 'static,
{
    Arc::new(|req: &R, field: &str| req.header(&field.to_ascii_lowercase()))
}

/// HTTP 请求访问器
///
/// `url` 取路径和查询串，`method` 取请求方法，其他字段读取请求头。
/// 字段名不区分大小写。
pub fn request_accessor<B>() -> FieldAccessor<Request<B>>
where
    B: 'static,
{
    Arc::new(|req: &Request<B>, field: &str| {
        let field = field.to_ascii_lowercase();
        match field.as_str() {
            "url" => {
                let url = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or_else(|| req.uri().path());
                Some(Value::String(url.to_string()))
            }
            "method" => Some(Value::String(req.method().as_str().to_string())),
            _ => req.header(&field),
        }
    })
}

/// 按配置名称选择 HTTP 请求访问器
pub fn accessor_by_name<B>(name: &str) -> Result<FieldAccessor<Request<B>>>
where
    B: 'static,
{
    match name {
        "headers" => Ok(header_accessor()),
        "request" => Ok(request_accessor()),
        other => Err(ConfigurationError::UnknownAccessor(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http_request() -> Request<()> {
        Request::builder()
            .method("POST")
            .uri("/api/users?page=2")
            .header("User-Agent", "Mozilla/5.0 (Linux; Android 14)")
            .header("X-Version", "1.0")
            .body(())
            .unwrap()
    }

    #[test]
    fn test_json_header_lookup_is_case_normalized() {
        let req = json!({ "headers": { "x-sf-version": "1.0", "Accept": "text/html" } });
        let accessor = header_accessor::<Value>();

        assert_eq!(accessor(&req, "X-SF-Version"), Some(json!("1.0")));
        assert_eq!(accessor(&req, "accept"), Some(json!("text/html")));
        assert_eq!(accessor(&req, "missing"), None);
    }

    #[test]
    fn test_json_without_headers() {
        let accessor = header_accessor::<Value>();
        assert_eq!(accessor(&json!({}), "url"), None);
        assert_eq!(accessor(&json!({ "headers": "nope" }), "url"), None);
    }

    #[test]
    fn test_http_header_accessor() {
        let req = http_request();
        let accessor = header_accessor::<Request<()>>();

        assert_eq!(accessor(&req, "X-VERSION"), Some(json!("1.0")));
        assert_eq!(accessor(&req, "url"), None);
    }

    #[test]
    fn test_request_accessor() {
        let req = http_request();
        let accessor = request_accessor::<()>();

        assert_eq!(accessor(&req, "URL"), Some(json!("/api/users?page=2")));
        assert_eq!(accessor(&req, "method"), Some(json!("POST")));
        assert_eq!(
            accessor(&req, "user-agent"),
            Some(json!("Mozilla/5.0 (Linux; Android 14)"))
        );
        assert_eq!(accessor(&req, "x-missing"), None);
    }

    #[test]
    fn test_accessor_by_name() {
        assert!(accessor_by_name::<()>("headers").is_ok());
        assert!(accessor_by_name::<()>("request").is_ok());

        let err = accessor_by_name::<()>("Blop").err().unwrap();
        assert!(matches!(err, ConfigurationError::UnknownAccessor(name) if name == "Blop"));
    }
}
