//! The `http` namespace: get, post, put, delete, patch, head
//!
//! Network access is disabled unless [`NetConfig::enabled`] is set, and
//! every URL is checked against the configured allowlist. Responses are
//! dicts: `{status, headers, body, json?}` — the `json` key appears when
//! the body parses as JSON.

use indexmap::IndexMap;

use crate::builtins::{expect_string, json::json_to_value};
use crate::config::NetConfig;
use crate::context::{Kwargs, NamespaceCall};
use crate::error::RuntimeErrorKind;
use crate::value::Value;

pub struct HttpNamespace {
    net: NetConfig,
}

impl HttpNamespace {
    pub fn new(net: NetConfig) -> Self {
        HttpNamespace { net }
    }

    fn is_address_allowed(&self, url: &str) -> bool {
        if !self.net.enabled {
            return false;
        }
        // Empty allowlist = all allowed (if enabled).
        if self.net.allowed_addresses.is_empty() {
            return true;
        }
        self.net
            .allowed_addresses
            .iter()
            .any(|allowed| url.contains(allowed))
    }

    fn request(
        &self,
        callee: &str,
        method: &str,
        url: &str,
        kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        if !self.net.enabled {
            return Err(RuntimeErrorKind::Host {
                message: "network I/O is disabled; enable it with --allow-network".to_string(),
            });
        }
        if !self.is_address_allowed(url) {
            return Err(RuntimeErrorKind::Host {
                message: format!("network address not allowed: {}", url),
            });
        }

        let mut request = match method {
            "GET" => ureq::get(url),
            "POST" => ureq::post(url),
            "PUT" => ureq::put(url),
            "DELETE" => ureq::delete(url),
            "PATCH" => ureq::patch(url),
            "HEAD" => ureq::head(url),
            _ => {
                return Err(RuntimeErrorKind::bad_argument(
                    callee,
                    format!("unsupported HTTP method: {}", method),
                ))
            }
        };

        if let Some(Value::Dict(headers)) = kwargs.get("headers") {
            for (key, value) in headers.borrow().iter() {
                request = request.set(key, &value.to_display_string());
            }
        }

        let timeout_ms = match kwargs.get("timeout") {
            Some(Value::Int(secs)) => *secs as u64 * 1000,
            Some(Value::Float(secs)) => (*secs * 1000.0) as u64,
            _ => self.net.timeout_ms.unwrap_or(30_000),
        };
        request = request.timeout(std::time::Duration::from_millis(timeout_ms));

        let body = match (kwargs.get("json"), kwargs.get("body")) {
            (Some(json_value), _) => {
                request = request.set("Content-Type", "application/json");
                Some(
                    serde_json::to_string(&crate::builtins::json::value_to_json(
                        callee, json_value,
                    )?)
                    .map_err(|e| RuntimeErrorKind::bad_argument(callee, e.to_string()))?,
                )
            }
            (None, Some(body_value)) => Some(body_value.to_display_string()),
            (None, None) => None,
        };

        let response = match body {
            Some(text) => request.send_string(&text),
            None => request.call(),
        };

        let response = match response {
            Ok(r) => r,
            // Non-2xx responses still carry a useful body.
            Err(ureq::Error::Status(_, r)) => r,
            Err(e) => {
                return Err(RuntimeErrorKind::Host {
                    message: format!("HTTP {} failed: {}", method, e),
                })
            }
        };

        let status = response.status();
        let mut headers = IndexMap::new();
        for name in response.headers_names() {
            let value = response.header(&name).unwrap_or("").to_string();
            headers.insert(name, Value::string(value));
        }

        let body_text = response.into_string().map_err(|e| RuntimeErrorKind::Host {
            message: format!("failed to read response: {}", e),
        })?;

        let mut result = IndexMap::new();
        result.insert("status".to_string(), Value::Int(i64::from(status)));
        result.insert("headers".to_string(), Value::dict(headers));
        result.insert("body".to_string(), Value::string(body_text.clone()));
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&body_text) {
            result.insert("json".to_string(), json_to_value(&parsed));
        }
        Ok(Value::dict(result))
    }
}

impl NamespaceCall for HttpNamespace {
    fn name(&self) -> &str {
        "http"
    }

    fn invoke(
        &self,
        method: &str,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        let callee = format!("http.{}", method);
        let verb = match method {
            "get" => "GET",
            "post" => "POST",
            "put" => "PUT",
            "delete" => "DELETE",
            "patch" => "PATCH",
            "head" => "HEAD",
            _ => {
                return Err(RuntimeErrorKind::UnknownMethod {
                    namespace: "http".to_string(),
                    method: method.to_string(),
                })
            }
        };
        let url = expect_string(&callee, args, 0)?;
        self.request(&callee, verb, url, kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_disabled_by_default() {
        let ns = HttpNamespace::new(NetConfig::default());
        let err = ns
            .invoke("get", &[Value::string("https://example.test")], &Kwargs::new())
            .unwrap_err();
        assert!(matches!(err, RuntimeErrorKind::Host { .. }));
    }

    #[test]
    fn test_allowlist_gate() {
        let ns = HttpNamespace::new(NetConfig {
            enabled: true,
            allowed_addresses: vec!["api.allowed.test".to_string()],
            timeout_ms: None,
        });
        let err = ns
            .invoke(
                "get",
                &[Value::string("https://other.test/path")],
                &Kwargs::new(),
            )
            .unwrap_err();
        match err {
            RuntimeErrorKind::Host { message } => {
                assert!(message.contains("not allowed"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_method() {
        let ns = HttpNamespace::new(NetConfig::default());
        assert!(matches!(
            ns.invoke("options", &[], &Kwargs::new()).unwrap_err(),
            RuntimeErrorKind::UnknownMethod { .. }
        ));
    }
}
