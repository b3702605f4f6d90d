use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tracing::warn;

use super::request::{ApiRequest, RequestKind};
use crate::config::TenancyConfig;

/// Attaches credentials and tenant context to an outgoing request.
///
/// An existing `Authorization` header is replaced. The tenant query parameter
/// is added to REST calls only, and never when the caller already set it.
/// Values that cannot be encoded as headers are skipped with a warning; a
/// request is never refused here.
pub fn decorate(
    request: &mut ApiRequest,
    access_token: Option<&str>,
    tenant_id: Option<&str>,
    tenancy: &TenancyConfig,
) {
    request.headers.remove(AUTHORIZATION);
    if let Some(token) = access_token {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!("Access token is not a valid header value: {}", e),
        }
    }

    let Some(tenant_id) = tenant_id else {
        return;
    };

    if tenancy.send_header {
        let name = HeaderName::from_bytes(tenancy.header_name.as_bytes());
        let value = HeaderValue::from_str(tenant_id);
        match (name, value) {
            (Ok(name), Ok(value)) => {
                request.headers.insert(name, value);
            }
            _ => warn!(
                "Cannot send tenant '{}' in header '{}'",
                tenant_id, tenancy.header_name
            ),
        }
    }

    if tenancy.send_query_param
        && request.kind == RequestKind::Rest
        && !request.has_query_param(&tenancy.query_param_name)
    {
        request
            .query
            .push((tenancy.query_param_name.clone(), tenant_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_adds_bearer_header_and_query_param() {
        let mut request = ApiRequest::get("/products/");
        decorate(&mut request, Some("abc"), Some("7"), &TenancyConfig::default());

        assert_eq!(request.header("authorization"), Some("Bearer abc"));
        assert_eq!(request.header("x-tenant-id"), Some("7"));
        assert_eq!(
            request.query,
            vec![("tenant_id".to_string(), "7".to_string())]
        );
    }

    #[test]
    fn test_existing_query_param_is_not_duplicated() {
        let mut request = ApiRequest::get("/products/?tenant_id=3");
        decorate(&mut request, None, Some("7"), &TenancyConfig::default());
        assert!(request.query.is_empty());
        assert_eq!(request.header("authorization"), None);

        let mut request = ApiRequest::get("/sales/").with_query("tenant_id", "3");
        decorate(&mut request, None, Some("7"), &TenancyConfig::default());
        assert_eq!(request.query.len(), 1);
        assert_eq!(request.query[0].1, "3");
    }

    #[test]
    fn test_graphql_gets_header_but_no_query_param() {
        let mut request = ApiRequest::graphql("{ me { id } }", Some(json!({})));
        decorate(&mut request, Some("abc"), Some("7"), &TenancyConfig::default());
        assert!(request.query.is_empty());
        assert_eq!(request.header("x-tenant-id"), Some("7"));
    }

    #[test]
    fn test_redecorating_replaces_token() {
        let mut request = ApiRequest::get("/products/");
        decorate(&mut request, Some("old"), None, &TenancyConfig::default());
        decorate(&mut request, Some("new"), None, &TenancyConfig::default());
        assert_eq!(request.bearer_token(), Some("new"));
        assert_eq!(request.headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn test_tenancy_switches_and_bad_header_name() {
        let tenancy = TenancyConfig {
            send_header: false,
            send_query_param: false,
            ..Default::default()
        };
        let mut request = ApiRequest::get("/products/");
        decorate(&mut request, Some("abc"), Some("7"), &tenancy);
        assert_eq!(request.header("x-tenant-id"), None);
        assert!(request.query.is_empty());

        let tenancy = TenancyConfig {
            header_name: "bad header".to_string(),
            ..Default::default()
        };
        let mut request = ApiRequest::get("/products/");
        decorate(&mut request, Some("abc"), Some("7"), &tenancy);
        assert_eq!(request.header("authorization"), Some("Bearer abc"));
        assert_eq!(request.query.len(), 1);
    }
}
