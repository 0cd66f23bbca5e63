use crate::{Error, Result, config::CorsConfig};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

fn is_wildcard(items: &[String]) -> bool {
    items.iter().any(|item| item == "*")
}

/// Builds the CORS layer for `config`.
///
/// A literal `*` cannot be sent together with credentials, so wildcard
/// entries mirror the request instead when credentials are allowed.
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer> {
    let credentials = config.allow_credentials;

    let origins = if is_wildcard(&config.allowed_origins) {
        if credentials {
            warn!("CORS allows every origin with credentials, do not use this in production");
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        }
    } else {
        let origins = config
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| Error::config(format!("Invalid CORS origin: '{}'", origin)))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    let methods = if is_wildcard(&config.allowed_methods) {
        if credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::any()
        }
    } else {
        let methods = config
            .allowed_methods
            .iter()
            .map(|method| {
                method
                    .to_ascii_uppercase()
                    .parse::<Method>()
                    .map_err(|_| Error::config(format!("Invalid CORS method: '{}'", method)))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowMethods::list(methods)
    };

    let headers = if is_wildcard(&config.allowed_headers) {
        if credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::any()
        }
    } else {
        let headers = config
            .allowed_headers
            .iter()
            .map(|header| {
                HeaderName::from_bytes(header.as_bytes())
                    .map_err(|_| Error::config(format!("Invalid CORS header: '{}'", header)))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowHeaders::list(headers)
    };

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(credentials))
}
