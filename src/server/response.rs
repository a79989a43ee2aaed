//! Response building for the mirror server.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};

use crate::error::AppError;
use crate::models::StorageEntry;
use crate::storage::SiteInfo;

/// Headers that describe the original connection, not the resource.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Replay a stored entry.
pub fn entry_response(entry: StorageEntry) -> Response {
    let status = StatusCode::from_u16(entry.metadata.status).unwrap_or(StatusCode::OK);
    let mut response = Response::new(Body::from(entry.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &entry.metadata.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => log::debug!("Dropping unreplayable header {name}"),
        }
    }
    if !headers.contains_key(header::CONTENT_TYPE) {
        if let Some(value) = entry
            .metadata
            .content_type
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    response
}

/// HTTP status for a routing failure.
pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::InvalidUrl { .. } | AppError::PathTooLong { .. } => StatusCode::BAD_REQUEST,
        AppError::UnknownArchive { .. }
        | AppError::MalformedLabel { .. }
        | AppError::AmbiguousLabel(_)
        | AppError::UnsupportedHost(_)
        | AppError::NotFound(_)
        | AppError::PathCollision { .. }
        | AppError::AmbiguousPath { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error page for a routing failure.
pub fn error_response(error: &AppError, suffix: &str, link_port: &str) -> Response {
    let status = status_for(error);
    let page = match status {
        StatusCode::NOT_FOUND => not_found_page(suffix, link_port),
        _ => format!(
            "<!DOCTYPE html>\n<html><head><title>{code}</title></head>\
             <body><h1>{code}</h1><p>{message}</p></body></html>\n",
            code = status,
            message = escape_html(&error.to_string()),
        ),
    };
    (status, Html(page)).into_response()
}

fn not_found_page(suffix: &str, link_port: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><title>Not in archive</title></head><body>\
         <h1>Not in archive</h1>\
         <p>This page has not been mirrored. \
         See the <a href=\"http://{suffix}{link_port}/\">list of mirrored sites</a>.</p>\
         </body></html>\n",
        suffix = escape_html(suffix),
        link_port = escape_html(link_port),
    )
}

/// Index page listing every mirrored site with a link to its label.
pub fn index_page(sites: &[(SiteInfo, String)], link_port: &str) -> Response {
    Html(index_html(sites, link_port)).into_response()
}

fn index_html(sites: &[(SiteInfo, String)], link_port: &str) -> String {
    let mut items = String::new();
    for (site, label) in sites {
        let updated = site
            .updated
            .map(|t| format!(" <small>({})</small>", t.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default();
        items.push_str(&format!(
            "<li><a href=\"http://{label}{port}/\">{origin}</a>{updated}</li>\n",
            label = escape_html(label),
            port = escape_html(link_port),
            origin = escape_html(&site.root.origin()),
        ));
    }
    if items.is_empty() {
        items.push_str("<li>Nothing mirrored yet.</li>\n");
    }
    format!(
        "<!DOCTYPE html>\n<html><head><title>Mirrored sites</title></head><body>\n\
         <h1>Mirrored sites</h1>\n<ul>\n{items}</ul>\n</body></html>\n"
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::normalize;

    #[test]
    fn replays_status_and_headers() {
        let target = normalize("http://example.com/").unwrap();
        let entry = StorageEntry::new(
            &target,
            404,
            vec![
                ("Content-Type".into(), "text/html".into()),
                ("Transfer-Encoding".into(), "chunked".into()),
                ("Content-Length".into(), "999".into()),
                ("Set-Cookie".into(), "a=1".into()),
                ("Set-Cookie".into(), "b=2".into()),
            ],
            b"gone".to_vec(),
        );

        let response = entry_response(entry);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn maps_errors_to_status() {
        assert_eq!(
            status_for(&AppError::invalid_url("x", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AppError::AmbiguousLabel("http.1.a".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AppError::NotFound("k".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AppError::collision("k", "other url")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AppError::Io(std::io::Error::other("disk"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn index_lists_sites_with_crawl_date() {
        let site = |url: &str, updated: Option<&str>| SiteInfo {
            root: normalize(url).unwrap(),
            updated: updated.map(|t| t.parse().unwrap()),
        };
        let sites = vec![
            (
                site("https://other.site.com:444/", Some("2024-03-05T07:08:09Z")),
                "https.other.site.com.444.my.archive.com".to_string(),
            ),
            (site("http://example.com/", None), "http.example.com.my.archive.com".to_string()),
        ];

        let page = index_html(&sites, ":8080");
        assert!(page.contains(
            "<a href=\"http://https.other.site.com.444.my.archive.com:8080/\">\
             https://other.site.com:444</a> <small>(2024-03-05 07:08 UTC)</small></li>"
        ));
        assert!(page.contains("http://example.com</a></li>"));
        assert!(index_html(&[], "").contains("Nothing mirrored yet."));
    }

    #[test]
    fn escapes_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
