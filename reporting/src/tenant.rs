use crate::config::ReportingConfig;
use crate::event::RequestMeta;

/// Query parameter checked first when resolving a board id.
pub const BOARD_ID_QUERY_PARAM: &str = "boardId";

/// Header checked second when resolving a board id.
pub const BOARD_ID_HEADER: &str = "x-board-id";

/// Marker preceding an embedded board id in a host name or endpoint URL,
/// e.g. `webapi0123456789abcdef01234567.up.example.com`.
const HOST_MARKER: &str = "webapi";

/// Board ids embedded after the marker are exactly 24 hex digits.
const BOARD_ID_LEN: usize = 24;

/// Resolves the board id for a request, checking sources in strict priority
/// order and stopping at the first match:
///
/// 1. the `boardId` query parameter,
/// 2. the `X-Board-Id` header,
/// 3. the statically configured board id,
/// 4. a `webapi` marker followed by 24 hex digits in the request host,
/// 5. the same pattern in the configured reporting endpoint URL.
///
/// Pure function of its inputs; returns `None` when no source matches.
pub fn resolve(meta: &RequestMeta, config: &ReportingConfig) -> Option<String> {
    if let Some(query) = meta.query.as_deref()
        && let Some(id) = query_param(query, BOARD_ID_QUERY_PARAM).filter(|v| !v.is_empty())
    {
        return Some(id);
    }

    if let Some(id) = meta.board_id_header.as_deref().filter(|v| !v.is_empty()) {
        return Some(id.to_string());
    }

    if let Some(id) = config.board_id.as_deref() {
        return Some(id.to_string());
    }

    if let Some(host) = meta.host.as_deref()
        && let Some(id) = hex_after_marker(host)
    {
        return Some(id);
    }

    if let Some(endpoint) = &config.endpoint_url
        && let Some(id) = hex_after_marker(endpoint.as_str())
    {
        return Some(id);
    }

    None
}

/// Finds the first case-insensitive occurrence of the marker and returns the
/// 24 characters immediately following it, provided all of them are hex
/// digits. Only the first occurrence is considered; case is preserved from
/// the input.
fn hex_after_marker(haystack: &str) -> Option<String> {
    let idx = haystack.to_ascii_lowercase().find(HOST_MARKER)?;
    let rest = &haystack[idx + HOST_MARKER.len()..];
    let candidate = rest.get(..BOARD_ID_LEN)?;
    candidate
        .bytes()
        .all(|b| b.is_ascii_hexdigit())
        .then(|| candidate.to_string())
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
