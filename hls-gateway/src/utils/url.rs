//! Source URL and path-component helpers.

/// Checks that a transcoder source is something we are willing to hand to ffmpeg.
///
/// Accepted forms are `rtsp://host/...` (a host is required), `file://...`,
/// and absolute filesystem paths. Anything else is rejected with a message
/// suitable for the client. The string is checked exactly as it will be
/// passed to the transcoder; callers trim user input first.
pub fn validate_source_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err("RTSP URL is required".to_string());
    }

    if url.starts_with("file://") || url.starts_with('/') {
        return Ok(());
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(
            "Invalid URL scheme. Must start with rtsp:// or file:// (or use absolute path for local files)"
                .to_string(),
        );
    };

    if !scheme.eq_ignore_ascii_case("rtsp") {
        return Err(
            "Invalid URL scheme. Must start with rtsp:// or file:// (or use absolute path for local files)"
                .to_string(),
        );
    }

    match extract_authority(rest) {
        Some(_) => Ok(()),
        None => Err("URL must contain a network location".to_string()),
    }
}

/// Extracts the `host[:port]` part following the scheme separator.
fn extract_authority(rest: &str) -> Option<&str> {
    // host[:port] is until first '/', '?', or '#'.
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let mut host_port = &rest[..end];

    // Strip potential userinfo (user:pass@host).
    if let Some(at) = host_port.rfind('@') {
        host_port = &host_port[at + 1..];
    }

    if host_port.is_empty() {
        None
    } else {
        Some(host_port)
    }
}

/// Whether `name` can be used as a single path component under the artifact root.
///
/// Rejects empty names, `.`/`..`, and anything containing a path separator or NUL.
pub fn is_safe_path_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
