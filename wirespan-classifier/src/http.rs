//! HTTP/1.x request-line and `Host:` header extraction.

use nom::bytes::complete::take_while;
use nom::character::complete::char;
use nom::IResult;

/// Effective region of a zero-padded capture buffer: everything before the
/// first NUL, or the full slice if none.
fn effective(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    &buf[..end]
}

fn request_line(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    let (input, method) = take_while(|c: u8| c != b' ' && c != b'\r' && c != b'\n')(input)?;
    let (input, _) = char(' ')(input)?;
    let (input, target) = take_while(|c: u8| c != b' ' && c != b'\r' && c != b'\n')(input)?;
    Ok((input, (method, target)))
}

/// Split a captured request buffer into `(method, target)`.
///
/// The method is everything before the first space; the target runs from
/// there to the next space, CR or LF. A buffer without a space yields two
/// empty strings. The query string is NOT stripped here; see
/// [`remove_query`].
pub fn parse_request_line(buf: &[u8]) -> (String, String) {
    match request_line(effective(buf)) {
        Ok((_, (method, target))) => (
            String::from_utf8_lossy(method).into_owned(),
            String::from_utf8_lossy(target).into_owned(),
        ),
        Err(_) => (String::new(), String::new()),
    }
}

/// Strip the query string from a URL path.
///
/// Deliberately uses a strict `idx > 0` check: a URL that *starts* with
/// `?` is malformed and is passed through untouched rather than truncated
/// to an empty path.
pub fn remove_query(url: &str) -> &str {
    match url.find('?') {
        Some(idx) if idx > 0 => &url[..idx],
        _ => url,
    }
}

/// Recover `host` and `port` from a `Host:` header inside the capture
/// buffer. Used when the kernel could not resolve the socket tuple (both
/// ports zero, e.g. the asynchronous SSL path).
///
/// The value runs to the next CR or the end of the buffer and must parse
/// as `host[:port]`; a bare hostname without a port separator is
/// rejected. A non-numeric port yields 0.
pub fn host_from_buf(buf: &[u8]) -> Option<(String, u16)> {
    let text = String::from_utf8_lossy(effective(buf));
    let idx = text.find("Host: ")?;
    let rest = &text[idx + "Host: ".len()..];
    let end = rest.find('\r').unwrap_or(rest.len());
    split_host_port(&rest[..end])
}

fn split_host_port(s: &str) -> Option<(String, u16)> {
    let (host, port) = s.rsplit_once(':')?;
    // Bare IPv6 without brackets is ambiguous ("too many colons").
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return None;
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = port.parse().unwrap_or(0);
    Some((host.to_string(), port))
}
