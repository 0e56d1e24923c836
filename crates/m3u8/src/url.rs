//! Reference resolution for segment, key and variant URLs.

/// Resolve a playlist reference against the URL the playlist was fetched
/// from.
///
/// - A reference that already carries an `http://` or `https://` scheme is
///   returned unchanged.
/// - A reference starting with `/` is joined to the `scheme://host` origin
///   of `base_url`.
/// - Anything else is joined to the directory of `base_url`, everything up
///   to and including its final `/`.
///
/// `..` segments are not normalized. The function is pure and total; a
/// `base_url` without a scheme yields a syntactically malformed result
/// rather than an error.
pub fn resolve(reference: &str, base_url: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }

    if reference.starts_with('/') {
        let origin = match base_url.find("://") {
            Some(scheme_end) => {
                let host_start = scheme_end + 3;
                match base_url[host_start..].find('/') {
                    Some(path_start) => &base_url[..host_start + path_start],
                    None => base_url,
                }
            }
            // Scheme-less base, keep whatever precedes the first slash.
            None => match base_url.find('/') {
                Some(i) => &base_url[..i],
                None => base_url,
            },
        };
        return format!("{origin}{reference}");
    }

    match base_url.rfind('/') {
        Some(last_slash) => format!("{}{}", &base_url[..=last_slash], reference),
        None => reference.to_string(),
    }
}
