//! User defined query parameters appended to object URIs

/// Query parameters a caller may attach to downloads and completed uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserParam {
    /// Server-side thumbnail of an image object
    Thumb { width: u32, height: u32 },
    /// Expire timestamp in milliseconds
    Expires(i64),
    ResponseContentType,
    ResponseExpires,
    ResponseCacheControl,
    ResponseContentEncoding,
    /// Arbitrary key/value pairs, `None` values render as bare flags
    Custom(Vec<(String, Option<String>)>),
}

impl UserParam {
    pub fn thumb(width: u32, height: u32) -> Self {
        UserParam::Thumb { width, height }
    }

    pub fn custom(key: impl Into<String>, value: impl Into<String>) -> Self {
        UserParam::Custom(vec![(key.into(), Some(value.into()))])
    }

    pub fn pairs(&self) -> Vec<(String, Option<String>)> {
        match self {
            UserParam::Thumb { width, height } => vec![
                ("thumb".to_string(), Some("1".to_string())),
                ("w".to_string(), Some(width.to_string())),
                ("h".to_string(), Some(height.to_string())),
            ],
            UserParam::Expires(ms) => vec![("expires".to_string(), Some(ms.to_string()))],
            UserParam::ResponseContentType => flag("response-content-type"),
            UserParam::ResponseExpires => flag("response-expires"),
            UserParam::ResponseCacheControl => flag("response-cache-control"),
            UserParam::ResponseContentEncoding => flag("response-content-encoding"),
            UserParam::Custom(pairs) => pairs.clone(),
        }
    }

    /// Render as `k=v&flag`
    pub fn to_query(&self) -> String {
        self.pairs()
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => format!("{}={}", key, value),
                None => key,
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Renditions computed by the store are not byte-stable between requests
    pub fn is_derived_rendition(&self) -> bool {
        matches!(self, UserParam::Thumb { .. })
    }
}

fn flag(key: &str) -> Vec<(String, Option<String>)> {
    vec![(key.to_string(), None)]
}

pub(crate) fn is_derived_rendition(params: &[UserParam]) -> bool {
    params.iter().any(UserParam::is_derived_rendition)
}

/// Append each parameter using `?` for the first and `&` afterwards
pub(crate) fn append_params(uri: &str, params: &[UserParam]) -> String {
    let mut uri = uri.to_string();
    for param in params {
        let query = param.to_query();
        if query.is_empty() {
            continue;
        }
        uri.push(if uri.contains('?') { '&' } else { '?' });
        uri.push_str(&query);
    }
    uri
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_is_the_only_derived_rendition() {
        assert!(UserParam::thumb(64, 48).is_derived_rendition());
        assert!(!UserParam::Expires(1).is_derived_rendition());
        assert!(!UserParam::custom("thumb", "1").is_derived_rendition());
        assert!(is_derived_rendition(&[
            UserParam::ResponseContentType,
            UserParam::thumb(1, 1)
        ]));
    }

    #[test]
    fn renders_query_strings() {
        assert_eq!(UserParam::thumb(64, 48).to_query(), "thumb=1&w=64&h=48");
        assert_eq!(UserParam::ResponseCacheControl.to_query(), "response-cache-control");
        assert_eq!(
            append_params(
                "http://h/b/o",
                &[UserParam::Expires(1000), UserParam::ResponseExpires]
            ),
            "http://h/b/o?expires=1000&response-expires"
        );
        assert_eq!(
            append_params("http://h/b/o?uploadId=7", &[UserParam::custom("k", "v")]),
            "http://h/b/o?uploadId=7&k=v"
        );
    }
}
