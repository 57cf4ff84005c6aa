//! Image source classification.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use url::Url;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// What an `<img src>` turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedImage {
    /// Absolute http(s) URL, fetched at send time.
    RemoteUrl(Url),
    /// `data:image/...;base64,` payload.
    InlineBase64 {
        /// MIME subtype, e.g. `png`, `jpeg`, `svg+xml`.
        subtype: String,
        /// Decoded bytes.
        data: Vec<u8>,
    },
    /// A filesystem path; cannot be resolved when sending.
    LocalPath(String),
    /// Anything unusable.
    Malformed(&'static str),
}

impl ClassifiedImage {
    /// Returns true for sources that become MIME parts.
    #[must_use]
    pub const fn is_attachable(&self) -> bool {
        matches!(self, Self::RemoteUrl(_) | Self::InlineBase64 { .. })
    }
}

/// Classifies image sources according to site and upgrade settings.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    site_origin: Option<Url>,
    upgrade_http: bool,
}

impl Classifier {
    /// Creates a classifier.
    #[must_use]
    pub const fn new(site_origin: Option<Url>, upgrade_http: bool) -> Self {
        Self {
            site_origin,
            upgrade_http,
        }
    }

    /// Classifies a single `src` value (entities already decoded).
    ///
    /// Never fails: unusable input maps to [`ClassifiedImage::LocalPath`]
    /// or [`ClassifiedImage::Malformed`].
    #[must_use]
    pub fn classify(&self, source: &str) -> ClassifiedImage {
        let source = source.trim();
        if source.is_empty() {
            return ClassifiedImage::Malformed("empty source");
        }

        let lower = source.get(..8).unwrap_or(source).to_ascii_lowercase();
        if lower.starts_with("data:") {
            return classify_data_uri(source);
        }
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return self.remote(Url::parse(source));
        }
        if source.starts_with("//") {
            return self.remote(Url::parse(&format!("https:{source}")));
        }
        if source.starts_with('/') {
            return match &self.site_origin {
                Some(origin) => self.remote(origin.join(source)),
                None => ClassifiedImage::LocalPath(source.to_string()),
            };
        }
        if lower.starts_with("file:") || !has_scheme(source) {
            return ClassifiedImage::LocalPath(source.to_string());
        }
        ClassifiedImage::Malformed("unsupported scheme")
    }

    fn remote(&self, parsed: Result<Url, url::ParseError>) -> ClassifiedImage {
        let Ok(mut url) = parsed else {
            return ClassifiedImage::Malformed("invalid URL");
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
            return ClassifiedImage::Malformed("invalid URL");
        }
        if self.upgrade_http && url.scheme() == "http" && url.set_scheme("https").is_err() {
            return ClassifiedImage::Malformed("invalid URL");
        }
        ClassifiedImage::RemoteUrl(url)
    }
}

/// `scheme:` prefix per RFC 3986. A Windows drive letter (`C:\`) counts as
/// a path, not a scheme.
fn has_scheme(source: &str) -> bool {
    let Some(colon) = source.find(':') else {
        return false;
    };
    let scheme = &source[..colon];
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn classify_data_uri(source: &str) -> ClassifiedImage {
    let Some((meta, payload)) = source[5..].split_once(',') else {
        return ClassifiedImage::Malformed("data URI without payload");
    };

    let mut params = meta.split(';');
    let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
    let Some(subtype) = mime.strip_prefix("image/") else {
        return ClassifiedImage::Malformed("data URI is not an image");
    };
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return ClassifiedImage::Malformed("data URI is not base64");
    }
    let Some(subtype) = canonical_subtype(subtype) else {
        return ClassifiedImage::Malformed("invalid image subtype");
    };

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return ClassifiedImage::Malformed("empty base64 payload");
    }
    let decoded = STANDARD
        .decode(&compact)
        .or_else(|_| URL_SAFE.decode(&compact));
    match decoded {
        Ok(data) if !data.is_empty() => ClassifiedImage::InlineBase64 { subtype, data },
        _ => ClassifiedImage::Malformed("invalid base64 payload"),
    }
}

fn canonical_subtype(subtype: &str) -> Option<String> {
    let subtype = subtype.trim();
    if subtype.is_empty()
        || !subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some(if subtype == "jpg" { "jpeg" } else { subtype }.to_string())
}

/// File extension used for a MIME image subtype.
#[must_use]
pub fn extension_for(subtype: &str) -> &str {
    match subtype {
        "jpeg" | "pjpeg" => "jpg",
        "svg+xml" => "svg",
        "x-icon" | "vnd.microsoft.icon" => "ico",
        "tiff" => "tif",
        other => other,
    }
}

/// Guesses the MIME subtype of a remote image from its URL path.
#[must_use]
pub fn subtype_from_url(url: &Url) -> &'static str {
    let ext = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "png",
        Some("gif") => "gif",
        Some("webp") => "webp",
        Some("svg") => "svg+xml",
        Some("bmp") => "bmp",
        Some("ico") => "x-icon",
        Some("avif") => "avif",
        _ => "jpeg",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(Some(Url::parse("https://www.example.com").unwrap()), true)
    }

    #[test]
    fn test_https_url() {
        let c = classifier().classify("https://cdn.example.com/a.png?x=1");
        assert_eq!(
            c,
            ClassifiedImage::RemoteUrl(Url::parse("https://cdn.example.com/a.png?x=1").unwrap())
        );
    }

    #[test]
    fn test_http_upgraded() {
        let c = classifier().classify("http://example.com/x.jpg");
        assert_eq!(
            c,
            ClassifiedImage::RemoteUrl(Url::parse("https://example.com/x.jpg").unwrap())
        );
    }

    #[test]
    fn test_http_kept_when_upgrade_disabled() {
        let c = Classifier::new(None, false).classify("http://example.com/x.jpg");
        assert!(matches!(c, ClassifiedImage::RemoteUrl(u) if u.scheme() == "http"));
    }

    #[test]
    fn test_protocol_relative() {
        let c = classifier().classify("//cdn.example.com/x.gif");
        assert!(matches!(c, ClassifiedImage::RemoteUrl(u) if u.as_str() == "https://cdn.example.com/x.gif"));
    }

    #[test]
    fn test_site_relative_resolves_against_origin() {
        let c = classifier().classify("/images/logo.png");
        assert_eq!(
            c,
            ClassifiedImage::RemoteUrl(Url::parse("https://www.example.com/images/logo.png").unwrap())
        );
    }

    #[test]
    fn test_site_relative_without_origin_is_local() {
        let c = Classifier::new(None, true).classify("/images/logo.png");
        assert_eq!(c, ClassifiedImage::LocalPath("/images/logo.png".into()));
    }

    #[test]
    fn test_data_uri_png() {
        let c = classifier().classify("data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(
            c,
            ClassifiedImage::InlineBase64 {
                subtype: "png".into(),
                data: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
            }
        );
    }

    #[test]
    fn test_data_uri_variants() {
        let c = classifier().classify("DATA:image/JPG;charset=x;BASE64,iVBO Rw0K\nGgo");
        assert!(matches!(c, ClassifiedImage::InlineBase64 { ref subtype, .. } if subtype == "jpeg"));

        let c = classifier().classify("data:image/svg+xml;base64,PHN2Zz4-");
        assert!(matches!(c, ClassifiedImage::InlineBase64 { ref subtype, .. } if subtype == "svg+xml"));
    }

    #[test]
    fn test_data_uri_malformed() {
        let c = classifier();
        assert!(matches!(c.classify("data:image/png;base64,"), ClassifiedImage::Malformed(_)));
        assert!(matches!(c.classify("data:image/png;base64,!!!"), ClassifiedImage::Malformed(_)));
        assert!(matches!(c.classify("data:image/png,rawbytes"), ClassifiedImage::Malformed(_)));
        assert!(matches!(c.classify("data:text/html;base64,PGI+"), ClassifiedImage::Malformed(_)));
        assert!(matches!(c.classify("data:image/png;base64"), ClassifiedImage::Malformed(_)));
    }

    #[test]
    fn test_local_paths() {
        let c = classifier();
        assert!(matches!(c.classify("file:///home/me/a.png"), ClassifiedImage::LocalPath(_)));
        assert!(matches!(c.classify("images/a.png"), ClassifiedImage::LocalPath(_)));
        assert!(matches!(c.classify("C:\\pics\\a.png"), ClassifiedImage::LocalPath(_)));
    }

    #[test]
    fn test_unsupported() {
        let c = classifier();
        assert!(matches!(c.classify(""), ClassifiedImage::Malformed(_)));
        assert!(matches!(c.classify("javascript:alert(1)"), ClassifiedImage::Malformed(_)));
        assert!(matches!(c.classify("cid:img1@x"), ClassifiedImage::Malformed(_)));
        assert!(matches!(c.classify("https://"), ClassifiedImage::Malformed(_)));
    }

    #[test]
    fn test_extension_and_subtype_helpers() {
        assert_eq!(extension_for("jpeg"), "jpg");
        assert_eq!(extension_for("svg+xml"), "svg");
        assert_eq!(extension_for("png"), "png");
        let url = Url::parse("https://x.test/a/b.PNG?v=2").unwrap();
        assert_eq!(subtype_from_url(&url), "png");
        let url = Url::parse("https://x.test/pixel").unwrap();
        assert_eq!(subtype_from_url(&url), "jpeg");
    }
}
