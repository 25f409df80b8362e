use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// URL fragments that identify stand-in assets rather than story media.
static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(placeholder|default_avatar|anonymous_profile|profile_pic|blank\.(?:png|jpe?g|gif)|spacer\.|/1x1\.)")
        .expect("placeholder pattern")
});

/// Validity predicate for media URLs: absolute http(s), and not a known
/// placeholder or avatar asset.
pub fn media_url_valid(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|_| format!("not an absolute URL: {raw}"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme: {other}")),
    }
    if url.host_str().is_none() {
        return Err("missing host".into());
    }
    if PLACEHOLDER_PATTERN.is_match(raw) {
        return Err("matches a placeholder/avatar pattern".into());
    }
    Ok(())
}

/// Best-effort media kind from a URL path.
pub(crate) fn looks_like_video(url: &str) -> bool {
    let path = url.split('?').next().unwrap_or(url);
    path.ends_with(".mp4") || path.ends_with(".webm") || path.ends_with(".m3u8")
}

/// True when the URL path carries a media file extension at all.
pub(crate) fn looks_like_media(url: &str) -> bool {
    static MEDIA_EXT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\.(mp4|webm|m3u8|jpe?g|png|webp|heic)(\?|$)").expect("media ext"));
    MEDIA_EXT.is_match(url)
}
