use url::Url;

/// Returns the region when `url` is a signed-in console page: `https`, the
/// console host, and a non-empty `region` query parameter.
pub fn region_from_login_url(url: &str, console_host: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    if !parsed
        .host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case(console_host))
    {
        return None;
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "region")
        .map(|(_, value)| value.trim().to_string())
        .filter(|region| !region.is_empty())
}
