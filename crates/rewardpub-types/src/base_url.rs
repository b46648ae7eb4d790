use url::Url;

/// Base URLs are joined with relative paths, which replaces the last segment unless
/// the path ends in `/`
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
