//! URLs of the remote repository that hosts the version descriptor and the
//! update files.

const VERSION_FILE: &str = "version.txt";

#[derive(Debug, Clone)]
pub struct RemoteRepo {
    base_url: String,
    proxy: String,
}

impl RemoteRepo {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            proxy: String::new(),
        }
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = proxy.into();
        self
    }

    /// URL of the two-line version descriptor.
    pub fn version_url(&self) -> String {
        self.file_url(VERSION_FILE)
    }

    /// URL of a single file of the update plan.
    pub fn file_url(&self, file: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        wrap_with_proxy(&self.proxy, &format!("{}/{}", base, file))
    }
}

/// Wrap a URL with the GitHub proxy prefix.
/// If proxy is empty, returns the original URL unchanged.
/// Proxy wraps the full original URL, e.g. `https://cdn.gh-proxy.org/https://raw.githubusercontent.com/...`.
pub fn wrap_with_proxy(proxy: &str, url: &str) -> String {
    if proxy.is_empty() {
        url.to_string()
    } else {
        let base = proxy.trim_end_matches('/');
        format!("{}/{}", base, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_with_or_without_trailing_slash() {
        let a = RemoteRepo::new("https://host/repo/");
        let b = RemoteRepo::new("https://host/repo");
        assert_eq!(a.file_url("ui.py"), "https://host/repo/ui.py");
        assert_eq!(b.file_url("ui.py"), "https://host/repo/ui.py");
        assert_eq!(a.version_url(), "https://host/repo/version.txt");
    }

    #[test]
    fn proxy_wraps_full_url() {
        let repo = RemoteRepo::new("https://raw.githubusercontent.com/o/r/main/")
            .with_proxy("https://cdn.gh-proxy.org/");
        assert_eq!(
            repo.version_url(),
            "https://cdn.gh-proxy.org/https://raw.githubusercontent.com/o/r/main/version.txt"
        );
    }
}
