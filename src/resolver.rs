//! Widget-relative path resolution

use crate::{Error, Result};
use url::Url;

/// Maps a widget-relative path (e.g. `footer/manifest.json`) to a fetchable URL
pub trait PathResolver: Send + Sync {
    fn to_url(&self, relative: &str) -> String;
}

impl<F> PathResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn to_url(&self, relative: &str) -> String {
        self(relative)
    }
}

/// Resolves paths against a base URL (`http(s)://` or `file://`)
#[derive(Debug, Clone)]
pub struct BaseUrlResolver {
    base: Url,
}

impl BaseUrlResolver {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base).map_err(|e| Error::ConfigError(format!("invalid base URL '{}': {}", base, e)))?;
        // Without a trailing slash `join` would replace the last segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    /// Base rooted at a local directory
    pub fn from_directory(dir: &std::path::Path) -> Result<Self> {
        let base = Url::from_directory_path(dir)
            .map_err(|_| Error::ConfigError(format!("not an absolute directory: {}", dir.display())))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl PathResolver for BaseUrlResolver {
    fn to_url(&self, relative: &str) -> String {
        self.base
            .join(relative)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base, relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_onto_base_directory() {
        let r = BaseUrlResolver::new("http://localhost:8080/node_modules/oae-core").unwrap();
        assert_eq!(r.to_url("footer/manifest.json"), "http://localhost:8080/node_modules/oae-core/footer/manifest.json");
        assert_eq!(r.to_url("footer/css/footer.css"), "http://localhost:8080/node_modules/oae-core/footer/css/footer.css");
    }

    #[test]
    fn rejects_garbage_base() {
        assert!(matches!(BaseUrlResolver::new("not a url"), Err(Error::ConfigError(_))));
    }

    #[test]
    fn closures_resolve() {
        let r = |p: &str| format!("/widgets/{}", p);
        assert_eq!(PathResolver::to_url(&r, "x/manifest.json"), "/widgets/x/manifest.json");
    }
}
