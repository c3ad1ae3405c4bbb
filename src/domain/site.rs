//! Public identity of the site, shared by feeds, sitemaps and page metadata.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    base_url: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub language: String,
    pub author: String,
}

impl SiteProfile {
    pub fn new(base_url: &str, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            title: title.into(),
            description: description.into(),
            image_url: None,
            language: "en-US".to_string(),
            author: String::new(),
        }
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a site path. `"/"` maps to the bare base URL.
    pub fn url(&self, path: &str) -> String {
        if path.is_empty() || path == "/" {
            return self.base_url.clone();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Primary language subtag, e.g. `en` for `en-US`.
    pub fn primary_language(&self) -> &str {
        self.language
            .split(['-', '_'])
            .next()
            .filter(|tag| !tag.is_empty())
            .unwrap_or("en")
    }
}
