//! Public URL paths for blogs, categories, and posts.

use url::Url;

use crate::models::{Blog, BlogPost, Category};

/// Path segment standing in for "no category" in post URLs.
pub const NO_CATEGORY: &str = "no-category";

/// Builds site-relative paths under the configured channel.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    channel: String,
}

impl UrlBuilder {
    /// `channel` is the section the blogs are mounted under; surrounding
    /// slashes are ignored.
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.trim_matches('/').to_string(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// `/{channel}/`
    pub fn channel_url(&self) -> String {
        format!("/{}/", self.channel)
    }

    /// `/{channel}/{blog}/`
    pub fn blog_url(&self, blog: &Blog) -> String {
        format!("/{}/{}/", self.channel, blog.slug)
    }

    /// `/{channel}/{blog}/{long_slug}/`
    pub fn category_url(&self, blog: &Blog, category: &Category) -> String {
        format!("/{}/{}/{}/", self.channel, blog.slug, category.long_slug)
    }

    /// `/{channel}/{blog}/{long_slug | no-category}/{post}.html`
    pub fn post_path(&self, blog_slug: &str, long_slug: Option<&str>, post_slug: &str) -> String {
        format!(
            "/{}/{}/{}/{}.html",
            self.channel,
            blog_slug,
            long_slug.unwrap_or(NO_CATEGORY),
            post_slug
        )
    }

    pub fn post_url(&self, blog: &Blog, category: Option<&Category>, post: &BlogPost) -> String {
        self.post_path(
            &blog.slug,
            category.map(|c| c.long_slug.as_str()),
            &post.slug,
        )
    }

    /// `/{channel}/{blog}/authors/`
    pub fn authors_url(&self, blog: &Blog) -> String {
        format!("/{}/{}/authors/", self.channel, blog.slug)
    }

    /// `/{channel}/{blog}/rss/`
    pub fn feed_url(&self, blog: &Blog) -> String {
        format!("/{}/{}/rss/", self.channel, blog.slug)
    }
}

/// Absolute URL for a site-relative `path` on `site_domain`.
pub fn absolute_url(site_domain: &str, path: &str) -> String {
    format!("http://{site_domain}{path}")
}

/// Enclosure URL for a feed item: absolute image URLs are kept, relative ones
/// are resolved against the site.
pub fn enclosure_url(site_domain: &str, image: &str) -> String {
    match Url::parse(&absolute_url(site_domain, "/")).and_then(|base| base.join(image)) {
        Ok(url) => url.into(),
        Err(_) => absolute_url(site_domain, &format!("/{}", image.trim_start_matches('/'))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn post_path_with_category() {
        let urls = UrlBuilder::new("blog");
        assert_eq!(
            urls.post_path("tech", Some("news"), "launch"),
            "/blog/tech/news/launch.html"
        );
        assert_eq!(
            urls.post_path("tech", Some("news/ai"), "launch"),
            "/blog/tech/news/ai/launch.html"
        );
    }

    #[test]
    fn post_path_without_category() {
        let urls = UrlBuilder::new("/blog/");
        assert_eq!(
            urls.post_path("tech", None, "launch"),
            "/blog/tech/no-category/launch.html"
        );
    }

    #[test]
    fn enclosure_urls() {
        assert_eq!(
            enclosure_url("example.com", "https://cdn.example.net/a.jpg"),
            "https://cdn.example.net/a.jpg"
        );
        assert_eq!(
            enclosure_url("example.com", "/media/a.jpg"),
            "http://example.com/media/a.jpg"
        );
        assert_eq!(
            enclosure_url("example.com", "media/a.jpg"),
            "http://example.com/media/a.jpg"
        );
        assert_eq!(
            enclosure_url("example.com", "//cdn.example.net/a.jpg"),
            "http://cdn.example.net/a.jpg"
        );
    }
}
