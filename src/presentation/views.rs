use crate::application::content::{BlogPage, PostSummary};
use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::PageMarker;
use crate::application::seo::PageMeta;
use crate::domain::content::PostDetail;
use crate::domain::site::SiteProfile;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(site: &SiteProfile) -> Response {
    let chrome = LayoutChrome::for_site(site, PageMeta::not_found(site));
    let view = LayoutContext::new(chrome, ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavLinkView {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
    pub feed_href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
    pub canonical: String,
    pub image: Option<String>,
    pub og_type: String,
    pub published_time: Option<String>,
    pub json_ld: Option<String>,
    pub language: String,
    pub site_name: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: Vec<NavLinkView>,
    pub footer: FooterView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn for_site(site: &SiteProfile, meta: PageMeta) -> Self {
        let year = OffsetDateTime::now_utc().year();
        let owner = if site.author.is_empty() {
            site.title.as_str()
        } else {
            site.author.as_str()
        };
        Self {
            brand: BrandView {
                title: site.title.clone(),
                href: "/".to_string(),
            },
            navigation: vec![
                NavLinkView {
                    label: "Blog".to_string(),
                    href: "/blog".to_string(),
                },
                NavLinkView {
                    label: "Guestbook".to_string(),
                    href: "/guestbook".to_string(),
                },
            ],
            footer: FooterView {
                copy: format!("© {year} {owner}"),
                feed_href: "/feed.xml".to_string(),
            },
            meta: PageMetaView {
                title: meta.title,
                description: meta.description,
                canonical: meta.canonical,
                image: meta.image,
                og_type: meta.og_type.to_string(),
                published_time: meta.published_time,
                json_ld: meta.json_ld,
                language: site.language.clone(),
                site_name: site.title.clone(),
            },
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: Vec<NavLinkView>,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub href: String,
    pub title: String,
    pub description: String,
    pub iso_date: String,
    pub published: String,
    pub image: Option<String>,
    pub categories: Vec<String>,
    pub reading_time: u32,
    pub views: u64,
}

impl From<&PostSummary> for PostCard {
    fn from(summary: &PostSummary) -> Self {
        let item = &summary.item;
        Self {
            href: item.path(),
            title: item.title.clone(),
            description: item.description.clone(),
            iso_date: iso_date(item.published_at),
            published: human_date(item.published_at),
            image: item.main_image.clone(),
            categories: item.categories.clone(),
            reading_time: item.reading_time,
            views: summary.views,
        }
    }
}

/// One slot in the page-number strip. Ellipsis slots carry no link.
#[derive(Clone)]
pub struct PageLinkView {
    pub label: String,
    pub href: Option<String>,
    pub is_current: bool,
}

impl PageLinkView {
    pub fn is_ellipsis(&self) -> bool {
        self.href.is_none()
    }
}

#[derive(Clone)]
pub struct PaginationView {
    pub links: Vec<PageLinkView>,
    pub previous: Option<String>,
    pub next: Option<String>,
}

pub fn blog_page_href(page: u32) -> String {
    if page <= 1 {
        "/blog".to_string()
    } else {
        format!("/blog?page={page}")
    }
}

impl PaginationView {
    /// `None` when there is at most one page to show.
    pub fn from_page(page: &BlogPage) -> Option<Self> {
        let window = &page.window;
        if window.total_pages <= 1 {
            return None;
        }
        let links = page
            .numbers
            .iter()
            .map(|marker| match marker {
                PageMarker::Page(number) => PageLinkView {
                    label: number.to_string(),
                    href: Some(blog_page_href(*number)),
                    is_current: *number == window.current_page,
                },
                PageMarker::Ellipsis => PageLinkView {
                    label: "…".to_string(),
                    href: None,
                    is_current: false,
                },
            })
            .collect();
        Some(Self {
            links,
            previous: window
                .has_previous()
                .then(|| blog_page_href(window.current_page - 1)),
            next: window
                .has_next()
                .then(|| blog_page_href(window.current_page + 1)),
        })
    }
}

pub struct BlogIndexContext {
    pub posts: Vec<PostCard>,
    pub has_results: bool,
    pub total_items: u64,
    pub pagination: Option<PaginationView>,
}

impl From<&BlogPage> for BlogIndexContext {
    fn from(page: &BlogPage) -> Self {
        let posts: Vec<PostCard> = page.posts.iter().map(PostCard::from).collect();
        Self {
            has_results: !posts.is_empty(),
            posts,
            total_items: page.window.total_items,
            pagination: PaginationView::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "blog_index.html")]
pub struct BlogIndexTemplate {
    pub view: LayoutContext<BlogIndexContext>,
}

pub struct PostDetailContext {
    pub post_id: String,
    pub title: String,
    pub description: String,
    pub published: String,
    pub iso_date: String,
    pub image: Option<String>,
    pub categories: Vec<String>,
    pub reading_time: u32,
    pub views: u64,
    pub body_html: String,
}

impl PostDetailContext {
    pub fn new(post: PostDetail, views: u64) -> Self {
        let PostDetail { item, body_html } = post;
        Self {
            post_id: item.id,
            title: item.title,
            description: item.description,
            published: human_date(item.published_at),
            iso_date: iso_date(item.published_at),
            image: item.main_image,
            categories: item.categories,
            reading_time: item.reading_time,
            views,
            body_html,
        }
    }
}

#[derive(Template)]
#[template(path = "blog_post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub action_href: String,
    pub action_label: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            action_href: "/blog".to_string(),
            action_label: "Back to the blog".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

fn iso_date(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

fn human_date(at: OffsetDateTime) -> String {
    at.format(format_description!("[month repr:long] [day padding:none], [year]"))
        .unwrap_or_else(|_| at.date().to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::pagination::{compute_page_numbers, compute_page_window};
    use crate::domain::content::ContentItem;

    fn summary(slug: &str) -> PostSummary {
        PostSummary {
            item: ContentItem {
                id: format!("id-{slug}"),
                title: slug.to_uppercase(),
                description: String::new(),
                slug: slug.to_string(),
                published_at: datetime!(2024-03-05 10:00 UTC),
                main_image: None,
                categories: vec!["news".into()],
                reading_time: 4,
            },
            views: 7,
        }
    }

    fn page(current: u32, total_items: u64) -> BlogPage {
        let window = compute_page_window(current, total_items, 10);
        BlogPage {
            posts: vec![summary("a")],
            numbers: compute_page_numbers(window.current_page, window.total_pages),
            window,
        }
    }

    #[test]
    fn post_card_formats_dates() {
        let card = PostCard::from(&summary("launch"));
        assert_eq!(card.href, "/blog/launch");
        assert_eq!(card.published, "March 5, 2024");
        assert_eq!(card.iso_date, "2024-03-05T10:00:00Z");
        assert_eq!(card.views, 7);
    }

    #[test]
    fn single_page_has_no_pagination() {
        assert!(PaginationView::from_page(&page(1, 5)).is_none());
    }

    #[test]
    fn pagination_marks_current_and_neighbours() {
        let view = PaginationView::from_page(&page(1, 100)).expect("pagination");
        assert!(view.previous.is_none());
        assert_eq!(view.next.as_deref(), Some("/blog?page=2"));
        let first = view.links.first().expect("first link");
        assert_eq!(first.label, "1");
        assert!(first.is_current);
        assert!(view.links.iter().any(PageLinkView::is_ellipsis));
    }

    #[test]
    fn blog_index_renders_cards_and_meta() {
        let site = SiteProfile::new("https://shop.example", "Shop", "All things shop");
        let chrome = LayoutChrome::for_site(&site, PageMeta::blog_index(&site, 2));
        let view = LayoutContext::new(chrome, BlogIndexContext::from(&page(2, 30)));

        let html = BlogIndexTemplate { view }.render().expect("render");
        assert!(html.contains("<link rel=\"canonical\" href=\"https://shop.example/blog?page=2\""));
        assert!(html.contains("href=\"/blog/a\""));
        assert!(html.contains("aria-current=\"page\""));
    }

    #[test]
    fn not_found_response_carries_report() {
        let site = SiteProfile::new("https://shop.example", "Shop", "");
        let response = render_not_found_response(&site);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
