#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response};
use time::OffsetDateTime;
use time::macros::datetime;
use tower::ServiceExt;

use vitrine::application::cache_aside::CacheAside;
use vitrine::application::comments::CommentsService;
use vitrine::application::content::ContentService;
use vitrine::application::gateways::Viewer;
use vitrine::application::guestbook::GuestbookService;
use vitrine::application::repos::{ContentPage, ContentSource, RepoError};
use vitrine::application::sitemap::{RobotsRules, SitemapService};
use vitrine::application::syndication::SyndicationService;
use vitrine::domain::content::{ContentItem, PostDetail, SlugEntry};
use vitrine::domain::site::SiteProfile;
use vitrine::infra::http::{ApiState, HttpState, RouterState, build_router};
use vitrine::infra::mail::LogMailer;
use vitrine::infra::memory::{
    MemoryCommentsRepo, MemoryContentSource, MemoryGuestbookRepo, MemoryKvStore,
    StaticAuthenticator,
};
use vitrine::infra::rate_limit::SlidingWindowLimiter;
use vitrine_api_types::CommentRecord;

pub const SITE_URL: &str = "https://shop.example";
pub const SESSION_TOKEN: &str = "session-token";

/// Content source whose every call fails, as when the CMS is unreachable.
pub struct UnreachableContent;

#[async_trait]
impl ContentSource for UnreachableContent {
    async fn count_posts(&self) -> Result<u64, RepoError> {
        Err(RepoError::from_upstream("connection refused"))
    }

    async fn list_posts(&self, _offset: u64, _limit: u32) -> Result<ContentPage, RepoError> {
        Err(RepoError::from_upstream("connection refused"))
    }

    async fn post(&self, _slug: &str) -> Result<Option<PostDetail>, RepoError> {
        Err(RepoError::from_upstream("connection refused"))
    }

    async fn slugs(&self, _limit: u32) -> Result<Vec<SlugEntry>, RepoError> {
        Err(RepoError::from_upstream("connection refused"))
    }

    async fn recent(&self, _limit: u32) -> Result<Vec<ContentItem>, RepoError> {
        Err(RepoError::from_upstream("connection refused"))
    }
}

pub struct TestApp {
    pub router: Router,
    pub guestbook_repo: Arc<MemoryGuestbookRepo>,
}

pub struct TestAppBuilder {
    content: Arc<dyn ContentSource>,
    comments: Vec<CommentRecord>,
    page_size: u32,
    write_limit: u32,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            content: Arc::new(MemoryContentSource::new(sample_posts(3))),
            comments: Vec::new(),
            page_size: 10,
            write_limit: 5,
        }
    }
}

impl TestAppBuilder {
    pub fn content(mut self, content: Arc<dyn ContentSource>) -> Self {
        self.content = content;
        self
    }

    pub fn posts(self, posts: Vec<PostDetail>) -> Self {
        self.content(Arc::new(MemoryContentSource::new(posts)))
    }

    pub fn comments(mut self, comments: Vec<CommentRecord>) -> Self {
        self.comments = comments;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn write_limit(mut self, write_limit: u32) -> Self {
        self.write_limit = write_limit;
        self
    }

    pub fn build(self) -> TestApp {
        let site = Arc::new(
            SiteProfile::new(SITE_URL, "Shop", "Everything for the shop")
                .with_author("Shop Team"),
        );
        let kv = Arc::new(MemoryKvStore::default());
        let cache = CacheAside::new(kv.clone());
        let guestbook_repo = Arc::new(MemoryGuestbookRepo::default());
        let window = Duration::from_secs(60);

        let guestbook = GuestbookService::new(
            guestbook_repo.clone(),
            Arc::new(SlidingWindowLimiter::new(window, 100)),
            Arc::new(SlidingWindowLimiter::new(window, self.write_limit)),
            Arc::new(LogMailer),
            None,
            "test-salt",
        );
        let authenticator =
            StaticAuthenticator::default().with_session(SESSION_TOKEN, signed_in_viewer());

        let state = RouterState {
            http: HttpState {
                content: Arc::new(ContentService::new(
                    self.content.clone(),
                    kv.clone(),
                    self.page_size,
                )),
                syndication: Arc::new(SyndicationService::new(
                    self.content.clone(),
                    cache.clone(),
                    site.clone(),
                    20,
                    3600,
                )),
                sitemap: Arc::new(SitemapService::new(
                    self.content,
                    cache,
                    site.clone(),
                    RobotsRules::default(),
                    1000,
                    3600,
                )),
                site,
                db: None,
            },
            api: ApiState {
                guestbook: Arc::new(guestbook),
                comments: Arc::new(CommentsService::new(Arc::new(MemoryCommentsRepo::new(
                    self.comments,
                )))),
                authenticator: Arc::new(authenticator),
            },
        };

        TestApp {
            router: build_router(state),
            guestbook_repo,
        }
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).expect("request"))
            .await
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn signed_in_viewer() -> Viewer {
    Viewer {
        id: "user-1".into(),
        name: "Ada Lovelace".into(),
        email: Some("ada@example.com".into()),
        image: Some("https://cdn.example/ada.png".into()),
    }
}

pub fn post(index: usize, published_at: OffsetDateTime) -> PostDetail {
    PostDetail {
        item: ContentItem {
            id: format!("post-id-{index}"),
            title: format!("Post number {index}"),
            description: format!("Summary of post {index}"),
            slug: format!("post-{index}"),
            published_at,
            main_image: (index % 2 == 0).then(|| format!("https://cdn.example/{index}.png")),
            categories: vec!["news".into()],
            reading_time: 2,
        },
        body_html: format!("<p>Body of post {index}</p>"),
    }
}

/// `count` posts published one day apart, starting 2024-01-01.
pub fn sample_posts(count: usize) -> Vec<PostDetail> {
    (0..count)
        .map(|index| {
            post(
                index,
                datetime!(2024-01-01 12:00 UTC) + time::Duration::days(index as i64),
            )
        })
        .collect()
}
