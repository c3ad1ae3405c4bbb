use std::{sync::Arc, time::Instant};

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use metrics::histogram;
use serde::Deserialize;

use crate::{
    application::{
        content::{ContentError, ContentService},
        error::HttpError,
        seo::PageMeta,
        sitemap::SitemapService,
        syndication::SyndicationService,
    },
    domain::site::SiteProfile,
    infra::db::PostgresRepositories,
    presentation::views::{
        BlogIndexContext, BlogIndexTemplate, LayoutChrome, LayoutContext, PostDetailContext,
        PostTemplate, render_not_found_response, render_template_response,
    },
};

use super::{RouterState, db_health_response};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const DOCUMENT_CACHE_CONTROL: &str = "public, max-age=3600";

#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<ContentService>,
    pub syndication: Arc<SyndicationService>,
    pub sitemap: Arc<SitemapService>,
    pub site: Arc<SiteProfile>,
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_public_router() -> Router<RouterState> {
    Router::new()
        .route("/", get(index))
        .route("/blog", get(blog_index))
        .route("/blog/{slug}", get(post_detail))
        .route("/feed.xml", get(rss_feed))
        .route("/sitemap.xml", get(sitemap))
        .route("/sitemap-index.xml", get(sitemap_index))
        .route("/image-sitemap.xml", get(image_sitemap))
        .route("/news-sitemap.xml", get(news_sitemap))
        .route("/robots.txt", get(robots_txt))
        .route("/_health", get(health))
        .fallback(fallback)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// Anything that is not a positive integer reads as the first page.
    fn requested_page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1)
    }
}

async fn index() -> Redirect {
    Redirect::permanent("/blog")
}

async fn blog_index(State(state): State<HttpState>, Query(query): Query<PageQuery>) -> Response {
    let page = state.content.list_page(query.requested_page()).await;
    let meta = PageMeta::blog_index(&state.site, page.window.current_page);
    let view = LayoutContext::new(
        LayoutChrome::for_site(&state.site, meta),
        BlogIndexContext::from(&page),
    );
    render_template_response(BlogIndexTemplate { view }, StatusCode::OK)
}

async fn post_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let post = match state.content.post(&slug).await {
        Ok(post) => post,
        Err(ContentError::NotFound { .. }) => return render_not_found_response(&state.site),
        Err(err) => return HttpError::from(err).into_response(),
    };

    let views = state.content.record_view(&post.item.slug).await;
    let meta = PageMeta::post(&state.site, &post.item);
    let view = LayoutContext::new(
        LayoutChrome::for_site(&state.site, meta),
        PostDetailContext::new(post, views),
    );
    render_template_response(PostTemplate { view }, StatusCode::OK)
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(&state.site)
}

async fn rss_feed(State(state): State<HttpState>) -> Response {
    let started = Instant::now();
    let body = state.syndication.rss_feed().await;
    document_response("feed", started, body, XML_CONTENT_TYPE)
}

async fn sitemap(State(state): State<HttpState>) -> Response {
    let started = Instant::now();
    let body = state.sitemap.sitemap_xml().await;
    document_response("sitemap", started, body, XML_CONTENT_TYPE)
}

async fn sitemap_index(State(state): State<HttpState>) -> Response {
    let started = Instant::now();
    let body = state.sitemap.sitemap_index_xml();
    document_response("sitemap_index", started, body, XML_CONTENT_TYPE)
}

async fn image_sitemap(State(state): State<HttpState>) -> Response {
    let started = Instant::now();
    let body = state.sitemap.image_sitemap_xml().await;
    document_response("image_sitemap", started, body, XML_CONTENT_TYPE)
}

async fn news_sitemap(State(state): State<HttpState>) -> Response {
    let started = Instant::now();
    let body = state.sitemap.news_sitemap_xml().await;
    document_response("news_sitemap", started, body, XML_CONTENT_TYPE)
}

async fn robots_txt(State(state): State<HttpState>) -> Response {
    let started = Instant::now();
    let body = state.sitemap.robots_txt();
    document_response("robots", started, body, TEXT_CONTENT_TYPE)
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

fn document_response(
    document: &'static str,
    started: Instant,
    body: String,
    content_type: &'static str,
) -> Response {
    histogram!("vitrine_document_render_ms", "document" => document)
        .record(started.elapsed().as_secs_f64() * 1000.0);

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static(DOCUMENT_CACHE_CONTROL),
    );
    response
}
