//! [`ContentSource`] over a GROQ-style query endpoint.
//!
//! Every call is `GET <api_url>?query=<groq>&$param=<json>` answered with
//! `{ "result": ... }`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::repos::{ContentPage, ContentSource, RepoError};
use crate::domain::content::{ContentItem, PostDetail, SlugEntry, reading_time_minutes};

const PUBLISHED_POSTS: &str =
    r#"*[_type == "post" && defined(slug.current) && defined(publishedAt) && !(_id in path("drafts.**"))]"#;
const ITEM_PROJECTION: &str = r#"{
  "id": _id,
  title,
  "description": coalesce(description, ""),
  "slug": slug.current,
  publishedAt,
  "mainImage": mainImage.asset->url,
  "categories": coalesce(categories[]->title, []),
  "bodyText": pt::text(body)
}"#;

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CmsPost {
    #[serde(flatten)]
    item: ContentItem,
    #[serde(default)]
    body_text: Option<String>,
    #[serde(default)]
    body_html: Option<String>,
}

impl CmsPost {
    fn into_item(self) -> ContentItem {
        self.into_detail().item
    }

    fn into_detail(self) -> PostDetail {
        let mut item = self.item;
        if let Some(text) = self.body_text.as_deref() {
            item.reading_time = reading_time_minutes(text);
        }
        PostDetail {
            item,
            body_html: self.body_html.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct HttpContentSource {
    client: Client,
    api_url: Url,
    token: Option<String>,
}

impl HttpContentSource {
    pub fn new(api_url: Url, token: Option<String>, timeout: Duration) -> Result<Self, RepoError> {
        let client = Client::builder()
            .user_agent(concat!("vitrine/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(RepoError::from_upstream)?;
        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    fn query_url(&self, query: &str, params: &[(&str, serde_json::Value)]) -> Url {
        let mut url = self.api_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            pairs.append_pair("query", query);
            for (name, value) in params {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }
        url
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        params: &[(&str, serde_json::Value)],
    ) -> Result<T, RepoError> {
        let url = self.query_url(query, params);
        debug!(target = "infra::cms", path = url.path(), "querying content API");

        let mut request = self.client.get(url);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                RepoError::Timeout
            } else {
                RepoError::from_upstream(err)
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RepoError::Upstream(format!("status {status} body {text}")));
        }

        let body: QueryResponse<T> = response
            .json()
            .await
            .map_err(|err| RepoError::Decode(err.to_string()))?;
        Ok(body.result)
    }
}

fn list_query(projection: &str) -> String {
    format!("{PUBLISHED_POSTS} | order(publishedAt desc) [$start...$end] {projection}")
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn count_posts(&self) -> Result<u64, RepoError> {
        self.query(&format!("count({PUBLISHED_POSTS})"), &[]).await
    }

    async fn list_posts(&self, offset: u64, limit: u32) -> Result<ContentPage, RepoError> {
        let posts: Vec<CmsPost> = self
            .query(
                &list_query(ITEM_PROJECTION),
                &[
                    ("start", offset.into()),
                    ("end", (offset + u64::from(limit)).into()),
                ],
            )
            .await?;
        Ok(ContentPage {
            items: posts.into_iter().map(CmsPost::into_item).collect(),
        })
    }

    async fn post(&self, slug: &str) -> Result<Option<PostDetail>, RepoError> {
        let projection = ITEM_PROJECTION.replace(
            "\"bodyText\": pt::text(body)",
            "\"bodyText\": pt::text(body),\n  \"bodyHtml\": coalesce(bodyHtml, \"\")",
        );
        let query = format!("{PUBLISHED_POSTS}[slug.current == $slug][0] {projection}");
        let post: Option<CmsPost> = self.query(&query, &[("slug", slug.into())]).await?;
        Ok(post.map(CmsPost::into_detail))
    }

    async fn slugs(&self, limit: u32) -> Result<Vec<SlugEntry>, RepoError> {
        self.query(
            &list_query(r#"{ "slug": slug.current, "updatedAt": _updatedAt }"#),
            &[("start", 0.into()), ("end", limit.into())],
        )
        .await
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ContentItem>, RepoError> {
        let posts: Vec<CmsPost> = self
            .query(
                &list_query(ITEM_PROJECTION),
                &[("start", 0.into()), ("end", limit.into())],
            )
            .await?;
        Ok(posts.into_iter().map(CmsPost::into_item).collect())
    }
}
