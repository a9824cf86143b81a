use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde_json::{json, Value};

use super::{
    media_page_api_response::{MediaNode, MediaPage, PageData},
    Media,
};
use crate::{
    config_utils::Settings,
    error::{ConfigError, QueryError},
    graphql_utils::{graphql_error, post_graphql, GraphqlResponse, RequestThrottle},
    pagination_utils::{
        pagination_controller::QueryExecutor, Continuation, Page, PaginationArgs, QueryArgs,
        QueryDescriptor, QueryVariables, SearchTarget,
    },
};

pub const MEDIA_PAGE: QueryDescriptor = QueryDescriptor {
    name: "MediaPage",
    document: "query MediaPage($perPage: Int, $page: Int, $search: String)
    {
        Page(perPage: $perPage, page: $page)
        {
            media(search: $search)
            {
                id
                siteUrl
                title
                {
                    english
                    native
                    romaji
                }
            }
            pageInfo
            {
                currentPage
                hasNextPage
                total
            }
        }
    }",
};

/// AniList pages are numbered from 1.
const FIRST_PAGE: u32 = 1;

fn get_requests_headers(settings: &Settings) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("application/json"));
    headers.insert(
        "user-agent",
        HeaderValue::from_str(&settings.user_agent)
            .map_err(|_| ConfigError::InvalidHeader("user-agent".to_owned()))?,
    );
    Ok(headers)
}

/// Builds the graphql `variables` object. AniList pages by number, cursors
/// are refused.
pub fn encode_variables(variables: &QueryVariables) -> Result<Value, QueryError> {
    let page = match &variables.pagination {
        PaginationArgs::Start => FIRST_PAGE,
        PaginationArgs::Page(page) => *page,
        PaginationArgs::After(cursor) => {
            return Err(QueryError::Validation(format!(
                "AniList pages can't follow a cursor (got {cursor})"
            )))
        }
    };
    let args = &variables.args;
    let SearchTarget::Media { search } = &args.target else {
        return Err(QueryError::Validation(
            "only media lists are served by AniList".to_owned(),
        ));
    };
    // null lists everything
    let search = Some(search.trim()).filter(|search| !search.is_empty());

    Ok(json!({
        "perPage": args.page_size,
        "page": page,
        "search": search,
    }))
}

impl From<MediaNode> for Media {
    fn from(node: MediaNode) -> Self {
        let (title_english, title_native, title_romaji) = match node.title {
            Some(title) => (title.english, title.native, title.romaji),
            None => (None, None, None),
        };
        Media {
            id: node.id,
            site_url: node.site_url,
            title_english,
            title_native,
            title_romaji,
        }
    }
}

fn media_page_to_page(media_page: MediaPage) -> Page<Media> {
    let total_count = media_page.page_info.as_ref().and_then(|info| info.total);
    Page {
        items: media_page
            .media
            .into_iter()
            .flatten()
            .map(Media::from)
            .collect(),
        continuation: media_page.page_info.map(|page_info| Continuation::Offset {
            next_page: page_info.current_page.saturating_add(1),
            has_more: page_info.has_next_page,
        }),
        total_count,
    }
}

pub(crate) fn parse_media_page(body: &str) -> Result<Page<Media>, QueryError> {
    let response: GraphqlResponse<PageData> = serde_json::from_str(body)?;
    let media_page = response
        .data
        .and_then(|data| data.page)
        .ok_or_else(|| graphql_error(&response.errors, "Page"))?;
    Ok(media_page_to_page(media_page))
}

/// Lists AniList media through its graphql api, one numbered page at a time.
pub struct AnilistExecutor {
    client: Client,
    endpoint: String,
    headers: HeaderMap,
    throttle: RequestThrottle,
}

impl AnilistExecutor {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: &Settings) -> Result<Self, ConfigError> {
        Ok(AnilistExecutor {
            client,
            endpoint: settings.anilist_endpoint.to_owned(),
            headers: get_requests_headers(settings)?,
            throttle: RequestThrottle::new(settings.min_request_interval_ms),
        })
    }
}

#[async_trait]
impl QueryExecutor for AnilistExecutor {
    type Item = Media;

    fn describe(&self, _args: &QueryArgs) -> QueryDescriptor {
        MEDIA_PAGE
    }

    async fn execute(
        &self,
        query: &QueryDescriptor,
        variables: &QueryVariables,
    ) -> Result<Page<Media>, QueryError> {
        let response_body = post_graphql(
            &self.client,
            &self.endpoint,
            &self.headers,
            &self.throttle,
            query,
            encode_variables(variables)?,
        )
        .await?;
        parse_media_page(&response_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_one_and_blank_search_is_null() {
        let variables = QueryVariables {
            args: QueryArgs::media("  ").with_page_size(2),
            pagination: PaginationArgs::Start,
        };
        assert_eq!(
            encode_variables(&variables).unwrap(),
            json!({"perPage": 2, "page": 1, "search": null})
        );

        let variables = QueryVariables {
            args: QueryArgs::media(" frieren "),
            pagination: PaginationArgs::Page(4),
        };
        assert_eq!(
            encode_variables(&variables).unwrap(),
            json!({"perPage": 10, "page": 4, "search": "frieren"})
        );
    }

    #[test]
    fn cursors_and_repository_targets_are_refused() {
        let cursor = QueryVariables {
            args: QueryArgs::media("frieren"),
            pagination: PaginationArgs::After("Y3Vyc29yOjI=".into()),
        };
        assert!(encode_variables(&cursor).unwrap_err().is_validation());

        let repositories = QueryVariables {
            args: QueryArgs::repositories("tokio"),
            pagination: PaginationArgs::Start,
        };
        assert!(encode_variables(&repositories).unwrap_err().is_validation());
    }

    #[test]
    fn media_page_continues_from_the_current_page() {
        let body = r#"{"data": {"Page": {
            "media": [
                {"id": 1, "siteUrl": "https://anilist.co/anime/1", "title": {"english": "Cowboy Bebop", "native": "カウボーイビバップ", "romaji": "Cowboy Bebop"}},
                null,
                {"id": 5, "siteUrl": null, "title": null}
            ],
            "pageInfo": {"currentPage": 3, "hasNextPage": true, "total": 5000}
        }}}"#;
        let page = parse_media_page(body).unwrap();
        let ids: Vec<_> = page.items.iter().map(|media| media.id).collect();
        assert_eq!(ids, vec![1, 5]);
        assert_eq!(page.items[1].title_english, None);
        assert_eq!(page.total_count, Some(5000));
        assert_eq!(
            page.continuation,
            Some(Continuation::Offset {
                next_page: 4,
                has_more: true
            })
        );
    }

    #[test]
    fn missing_page_info_and_errors() {
        let page = parse_media_page(r#"{"data": {"Page": {"media": []}}}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.continuation, None);

        let errors = r#"{"data": {"Page": null}, "errors": [{"message": "Invalid token", "status": 400}]}"#;
        assert_eq!(
            parse_media_page(errors),
            Err(QueryError::MalformedResponse("Invalid token".into()))
        );
    }

    #[test]
    fn headers_carry_the_user_agent() {
        let settings = Settings {
            user_agent: "anime-list".into(),
            ..Settings::default()
        };
        let headers = get_requests_headers(&settings).unwrap();
        assert_eq!(headers["user-agent"], "anime-list");
        assert!(!headers.contains_key("authorization"));
    }
}
