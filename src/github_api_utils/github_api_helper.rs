use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};

use super::{
    search_queries::{descriptor_for, encode_variables, USER_REPOSITORIES},
    search_repo_api_response::{Repo, RepoConnection, SearchData, UserData},
    Repository,
};
use crate::{
    config_utils::Settings,
    error::{ConfigError, QueryError},
    graphql_utils::{graphql_error, post_graphql, GraphqlResponse, RequestThrottle},
    pagination_utils::{
        pagination_controller::QueryExecutor, Continuation, Page, QueryArgs, QueryDescriptor,
        QueryVariables,
    },
};

/// Creates and sets standard github api request headers:
/// 1. **authorization**, only when a token is configured.
/// 2. **x-github-api-version**, github api version.
/// 3. **user-agent**, required by github for every request.
fn get_requests_headers(settings: &Settings) -> Result<HeaderMap, ConfigError> {
    let header_value = |name: &str, value: &str| {
        HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader(name.to_owned()))
    };

    let mut headers = HeaderMap::new();
    if let Some(token) = &settings.token {
        let mut value = header_value("authorization", &format!("Bearer {token}"))?;
        value.set_sensitive(true);
        headers.insert("authorization", value);
    }
    headers.insert(
        "x-github-api-version",
        header_value("x-github-api-version", &settings.api_version)?,
    );
    headers.insert(
        "user-agent",
        header_value("user-agent", &settings.user_agent)?,
    );
    Ok(headers)
}

impl From<Repo> for Repository {
    fn from(repo: Repo) -> Self {
        Repository {
            id: repo.id,
            name: repo.name,
            url: repo.url,
            full_name: repo.full_name,
            description: repo.description,
        }
    }
}

fn connection_to_page(connection: RepoConnection) -> Page<Repository> {
    Page {
        items: connection
            .repositories
            .into_iter()
            .flatten()
            .map(Repository::from)
            .collect(),
        continuation: connection.page_info.map(|page_info| Continuation::Cursor {
            end_cursor: page_info.end_cursor,
            has_more: page_info.has_next_page,
        }),
        total_count: connection.total_count,
    }
}

pub(crate) fn parse_search_page(body: &str) -> Result<Page<Repository>, QueryError> {
    let response: GraphqlResponse<SearchData> = serde_json::from_str(body)?;
    let connection = response
        .data
        .and_then(|data| data.search)
        .ok_or_else(|| graphql_error(&response.errors, "search"))?;
    Ok(connection_to_page(connection))
}

pub(crate) fn parse_user_page(body: &str) -> Result<Page<Repository>, QueryError> {
    let response: GraphqlResponse<UserData> = serde_json::from_str(body)?;
    let user = response
        .data
        .and_then(|data| data.user)
        .ok_or_else(|| graphql_error(&response.errors, "user"))?;
    Ok(connection_to_page(user.repositories))
}

/// Runs the search queries against the github graphql api.
///
/// Requests are spaced out following github's rate limit headers.
pub struct GithubSearchExecutor {
    client: Client,
    endpoint: String,
    headers: HeaderMap,
    throttle: RequestThrottle,
}

impl GithubSearchExecutor {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: &Settings) -> Result<Self, ConfigError> {
        Ok(GithubSearchExecutor {
            client,
            endpoint: settings.endpoint.to_owned(),
            headers: get_requests_headers(settings)?,
            throttle: RequestThrottle::new(settings.min_request_interval_ms),
        })
    }
}

#[async_trait]
impl QueryExecutor for GithubSearchExecutor {
    type Item = Repository;

    fn describe(&self, args: &QueryArgs) -> QueryDescriptor {
        descriptor_for(args)
    }

    async fn execute(
        &self,
        query: &QueryDescriptor,
        variables: &QueryVariables,
    ) -> Result<Page<Repository>, QueryError> {
        let response_body = post_graphql(
            &self.client,
            &self.endpoint,
            &self.headers,
            &self.throttle,
            query,
            encode_variables(variables)?,
        )
        .await?;

        if *query == USER_REPOSITORIES {
            parse_user_page(&response_body)
        } else {
            parse_search_page(&response_body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_skip_missing_token() {
        let settings = Settings::default();
        let anonymous = get_requests_headers(&settings).unwrap();
        assert!(!anonymous.contains_key("authorization"));
        assert_eq!(anonymous["x-github-api-version"], "2022-11-28");

        let settings = Settings {
            token: Some("ghp_abc".into()),
            ..Settings::default()
        };
        let authorized = get_requests_headers(&settings).unwrap();
        assert_eq!(authorized["authorization"], "Bearer ghp_abc");

        let settings = Settings {
            user_agent: "bad\nagent".into(),
            ..Settings::default()
        };
        assert!(matches!(
            get_requests_headers(&settings),
            Err(ConfigError::InvalidHeader(_))
        ));
    }

    #[test]
    fn search_page_is_translated() {
        let body = r#"{
            "data": {
                "search": {
                    "repositoryCount": 2,
                    "nodes": [
                        {"id": "R_1", "name": "tokio", "url": "https://github.com/tokio-rs/tokio",
                         "nameWithOwner": "tokio-rs/tokio", "description": "runtime"},
                        null,
                        {"id": "R_2", "name": "mio", "url": "https://github.com/tokio-rs/mio",
                         "nameWithOwner": "tokio-rs/mio", "description": null}
                    ],
                    "pageInfo": {"hasNextPage": true, "endCursor": "Y3Vyc29yOjI="}
                }
            }
        }"#;
        let page = parse_search_page(body).unwrap();
        let names: Vec<_> = page.items.iter().map(|repo| repo.name.as_str()).collect();
        assert_eq!(names, vec!["tokio", "mio"]);
        assert_eq!(page.items[0].full_name, "tokio-rs/tokio");
        assert_eq!(page.total_count, Some(2));
        assert_eq!(
            page.continuation,
            Some(Continuation::Cursor {
                end_cursor: Some("Y3Vyc29yOjI=".into()),
                has_more: true
            })
        );
    }

    #[test]
    fn missing_page_info_leaves_continuation_empty() {
        let body = r#"{"data": {"search": {"nodes": []}}}"#;
        let page = parse_search_page(body).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.continuation, None);
    }

    #[test]
    fn graphql_errors_are_typed() {
        let forbidden = r#"{"data": null, "errors": [{"type": "FORBIDDEN", "message": "Resource not accessible"}]}"#;
        assert!(matches!(
            parse_search_page(forbidden),
            Err(QueryError::Authorization(_))
        ));

        let not_found = r#"{"data": {"user": null}, "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a User"}]}"#;
        assert_eq!(
            parse_user_page(not_found),
            Err(QueryError::MalformedResponse(
                "Could not resolve to a User".into()
            ))
        );

        assert!(matches!(
            parse_search_page("<html>bad gateway</html>"),
            Err(QueryError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_search_page(r#"{"data": {}}"#),
            Err(QueryError::MalformedResponse(_))
        ));
    }

    #[test]
    fn user_page_reads_total_count() {
        let body = r#"{"data": {"user": {"repositories": {
            "totalCount": 31,
            "nodes": [{"id": "R_9", "name": "dotfiles", "url": "https://github.com/octocat/dotfiles",
                       "nameWithOwner": "octocat/dotfiles", "description": null}],
            "pageInfo": {"hasNextPage": false, "endCursor": null}
        }}}}"#;
        let page = parse_user_page(body).unwrap();
        assert_eq!(page.total_count, Some(31));
        assert_eq!(page.items.len(), 1);
        assert_eq!(
            page.continuation,
            Some(Continuation::Cursor {
                end_cursor: None,
                has_more: false
            })
        );
    }
}
