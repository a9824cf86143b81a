pub mod github_api_helper;
pub mod search_queries;

/// A repository as listed by the search screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub url: String,
    pub full_name: String,
    pub description: Option<String>,
}

mod search_repo_api_response {
    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct Repo {
        pub(crate) id: String,
        pub(crate) name: String,
        pub(crate) url: String,
        #[serde(rename = "nameWithOwner")]
        pub(crate) full_name: String,
        pub(crate) description: Option<String>,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct SearchData {
        pub(crate) search: Option<RepoConnection>,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct UserData {
        pub(crate) user: Option<UserNode>,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct UserNode {
        pub(crate) repositories: RepoConnection,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct RepoConnection {
        #[serde(alias = "repositoryCount", alias = "totalCount")]
        pub(crate) total_count: Option<u64>,
        #[serde(rename = "nodes", default)]
        pub(crate) repositories: Vec<Option<Repo>>,
        #[serde(rename = "pageInfo")]
        pub(crate) page_info: Option<GithubPageInfo>,
    }

    #[derive(serde::Deserialize, Debug)]
    pub(crate) struct GithubPageInfo {
        #[serde(rename = "endCursor")]
        pub(crate) end_cursor: Option<String>,
        #[serde(rename = "hasNextPage")]
        pub(crate) has_next_page: bool,
    }
}
