use serde_json::{json, Value};

use crate::{
    error::QueryError,
    pagination_utils::{PaginationArgs, QueryArgs, QueryDescriptor, QueryVariables, SearchTarget},
};

pub const SEARCH_REPOSITORIES: QueryDescriptor = QueryDescriptor {
    name: "SearchRepositories",
    document: "query SearchRepositories($first: Int!, $query: String!, $after: String)
    {
        search(first: $first, type: REPOSITORY, query: $query, after: $after)
        {
            repositoryCount
            nodes
            {
                ... on Repository
                {
                    id
                    name
                    url
                    nameWithOwner
                    description
                }
            }
            pageInfo
            {
                hasNextPage
                endCursor
            }
        }
    }",
};

pub const USER_REPOSITORIES: QueryDescriptor = QueryDescriptor {
    name: "UserRepositories",
    document: "query UserRepositories($login: String!, $first: Int!, $after: String)
    {
        user(login: $login)
        {
            repositories(first: $first, after: $after)
            {
                totalCount
                nodes
                {
                    id
                    name
                    url
                    nameWithOwner
                    description
                }
                pageInfo
                {
                    hasNextPage
                    endCursor
                }
            }
        }
    }",
};

pub fn descriptor_for(args: &QueryArgs) -> QueryDescriptor {
    match args.target {
        SearchTarget::UserRepositories { .. } => USER_REPOSITORIES,
        // refused by `encode_variables`
        SearchTarget::Repositories { .. } | SearchTarget::Media { .. } => SEARCH_REPOSITORIES,
    }
}

/// Builds the graphql `variables` object. GitHub connections are cursor based,
/// page numbers are refused.
pub fn encode_variables(variables: &QueryVariables) -> Result<Value, QueryError> {
    let after = match &variables.pagination {
        PaginationArgs::Start => Value::Null,
        PaginationArgs::After(cursor) => Value::String(cursor.to_owned()),
        PaginationArgs::Page(page) => {
            return Err(QueryError::Validation(format!(
                "GitHub connections can't be paged by number (asked for page {page})"
            )))
        }
    };
    let args = &variables.args;

    Ok(match &args.target {
        SearchTarget::Repositories { .. } => json!({
            "first": args.page_size,
            "after": after,
            "query": args.search_text().unwrap_or_default(),
        }),
        SearchTarget::UserRepositories { login } => json!({
            "first": args.page_size,
            "after": after,
            "login": login.trim(),
        }),
        SearchTarget::Media { .. } => {
            return Err(QueryError::Validation(
                "media lists aren't served by GitHub".to_owned(),
            ))
        }
    })
}
