pub mod merge_policy;
pub mod pagination_controller;

use std::{collections::BTreeMap, fmt};

/// Default amount of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// What a page says about the rest of the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Relay style `pageInfo { endCursor hasNextPage }`.
    Cursor {
        end_cursor: Option<String>,
        has_more: bool,
    },
    /// Page numbered APIs, `next_page` is the page to ask for next.
    Offset { next_page: u32, has_more: bool },
    Exhausted,
}

impl Continuation {
    /// Pagination arguments for the next request, if one can be built.
    pub fn next_pagination(&self) -> Option<PaginationArgs> {
        match self {
            Continuation::Cursor {
                end_cursor: Some(cursor),
                has_more: true,
            } => Some(PaginationArgs::After(cursor.to_owned())),
            Continuation::Offset {
                next_page,
                has_more: true,
            } => Some(PaginationArgs::Page(*next_page)),
            _ => None,
        }
    }

    /// A cursor flagged as `has_more` without an end cursor can't be followed,
    /// so it counts as exhausted.
    pub fn has_more(&self) -> bool {
        self.next_pagination().is_some()
    }
}

/// One fetch response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` when the response didn't carry any continuation info.
    pub continuation: Option<Continuation>,
    pub total_count: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, continuation: Continuation) -> Self {
        Page {
            items,
            continuation: Some(continuation),
            total_count: None,
        }
    }

    pub fn without_continuation(items: Vec<T>) -> Self {
        Page {
            items,
            continuation: None,
            total_count: None,
        }
    }

    pub fn with_total_count(mut self, total_count: u64) -> Self {
        self.total_count = Some(total_count);
        self
    }
}

/// Accumulated items for one [`CollectionKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    pub items: Vec<T>,
    pub continuation: Continuation,
    pub total_count: Option<u64>,
}

impl<T> Collection<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.continuation.has_more()
    }
}

/// What is being listed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchTarget {
    /// Free text repository search.
    Repositories { query: String },
    /// Repositories owned by a GitHub login.
    UserRepositories { login: String },
    /// AniList media pages, optionally narrowed by a title search.
    Media { search: String },
}

impl SearchTarget {
    fn trimmed(&self) -> SearchTarget {
        match self {
            SearchTarget::Repositories { query } => SearchTarget::Repositories {
                query: query.trim().to_owned(),
            },
            SearchTarget::UserRepositories { login } => SearchTarget::UserRepositories {
                login: login.trim().to_owned(),
            },
            SearchTarget::Media { search } => SearchTarget::Media {
                search: search.trim().to_owned(),
            },
        }
    }
}

/// Every argument of a paginated query except the pagination ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryArgs {
    pub target: SearchTarget,
    pub page_size: u32,
    /// Extra search qualifiers, rendered as `key:value` after the search text.
    pub filters: BTreeMap<String, String>,
}

impl QueryArgs {
    pub fn repositories(query: impl Into<String>) -> Self {
        QueryArgs {
            target: SearchTarget::Repositories {
                query: query.into(),
            },
            page_size: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
        }
    }

    pub fn user_repositories(login: impl Into<String>) -> Self {
        QueryArgs {
            target: SearchTarget::UserRepositories {
                login: login.into(),
            },
            page_size: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
        }
    }

    pub fn media(search: impl Into<String>) -> Self {
        QueryArgs {
            target: SearchTarget::Media {
                search: search.into(),
            },
            page_size: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Search text as sent to the api, qualifiers included.
    /// Returns `None` for targets that aren't a text search.
    pub fn search_text(&self) -> Option<String> {
        match &self.target {
            SearchTarget::Repositories { query } => {
                let mut text = query.trim().to_owned();
                for (key, value) in &self.filters {
                    text.push_str(&format!(" {key}:{value}"));
                }
                Some(text)
            }
            SearchTarget::UserRepositories { .. } | SearchTarget::Media { .. } => None,
        }
    }

    pub fn key(&self) -> CollectionKey {
        CollectionKey::from_args(self)
    }
}

/// Identity of a logical collection: the query arguments themselves, with
/// surrounding whitespace dropped from the free text parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey(QueryArgs);

impl CollectionKey {
    pub fn from_args(args: &QueryArgs) -> Self {
        CollectionKey(QueryArgs {
            target: args.target.trimmed(),
            page_size: args.page_size,
            filters: args.filters.clone(),
        })
    }

    pub fn args(&self) -> &QueryArgs {
        &self.0
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = &self.0;
        match &args.target {
            SearchTarget::Repositories { query } => write!(f, "search {query:?}")?,
            SearchTarget::UserRepositories { login } => write!(f, "user {login:?}")?,
            SearchTarget::Media { search } => write!(f, "media {search:?}")?,
        }
        write!(f, " first={}", args.page_size)?;
        for (key, value) in &args.filters {
            write!(f, " {key:?}={value:?}")?;
        }
        Ok(())
    }
}

/// Where in the collection a request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationArgs {
    Start,
    After(String),
    Page(u32),
}

/// Full set of variables for one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariables {
    pub args: QueryArgs,
    pub pagination: PaginationArgs,
}

/// Opaque query document handed to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub name: &'static str,
    pub document: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_pagination_but_not_filters() {
        let plain = QueryArgs::repositories("tokio");
        let filtered = QueryArgs::repositories("tokio").with_filter("language", "rust");
        let bigger = QueryArgs::repositories("tokio").with_page_size(50);

        assert_eq!(plain.key(), QueryArgs::repositories("tokio").key());
        assert_ne!(plain.key(), filtered.key());
        assert_ne!(plain.key(), bigger.key());
        assert_ne!(
            QueryArgs::repositories("abc").key(),
            QueryArgs::user_repositories("abc").key()
        );
    }

    #[test]
    fn search_text_appends_qualifiers_in_order() {
        let args = QueryArgs::repositories(" serde ")
            .with_filter("stars", ">100")
            .with_filter("language", "rust");
        assert_eq!(
            args.search_text().as_deref(),
            Some("serde language:rust stars:>100")
        );
        assert_eq!(QueryArgs::user_repositories("octocat").search_text(), None);
    }

    #[test]
    fn separators_inside_values_dont_merge_keys() {
        let packed = QueryArgs::repositories("tokio").with_filter("language", "rust,stars=>100");
        let split = QueryArgs::repositories("tokio")
            .with_filter("language", "rust")
            .with_filter("stars", ">100");
        assert_ne!(packed.key(), split.key());

        let sneaky = QueryArgs::repositories("tokio|first=10|");
        assert_ne!(sneaky.key(), QueryArgs::repositories("tokio").key());

        assert_eq!(
            QueryArgs::repositories("  tokio ").key(),
            QueryArgs::repositories("tokio").key()
        );
        assert_ne!(
            QueryArgs::media("abc").key(),
            QueryArgs::repositories("abc").key()
        );
    }

    #[test]
    fn cursor_without_end_cursor_is_exhausted() {
        let dangling = Continuation::Cursor {
            end_cursor: None,
            has_more: true,
        };
        assert!(!dangling.has_more());

        let cursor = Continuation::Cursor {
            end_cursor: Some("c1".into()),
            has_more: true,
        };
        assert_eq!(
            cursor.next_pagination(),
            Some(PaginationArgs::After("c1".into()))
        );

        let offset = Continuation::Offset {
            next_page: 3,
            has_more: true,
        };
        assert_eq!(offset.next_pagination(), Some(PaginationArgs::Page(3)));
        assert!(!Continuation::Exhausted.has_more());
    }
}
