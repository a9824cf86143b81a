use std::collections::HashMap;

use async_trait::async_trait;

use super::{
    merge_policy::merge, Collection, CollectionKey, Page, PaginationArgs, QueryArgs,
    QueryDescriptor, QueryVariables, SearchTarget,
};
use crate::error::QueryError;

/// Shortest search text accepted before anything is dispatched.
pub const DEFAULT_MIN_QUERY_LEN: usize = 3;

/// Capability used to fetch a single page.
///
/// Implementations report every failure as a [`QueryError`] value, timeouts
/// and retry policies included.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    type Item: Clone + Send + Sync;

    /// Picks the query document able to serve `args`.
    fn describe(&self, args: &QueryArgs) -> QueryDescriptor;

    async fn execute(
        &self,
        query: &QueryDescriptor,
        variables: &QueryVariables,
    ) -> Result<Page<Self::Item>, QueryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching,
    Exhausted,
    Failed,
}

/// A page request handed out by the controller.
/// The ticket ties the eventual response back to the request that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub ticket: u64,
    pub key: CollectionKey,
    pub descriptor: QueryDescriptor,
    pub variables: QueryVariables,
}

/// Result of driving the controller with one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The page was merged, the collection is now in the given state.
    Merged(FetchState),
    Failed(QueryError),
    /// The response belonged to a collection nobody is waiting for anymore.
    Discarded,
    /// The event wasn't valid in the current state, nothing was dispatched.
    Ignored,
}

struct Entry<T> {
    args: QueryArgs,
    collection: Option<Collection<T>>,
    state: FetchState,
    // in flight while Fetching, the one to re-issue while Failed
    request: Option<PageRequest>,
    last_error: Option<QueryError>,
}

/// Drives page fetches for the collections requested by the presentation layer.
///
/// Only one collection is active at a time: asking for a new key drops the
/// previous one, and responses for dropped keys are discarded on arrival.
/// Each key has at most one request in flight.
///
/// The `begin_*` methods only update state and return the request to send,
/// [`PaginationController::complete`] feeds the response back. The async
/// `request_*` methods do both through the executor.
pub struct PaginationController<E: QueryExecutor> {
    executor: E,
    entries: HashMap<CollectionKey, Entry<E::Item>>,
    active_key: Option<CollectionKey>,
    last_ticket: u64,
    min_query_len: usize,
}

impl<E: QueryExecutor> PaginationController<E> {
    pub fn new(executor: E) -> Self {
        PaginationController {
            executor,
            entries: HashMap::new(),
            active_key: None,
            last_ticket: 0,
            min_query_len: DEFAULT_MIN_QUERY_LEN,
        }
    }

    pub fn with_min_query_len(mut self, min_query_len: usize) -> Self {
        self.min_query_len = min_query_len;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn active_key(&self) -> Option<&CollectionKey> {
        self.active_key.as_ref()
    }

    pub fn current_collection(&self, key: &CollectionKey) -> Option<&Collection<E::Item>> {
        self.entries
            .get(key)
            .and_then(|entry| entry.collection.as_ref())
    }

    /// Unknown keys are reported as `Idle`.
    pub fn current_state(&self, key: &CollectionKey) -> FetchState {
        self.entries
            .get(key)
            .map_or(FetchState::Idle, |entry| entry.state)
    }

    /// Error that moved `key` to `Failed`, if it is still failed.
    pub fn last_error(&self, key: &CollectionKey) -> Option<&QueryError> {
        self.entries
            .get(key)
            .and_then(|entry| entry.last_error.as_ref())
    }

    /// Drops every collection. Responses still in flight will be discarded.
    pub fn clear_all(&mut self) {
        info!("Clearing {} cached collection(s)", self.entries.len());
        self.entries.clear();
        self.active_key = None;
    }

    fn validate(&self, args: &QueryArgs) -> Result<(), QueryError> {
        match &args.target {
            SearchTarget::Repositories { query } => {
                let len = query.trim().chars().count();
                if len < self.min_query_len {
                    return Err(QueryError::Validation(format!(
                        "search text needs at least {} characters, got {}",
                        self.min_query_len, len
                    )));
                }
            }
            SearchTarget::UserRepositories { login } => {
                if login.trim().is_empty() {
                    return Err(QueryError::Validation("login can't be empty".to_owned()));
                }
            }
            // an empty media search lists everything
            SearchTarget::Media { .. } => {}
        }
        if args.page_size == 0 {
            return Err(QueryError::Validation(
                "page size must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn next_ticket(&mut self) -> u64 {
        self.last_ticket += 1;
        self.last_ticket
    }

    /// Starts loading the first page for `args`.
    ///
    /// Returns `Ok(None)` when the same collection is already being fetched.
    pub fn begin_initial(&mut self, args: QueryArgs) -> Result<Option<PageRequest>, QueryError> {
        self.validate(&args)?;
        let key = args.key();

        if self.current_state(&key) == FetchState::Fetching {
            debug!("Already fetching {key}, ignoring initial request");
            return Ok(None);
        }

        if let Some(previous) = self.active_key.take() {
            if previous != key && self.entries.remove(&previous).is_some() {
                debug!("Dropped collection {previous}");
            }
        }

        let ticket = self.next_ticket();
        let request = PageRequest {
            ticket,
            key: key.clone(),
            descriptor: self.executor.describe(&args),
            variables: QueryVariables {
                args: args.clone(),
                pagination: PaginationArgs::Start,
            },
        };
        self.entries.insert(
            key.clone(),
            Entry {
                args,
                collection: None,
                state: FetchState::Fetching,
                request: Some(request.clone()),
                last_error: None,
            },
        );
        self.active_key = Some(key);

        info!("[#{}] Requesting first page of {}", ticket, request.key);
        Ok(Some(request))
    }

    /// Starts loading the next page of `key`.
    ///
    /// Only valid while `Idle`: a request already in flight, a failed or an
    /// exhausted collection all make this a no-op.
    pub fn begin_more(&mut self, key: &CollectionKey) -> Option<PageRequest> {
        let entry = match self.entries.get_mut(key) {
            Some(entry) => entry,
            None => {
                debug!("No collection for {key}, ignoring more request");
                return None;
            }
        };
        if entry.state != FetchState::Idle {
            debug!("Ignoring more request for {key} while {:?}", entry.state);
            return None;
        }
        let pagination = match entry
            .collection
            .as_ref()
            .and_then(|collection| collection.continuation.next_pagination())
        {
            Some(pagination) => pagination,
            None => {
                debug!("{key} has no more pages");
                entry.state = FetchState::Exhausted;
                return None;
            }
        };
        let args = entry.args.clone();

        let ticket = self.next_ticket();
        let request = PageRequest {
            ticket,
            key: key.clone(),
            descriptor: self.executor.describe(&args),
            variables: QueryVariables { args, pagination },
        };
        self.mark_fetching(&request);

        info!(
            "[#{}] Requesting {:?} of {}",
            request.ticket, request.variables.pagination, key
        );
        Some(request)
    }

    /// Re-issues the request that moved `key` to `Failed`.
    pub fn begin_retry(&mut self, key: &CollectionKey) -> Option<PageRequest> {
        let entry = self.entries.get(key)?;
        if entry.state != FetchState::Failed {
            debug!("Ignoring retry for {key} while {:?}", entry.state);
            return None;
        }
        let failed = entry.request.clone()?;

        let ticket = self.next_ticket();
        let request = PageRequest { ticket, ..failed };
        self.mark_fetching(&request);

        info!("[#{}] Retrying {}", request.ticket, key);
        Some(request)
    }

    fn mark_fetching(&mut self, request: &PageRequest) {
        if let Some(entry) = self.entries.get_mut(&request.key) {
            entry.state = FetchState::Fetching;
            entry.last_error = None;
            entry.request = Some(request.clone());
        }
    }

    /// Feeds the response of `request` back.
    ///
    /// Responses for keys that were dropped or superseded are discarded, a
    /// failure keeps whatever was merged so far.
    pub fn complete(
        &mut self,
        request: &PageRequest,
        result: Result<Page<E::Item>, QueryError>,
    ) -> Outcome {
        let entry = match self.entries.get_mut(&request.key) {
            Some(entry)
                if entry.state == FetchState::Fetching
                    && entry.request.as_ref().map(|pending| pending.ticket)
                        == Some(request.ticket) =>
            {
                entry
            }
            _ => {
                debug!(
                    "[#{}] Discarding stale response for {}",
                    request.ticket, request.key
                );
                return Outcome::Discarded;
            }
        };

        match result {
            Ok(page) => {
                let received = page.items.len();
                let collection = merge(entry.collection.take(), page);
                entry.state = if collection.has_more() {
                    FetchState::Idle
                } else {
                    FetchState::Exhausted
                };
                debug!(
                    "[#{}] Merged {} item(s) into {}, {} total, now {:?}",
                    request.ticket,
                    received,
                    request.key,
                    collection.len(),
                    entry.state
                );
                entry.collection = Some(collection);
                entry.request = None;
                Outcome::Merged(entry.state)
            }
            Err(err) => {
                warn!("[#{}] Fetching {} failed: {}", request.ticket, request.key, err);
                entry.state = FetchState::Failed;
                entry.last_error = Some(err.clone());
                Outcome::Failed(err)
            }
        }
    }

    async fn dispatch(&mut self, request: PageRequest) -> Outcome {
        let result = self
            .executor
            .execute(&request.descriptor, &request.variables)
            .await;
        self.complete(&request, result)
    }

    /// Loads the first page of `args`, replacing the active collection.
    pub async fn request_initial(&mut self, args: QueryArgs) -> Result<Outcome, QueryError> {
        match self.begin_initial(args)? {
            Some(request) => Ok(self.dispatch(request).await),
            None => Ok(Outcome::Ignored),
        }
    }

    pub async fn request_more(&mut self, key: &CollectionKey) -> Outcome {
        match self.begin_more(key) {
            Some(request) => self.dispatch(request).await,
            None => Outcome::Ignored,
        }
    }

    pub async fn retry(&mut self, key: &CollectionKey) -> Outcome {
        match self.begin_retry(key) {
            Some(request) => self.dispatch(request).await,
            None => Outcome::Ignored,
        }
    }
}
