use super::{Collection, Continuation, Page};

/// Combines an incoming page with whatever is already cached for the same key.
///
/// Items are appended in arrival order without any de-duplication, and the
/// incoming continuation always replaces the cached one. A page without
/// continuation info marks the collection as exhausted.
pub fn merge<T>(existing: Option<Collection<T>>, incoming: Page<T>) -> Collection<T> {
    let Page {
        items,
        continuation,
        total_count,
    } = incoming;
    let continuation = continuation.unwrap_or(Continuation::Exhausted);

    match existing {
        None => Collection {
            items,
            continuation,
            total_count,
        },
        Some(mut collection) => {
            collection.items.extend(items);
            collection.continuation = continuation;
            // keep the last known count if this page didn't report one
            collection.total_count = total_count.or(collection.total_count);
            collection
        }
    }
}
