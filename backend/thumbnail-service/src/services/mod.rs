/// Service layer for the thumbnail pipeline
///
/// - Notifier: relevance filtering and work item publishing
/// - Thumbnail: resizing and derivative naming
/// - Worker: per-item pipeline and the queue consumer loop
pub mod notifier;
pub mod thumbnail;
pub mod worker;
