//! Harvest module for enumerating repositories and fetching their archives
//!
//! This module contains the core harvesting logic, including:
//! - Archive downloads with deterministic file naming
//! - Per-item topic policy
//! - Overall run coordination

mod coordinator;
mod fetcher;

pub use coordinator::{run_harvest, Coordinator};
pub use fetcher::{archive_file_name, ArchiveFetcher};

use crate::config::TopicPolicy;
use crate::github::RepoItem;

/// Decides whether a search item is fetched
///
/// Under [`TopicPolicy::TrustQuery`] an item without topic data is accepted on
/// the strength of the `topic:` filter; one that declares topics must list the
/// harvested tag. Under [`TopicPolicy::RequireTopic`] the tag must always be
/// declared.
pub fn is_eligible(item: &RepoItem, topic: &str, policy: TopicPolicy) -> bool {
    match policy {
        TopicPolicy::TrustQuery => item.topics_missing() || item.has_topic(topic),
        TopicPolicy::RequireTopic => item.has_topic(topic),
    }
}
