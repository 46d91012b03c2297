//! Blog services.
//!
//! Editing operations take an [`AccessScope`](crate::access::AccessScope)
//! and enforce it; the public listing side only ever sees published content.

pub mod blog;
pub mod listing;
pub mod post;

pub use blog::{BlogChoice, BlogService};
pub use listing::{
    Author, BlogEntry, BlogFront, CategoryEntry, Feed, FeedItem, ListingService, Page, PostDetail,
    PostEntry, PostListing,
};
pub use post::PostService;
