//! Scoped access control for blog editors.
//!
//! The scope of a principal is computed once per request:
//! - superusers are [`AccessScope::Unrestricted`];
//! - everyone else is [`AccessScope::ScopedTo`] the blogs they are assigned to,
//!   possibly none.
//!
//! Listing queries are narrowed through [`AccessScope::filter`]; writes are
//! checked with [`AccessScope::ensure_writable`] before any other validation.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{BlogError, BlogResult};
use crate::models::{Blog, Principal};
use crate::store::{BlogFilter, BlogStore, ScopedQuery};

/// Entity kinds subject to creation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Blog,
    Category,
    Post,
    Link,
}

impl EntityKind {
    /// Whether the entity hangs off a blog through a foreign key.
    pub fn is_blog_scoped(&self) -> bool {
        !matches!(self, Self::Blog)
    }
}

/// The set of blogs a principal may view and edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// Superuser: every blog.
    Unrestricted,
    /// Only these blogs. May be empty.
    ScopedTo(BTreeSet<Uuid>),
}

impl AccessScope {
    /// Build the scope for `principal` given the blogs assigned to them.
    pub fn for_principal(principal: &Principal, assigned: BTreeSet<Uuid>) -> Self {
        if principal.is_superuser {
            Self::Unrestricted
        } else {
            Self::ScopedTo(assigned)
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    /// Whether the scope covers `blog_id`.
    pub fn permits(&self, blog_id: Uuid) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::ScopedTo(blogs) => blogs.contains(&blog_id),
        }
    }

    /// Blogs are created by superusers only. Blog-scoped entities need at
    /// least one assigned blog.
    pub fn can_create(&self, kind: EntityKind) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::ScopedTo(blogs) => kind.is_blog_scoped() && !blogs.is_empty(),
        }
    }

    /// Reject writes that reference a blog outside the scope.
    pub fn ensure_writable(&self, blog_id: Uuid) -> BlogResult<()> {
        if self.permits(blog_id) {
            Ok(())
        } else {
            tracing::warn!(blog_id = %blog_id, "write outside access scope rejected");
            Err(BlogError::AccessDenied)
        }
    }

    /// Reject creation of `kind` when the scope does not allow it.
    pub fn ensure_can_create(&self, kind: EntityKind) -> BlogResult<()> {
        if self.can_create(kind) {
            Ok(())
        } else {
            tracing::warn!(kind = ?kind, "creation outside access scope rejected");
            Err(BlogError::AccessDenied)
        }
    }

    /// Narrow a listing query to the scope. Unrestricted scopes return it unchanged.
    pub fn filter<Q: ScopedQuery>(&self, mut query: Q) -> Q {
        if let Self::ScopedTo(blogs) = self {
            query.restrict_to_blogs(blogs);
        }
        query
    }

    /// Narrow a set of blog-selection options to the scope.
    pub fn restrict_choices<T>(&self, options: Vec<T>, blog_id: impl Fn(&T) -> Uuid) -> Vec<T> {
        match self {
            Self::Unrestricted => options,
            Self::ScopedTo(blogs) => options
                .into_iter()
                .filter(|o| blogs.contains(&blog_id(o)))
                .collect(),
        }
    }
}

/// Computes access scopes from blog assignments.
#[derive(Clone)]
pub struct AccessController {
    store: Arc<dyn BlogStore>,
}

impl AccessController {
    pub fn new(store: Arc<dyn BlogStore>) -> Self {
        Self { store }
    }

    /// Scope for `principal`. Superusers skip the assignment lookup.
    pub async fn scope_for(&self, principal: &Principal) -> BlogResult<AccessScope> {
        if principal.is_superuser {
            return Ok(AccessScope::Unrestricted);
        }
        let assigned = self.store.blog_ids_for_user(principal.user_id).await?;
        tracing::debug!(
            user = %principal.name,
            blogs = assigned.len(),
            "computed access scope"
        );
        Ok(AccessScope::ScopedTo(assigned))
    }

    /// Every blog for superusers; the assigned blogs otherwise (possibly none).
    pub async fn visible_blogs(&self, principal: &Principal) -> BlogResult<Vec<Blog>> {
        let scope = self.scope_for(principal).await?;
        self.store.list_blogs(&scope.filter(BlogFilter::new())).await
    }

    pub async fn can_create(&self, principal: &Principal, kind: EntityKind) -> BlogResult<bool> {
        Ok(self.scope_for(principal).await?.can_create(kind))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::PostFilter;

    #[test]
    fn superuser_is_unrestricted() {
        let scope = AccessScope::for_principal(&Principal::superuser("root"), BTreeSet::new());
        assert!(scope.is_unrestricted());
        assert!(scope.permits(Uuid::now_v7()));
        assert!(scope.can_create(EntityKind::Blog));
        assert!(scope.can_create(EntityKind::Post));
    }

    #[test]
    fn unassigned_editor_can_create_nothing() {
        let scope = AccessScope::for_principal(&Principal::editor("ed"), BTreeSet::new());
        for kind in [
            EntityKind::Blog,
            EntityKind::Category,
            EntityKind::Post,
            EntityKind::Link,
        ] {
            assert!(!scope.can_create(kind), "{kind:?}");
        }
        assert!(matches!(
            scope.ensure_can_create(EntityKind::Post),
            Err(BlogError::AccessDenied)
        ));
    }

    #[test]
    fn assigned_editor_creates_blog_scoped_entities_only() {
        let blog = Uuid::now_v7();
        let scope = AccessScope::for_principal(&Principal::editor("ed"), BTreeSet::from([blog]));
        assert!(scope.can_create(EntityKind::Category));
        assert!(scope.can_create(EntityKind::Post));
        assert!(scope.can_create(EntityKind::Link));
        assert!(!scope.can_create(EntityKind::Blog));
    }

    #[test]
    fn writes_outside_scope_are_denied() {
        let blog = Uuid::now_v7();
        let scope = AccessScope::ScopedTo(BTreeSet::from([blog]));
        assert!(scope.ensure_writable(blog).is_ok());
        assert!(matches!(
            scope.ensure_writable(Uuid::now_v7()),
            Err(BlogError::AccessDenied)
        ));
    }

    #[test]
    fn unrestricted_filter_is_identity() {
        let filter = AccessScope::Unrestricted.filter(PostFilter::new().site("example.com"));
        assert!(filter.blog_in.is_none());
    }

    #[test]
    fn scoped_filter_restricts_to_assigned_blogs() {
        let blog = Uuid::now_v7();
        let scope = AccessScope::ScopedTo(BTreeSet::from([blog]));
        let filter = scope.filter(PostFilter::new());
        assert_eq!(filter.blog_in, Some(BTreeSet::from([blog])));
    }

    #[test]
    fn choices_are_narrowed() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let scope = AccessScope::ScopedTo(BTreeSet::from([b]));
        let kept = scope.restrict_choices(vec![(a, "A"), (b, "B")], |(id, _)| *id);
        assert_eq!(kept, vec![(b, "B")]);

        let all = AccessScope::Unrestricted.restrict_choices(vec![(a, "A"), (b, "B")], |(id, _)| *id);
        assert_eq!(all.len(), 2);
    }
}
