#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Scoped access integration tests.
//!
//! Visibility, creation rights, queryset filtering, and choice restriction
//! for superusers, assigned editors, and unassigned users.

mod common;

use std::collections::BTreeSet;

use common::{SITE, TestApp, category_input, post_input};
use multiblog_kernel::access::{AccessScope, EntityKind};
use multiblog_kernel::error::BlogError;
use multiblog_kernel::models::{CreateBlog, CreateLink, UpdateBlog, UpdatePost};
use multiblog_kernel::store::{BlogStore, CategoryFilter, PostFilter};

// =============================================================================
// Visible blogs
// =============================================================================

#[tokio::test]
async fn superuser_sees_every_blog() {
    let app = TestApp::new();
    let root = app.create_user("root", true).await;
    app.create_blog("tech", &[]).await;
    app.create_blog("other", &[]).await;

    let visible = app
        .state
        .access()
        .visible_blogs(&root.principal)
        .await
        .unwrap();
    assert_eq!(visible.len(), 2);
}

#[tokio::test]
async fn unassigned_user_sees_no_blogs() {
    let app = TestApp::new();
    let nobody = app.create_user("nobody", false).await;
    app.create_blog("tech", &[]).await;

    let visible = app
        .state
        .access()
        .visible_blogs(&nobody.principal)
        .await
        .unwrap();
    assert!(visible.is_empty());
}

#[tokio::test]
async fn editor_sees_assigned_blogs_only() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    let tech = app.create_blog("tech", &[&ed]).await;
    app.create_blog("other", &[]).await;

    let visible = app
        .state
        .access()
        .visible_blogs(&ed.principal)
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, tech.id);
}

// =============================================================================
// Creation rights
// =============================================================================

#[tokio::test]
async fn can_create_depends_on_assignment() {
    let app = TestApp::new();
    let root = app.create_user("root", true).await;
    let ed = app.create_user("ed", false).await;
    let nobody = app.create_user("nobody", false).await;
    app.create_blog("tech", &[&ed]).await;
    let access = app.state.access();

    for kind in [EntityKind::Category, EntityKind::Post, EntityKind::Link] {
        assert!(access.can_create(&root.principal, kind).await.unwrap());
        assert!(access.can_create(&ed.principal, kind).await.unwrap());
        assert!(!access.can_create(&nobody.principal, kind).await.unwrap());
    }
    assert!(
        access
            .can_create(&root.principal, EntityKind::Blog)
            .await
            .unwrap()
    );
    assert!(
        !access
            .can_create(&ed.principal, EntityKind::Blog)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn editor_cannot_create_blogs() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    app.create_blog("tech", &[&ed]).await;
    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();

    let err = app
        .state
        .blogs()
        .create(
            &scope,
            SITE,
            CreateBlog {
                name: "Mine".into(),
                slug: "mine".into(),
                description: String::new(),
                blog_type: Default::default(),
                layout_mode: Default::default(),
                main_image: None,
                external: false,
                published: true,
                date_available: None,
                users: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BlogError::AccessDenied), "{err}");
}

#[tokio::test]
async fn unassigned_user_cannot_create_categories() {
    let app = TestApp::new();
    let nobody = app.create_user("nobody", false).await;
    let tech = app.create_blog("tech", &[]).await;
    let scope = app
        .state
        .access()
        .scope_for(&nobody.principal)
        .await
        .unwrap();

    let err = app
        .state
        .tree()
        .create(&scope, category_input(&tech, "news", None))
        .await
        .unwrap_err();
    assert!(matches!(err, BlogError::AccessDenied), "{err}");
}

// =============================================================================
// Writes outside the scope
// =============================================================================

#[tokio::test]
async fn access_check_runs_before_path_validation() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    app.create_blog("tech", &[&ed]).await;
    let other = app.create_blog("other", &[]).await;
    app.create_category(&other, "news", None).await;
    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();

    // Would also be a duplicate path; access wins.
    let err = app
        .state
        .tree()
        .create(&scope, category_input(&other, "news", None))
        .await
        .unwrap_err();
    assert!(matches!(err, BlogError::AccessDenied), "{err}");
}

#[tokio::test]
async fn editor_cannot_post_into_other_blogs() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    let tech = app.create_blog("tech", &[&ed]).await;
    let other = app.create_blog("other", &[]).await;
    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();
    let posts = app.state.posts();

    let err = posts
        .create(&scope, post_input(&other, None, "launch"))
        .await
        .unwrap_err();
    assert!(matches!(err, BlogError::AccessDenied), "{err}");

    // Nor move an own post there.
    let post = posts
        .create(&scope, post_input(&tech, None, "launch"))
        .await
        .unwrap();
    let err = posts
        .update(
            &scope,
            post.id,
            UpdatePost {
                blog_id: Some(other.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BlogError::AccessDenied), "{err}");
}

#[tokio::test]
async fn editor_cannot_link_other_blogs() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    app.create_blog("tech", &[&ed]).await;
    let other = app.create_blog("other", &[]).await;
    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();

    let err = app
        .state
        .blogs()
        .create_link(
            &scope,
            CreateLink {
                blog_id: other.id,
                name: "Rust".into(),
                link: "https://www.rust-lang.org".into(),
                published: true,
                date_available: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BlogError::AccessDenied), "{err}");
}

#[tokio::test]
async fn editor_may_update_own_blog_but_not_its_users() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    let tech = app.create_blog("tech", &[&ed]).await;
    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();
    let blogs = app.state.blogs();

    let updated = blogs
        .update(
            &scope,
            tech.id,
            UpdateBlog {
                name: Some("Technology".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Technology");

    let err = blogs
        .update(
            &scope,
            tech.id,
            UpdateBlog {
                users: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BlogError::AccessDenied), "{err}");
}

#[tokio::test]
async fn out_of_scope_lookup_reads_as_missing() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    app.create_blog("tech", &[&ed]).await;
    let other = app.create_blog("other", &[]).await;
    let news = app.create_category(&other, "news", None).await;
    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();

    let err = app.state.blogs().get(&scope, other.id).await.unwrap_err();
    assert!(matches!(err, BlogError::NotFound));
    let err = app.state.tree().get(&scope, news.id).await.unwrap_err();
    assert!(matches!(err, BlogError::NotFound));
}

// =============================================================================
// Queryset filtering
// =============================================================================

#[tokio::test]
async fn editor_listing_other_blog_categories_is_empty() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    app.create_blog("tech", &[&ed]).await;
    let other = app.create_blog("other", &[]).await;
    app.create_category(&other, "news", None).await;
    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();

    let categories = app
        .state
        .tree()
        .list(&scope, CategoryFilter::new().blog(other.id))
        .await
        .unwrap();
    assert!(categories.is_empty());
}

#[tokio::test]
async fn filtered_listing_equals_blog_in_visible_set() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    let tech = app.create_blog("tech", &[&ed]).await;
    let docs = app.create_blog("docs", &[&ed]).await;
    let other = app.create_blog("other", &[]).await;
    for blog in [&tech, &docs, &other] {
        let news = app.create_category(blog, "news", None).await;
        app.create_post(blog, Some(&news), "launch").await;
        app.create_post(blog, None, "notes").await;
    }

    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();
    let visible: BTreeSet<_> = app
        .state
        .access()
        .visible_blogs(&ed.principal)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(visible, BTreeSet::from([tech.id, docs.id]));

    let scoped = app
        .state
        .tree()
        .list(&scope, CategoryFilter::new())
        .await
        .unwrap();
    let expected: Vec<_> = app
        .store
        .list_categories(&CategoryFilter::new())
        .await
        .unwrap()
        .into_iter()
        .filter(|c| visible.contains(&c.blog_id))
        .map(|c| c.id)
        .collect();
    assert_eq!(scoped.iter().map(|c| c.id).collect::<Vec<_>>(), expected);

    let scoped = app
        .state
        .posts()
        .list(&scope, PostFilter::new())
        .await
        .unwrap();
    let expected: Vec<_> = app
        .store
        .list_posts(&PostFilter::new())
        .await
        .unwrap()
        .into_iter()
        .filter(|p| visible.contains(&p.blog_id))
        .map(|p| p.id)
        .collect();
    assert_eq!(scoped.len(), 4);
    assert_eq!(scoped.iter().map(|p| p.id).collect::<Vec<_>>(), expected);
}

#[tokio::test]
async fn unrestricted_filter_is_identity() {
    let app = TestApp::new();
    let tech = app.create_blog("tech", &[]).await;
    app.create_category(&tech, "news", None).await;

    let all = app
        .state
        .tree()
        .list(&AccessScope::Unrestricted, CategoryFilter::new())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

// =============================================================================
// Choices
// =============================================================================

#[tokio::test]
async fn blog_choices_are_restricted_for_editors() {
    let app = TestApp::new();
    let ed = app.create_user("ed", false).await;
    let tech = app.create_blog("tech", &[&ed]).await;
    app.create_blog("other", &[]).await;

    let scope = app.state.access().scope_for(&ed.principal).await.unwrap();
    let choices = app.state.blogs().choices(&scope, SITE).await.unwrap();
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].id, tech.id);

    let all = app
        .state
        .blogs()
        .choices(&AccessScope::Unrestricted, SITE)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}
