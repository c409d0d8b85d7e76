mod common;

use anyhow::Result;
use chapterhouse_core::domain::PublicationStatus;
use chapterhouse_core::ports::DatabaseService;
use chapterhouse_core::{ChapterEdit, ChapterInput, CoreError};
use common::Harness;

#[tokio::test]
async fn first_chapter_defaults_to_order_one() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;

    assert_eq!(h.state.chapters.new_chapter_order(Some(author), story.id).await?, 1);
    let chapter = h.chapter(author, story.id, None, "draft").await?;

    assert_eq!(chapter.order, 1);
    assert_eq!(chapter.status, PublicationStatus::Draft);
    assert_eq!(h.db.get_story(story.id).await?.chapters_count, 1);
    Ok(())
}

#[tokio::test]
async fn default_order_follows_the_highest_not_the_count() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;
    h.chapter(author, story.id, Some(1), "draft").await?;
    h.chapter(author, story.id, Some(3), "draft").await?;

    assert_eq!(h.state.chapters.next_order_value(story.id).await?, 4);
    let next = h.chapter(author, story.id, None, "draft").await?;
    assert_eq!(next.order, 4);
    Ok(())
}

#[tokio::test]
async fn taken_order_is_rejected_and_counter_is_unchanged() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;
    h.chapter(author, story.id, Some(2), "draft").await?;

    let result = h.chapter(author, story.id, Some(2), "draft").await;
    let err = result.expect_err("duplicate order must fail");
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Validation(errors)) => {
            assert_eq!(errors.get("order"), Some(&["has already been taken".to_string()][..]));
        }
        other => panic!("expected a validation error, got {:?}", other),
    }

    assert_eq!(h.db.get_story(story.id).await?.chapters_count, 1);
    assert_eq!(h.db.list_chapters(story.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn non_positive_order_and_blank_title_are_rejected() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;

    let input = ChapterInput {
        title: "   ".to_string(),
        content: String::new(),
        order: Some(0),
        status: None,
    };
    let result = h.state.chapters.create(Some(author), story.id, input).await;
    match result {
        Err(CoreError::Validation(errors)) => {
            assert!(errors.get("title").is_some());
            assert_eq!(errors.get("order"), Some(&["must be greater than 0".to_string()][..]));
        }
        other => panic!("expected a validation error, got {:?}", other.map(|c| c.id)),
    }
    Ok(())
}

#[tokio::test]
async fn navigation_skips_gaps() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "published").await?;
    let three = h.chapter(author, story.id, Some(3), "published").await?;
    let ten = h.chapter(author, story.id, Some(10), "published").await?;
    let five = h.chapter(author, story.id, Some(5), "published").await?;

    let next = h.state.chapters.next_chapter(&five).await?;
    let previous = h.state.chapters.previous_chapter(&five).await?;
    assert_eq!(next.map(|c| c.id), Some(ten.id));
    assert_eq!(previous.map(|c| c.id), Some(three.id));

    assert!(h.state.chapters.previous_chapter(&three).await?.is_none());
    assert!(h.state.chapters.next_chapter(&ten).await?.is_none());

    let view = h.state.chapters.show(None, story.id, five.id).await?;
    assert_eq!(view.previous.map(|c| c.order), Some(3));
    assert_eq!(view.next.map(|c| c.order), Some(10));
    Ok(())
}

#[tokio::test]
async fn publish_and_unpublish_touch_only_the_status() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;
    let draft = h.chapter(author, story.id, Some(7), "draft").await?;

    let published = h.state.chapters.publish(Some(author), story.id, draft.id).await?;
    assert_eq!(published.status, PublicationStatus::Published);
    assert_eq!(published.title, draft.title);
    assert_eq!(published.content, draft.content);
    assert_eq!(published.order, draft.order);

    // Publishing again is a no-op.
    let again = h.state.chapters.publish(Some(author), story.id, draft.id).await?;
    assert_eq!(again.status, PublicationStatus::Published);

    let back = h.state.chapters.unpublish(Some(author), story.id, draft.id).await?;
    assert_eq!(back.status, PublicationStatus::Draft);
    assert_eq!(back.order, 7);
    Ok(())
}

#[tokio::test]
async fn only_the_author_may_change_chapters() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let reader = h.sign_in("reader@example.com").await?;
    let story = h.story(author, "Tides", "published").await?;
    let chapter = h.chapter(author, story.id, Some(1), "draft").await?;

    let publish = h.state.chapters.publish(Some(reader), story.id, chapter.id).await;
    assert!(matches!(publish, Err(CoreError::Forbidden)));
    assert_eq!(h.db.get_chapter(chapter.id).await?.status, PublicationStatus::Draft);

    let anonymous = h.state.chapters.publish(None, story.id, chapter.id).await;
    assert!(matches!(anonymous, Err(CoreError::Unauthenticated)));

    let create = h
        .state
        .chapters
        .create(
            Some(reader),
            story.id,
            ChapterInput {
                title: "Intruder".to_string(),
                content: String::new(),
                order: None,
                status: None,
            },
        )
        .await;
    assert!(matches!(create, Err(CoreError::Forbidden)));
    assert_eq!(h.db.get_story(story.id).await?.chapters_count, 1);

    let destroy = h.state.chapters.destroy(Some(reader), story.id, chapter.id).await;
    assert!(matches!(destroy, Err(CoreError::Forbidden)));
    Ok(())
}

#[tokio::test]
async fn chapter_from_another_story_is_not_found() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let first = h.story(author, "First", "draft").await?;
    let second = h.story(author, "Second", "draft").await?;
    let chapter = h.chapter(author, first.id, Some(1), "draft").await?;

    let result = h.state.chapters.publish(Some(author), second.id, chapter.id).await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn update_moves_a_chapter_to_a_free_order() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;
    let one = h.chapter(author, story.id, Some(1), "draft").await?;
    h.chapter(author, story.id, Some(2), "draft").await?;

    let clash = h
        .state
        .chapters
        .update(
            Some(author),
            story.id,
            one.id,
            ChapterEdit {
                title: None,
                content: None,
                order: Some(2),
            },
        )
        .await;
    assert!(matches!(clash, Err(CoreError::Validation(_))));

    let moved = h
        .state
        .chapters
        .update(
            Some(author),
            story.id,
            one.id,
            ChapterEdit {
                title: Some("Prologue".to_string()),
                content: None,
                order: Some(5),
            },
        )
        .await?;
    assert_eq!(moved.order, 5);
    assert_eq!(moved.title, "Prologue");
    assert_eq!(moved.content, one.content);
    Ok(())
}

#[tokio::test]
async fn destroy_decrements_the_counter_and_frees_the_order() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;
    h.chapter(author, story.id, Some(1), "draft").await?;
    let two = h.chapter(author, story.id, Some(2), "draft").await?;

    h.state.chapters.destroy(Some(author), story.id, two.id).await?;

    assert_eq!(h.db.get_story(story.id).await?.chapters_count, 1);
    assert!(matches!(
        h.state.chapters.show(Some(author), story.id, two.id).await,
        Err(CoreError::NotFound(_))
    ));
    assert_eq!(h.state.chapters.next_order_value(story.id).await?, 2);
    Ok(())
}

#[tokio::test]
async fn owner_only_drafts_are_hidden_from_readers() -> Result<()> {
    let h = Harness::owner_only();
    let author = h.sign_in("author@example.com").await?;
    let reader = h.sign_in("reader@example.com").await?;
    let story = h.story(author, "Tides", "published").await?;
    let one = h.chapter(author, story.id, Some(1), "published").await?;
    let two = h.chapter(author, story.id, Some(2), "draft").await?;
    let three = h.chapter(author, story.id, Some(3), "published").await?;

    let hidden = h.state.chapters.show(Some(reader), story.id, two.id).await;
    assert!(matches!(hidden, Err(CoreError::NotFound(_))));

    // Neighbors are drawn from what the reader can see.
    let view = h.state.chapters.show(Some(reader), story.id, one.id).await?;
    assert_eq!(view.next.map(|c| c.id), Some(three.id));

    let listed = h.state.chapters.list(Some(reader), story.id).await?;
    assert_eq!(listed.len(), 2);

    let own = h.state.chapters.show(Some(author), story.id, two.id).await?;
    assert_eq!(own.chapter.id, two.id);
    Ok(())
}

#[tokio::test]
async fn order_lost_to_a_concurrent_writer_is_a_validation_error() -> Result<()> {
    let (h, lagging) = Harness::lagging();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;
    h.chapter(author, story.id, Some(1), "draft").await?;
    let two = h.chapter(author, story.id, Some(2), "draft").await?;

    // The sequencer reads the story as empty, so only the store's unique
    // index sees the collision.
    lagging.stale_chapter_lists(true);
    let created = h
        .state
        .chapters
        .create(
            Some(author),
            story.id,
            ChapterInput {
                title: "Also first".to_string(),
                content: String::new(),
                order: None,
                status: None,
            },
        )
        .await;
    match created {
        Err(CoreError::Validation(errors)) => {
            assert_eq!(errors.get("order"), Some(&["has already been taken".to_string()][..]));
        }
        other => panic!("expected a validation error, got {:?}", other.map(|c| c.id)),
    }

    let moved = h
        .state
        .chapters
        .update(
            Some(author),
            story.id,
            two.id,
            ChapterEdit {
                title: None,
                content: None,
                order: Some(1),
            },
        )
        .await;
    match moved {
        Err(CoreError::Validation(errors)) => {
            assert_eq!(errors.get("order"), Some(&["has already been taken".to_string()][..]));
        }
        other => panic!("expected a validation error, got {:?}", other.map(|c| c.id)),
    }

    lagging.stale_chapter_lists(false);
    assert_eq!(h.db.get_story(story.id).await?.chapters_count, 2);
    assert_eq!(h.db.get_chapter(two.id).await?.order, 2);
    Ok(())
}

#[tokio::test]
async fn default_order_past_the_top_of_the_range_is_a_validation_error() -> Result<()> {
    let h = Harness::new();
    let author = h.sign_in("author@example.com").await?;
    let story = h.story(author, "Tides", "draft").await?;
    h.chapter(author, story.id, Some(i32::MAX), "draft").await?;

    let next = h.state.chapters.new_chapter_order(Some(author), story.id).await;
    assert!(matches!(next, Err(CoreError::Validation(_))));

    let created = h
        .state
        .chapters
        .create(
            Some(author),
            story.id,
            ChapterInput {
                title: "Epilogue".to_string(),
                content: String::new(),
                order: None,
                status: None,
            },
        )
        .await;
    match created {
        Err(CoreError::Validation(errors)) => assert!(errors.get("order").is_some()),
        other => panic!("expected a validation error, got {:?}", other.map(|c| c.id)),
    }

    // An explicit order below the top still fits.
    let explicit = h.chapter(author, story.id, Some(2), "draft").await?;
    assert_eq!(explicit.order, 2);
    assert_eq!(h.db.get_story(story.id).await?.chapters_count, 2);
    Ok(())
}
