mod common;

use anyhow::Result;
use chapterhouse_core::{CoreError, ProfileEdit};
use common::Harness;

#[tokio::test]
async fn profile_update_changes_name_and_bio() -> Result<()> {
    let h = Harness::new();
    let me = h.sign_in("writer@example.com").await?;

    let account = h
        .state
        .profiles
        .update(
            Some(me),
            ProfileEdit {
                name: Some("Ana Writer".to_string()),
                email: None,
                bio: Some("Writes about the sea.".to_string()),
            },
        )
        .await?;

    assert_eq!(account.name, "Ana Writer");
    assert_eq!(account.email, "writer@example.com");
    assert_eq!(account.bio.as_deref(), Some("Writes about the sea."));
    assert_eq!(h.state.profiles.current(Some(me)).await?.name, "Ana Writer");
    Ok(())
}

#[tokio::test]
async fn profile_rejects_taken_or_malformed_email() -> Result<()> {
    let h = Harness::new();
    let me = h.sign_in("writer@example.com").await?;
    h.sign_in("taken@example.com").await?;

    let edit = |email: &str| ProfileEdit {
        name: None,
        email: Some(email.to_string()),
        bio: None,
    };

    match h.state.profiles.update(Some(me), edit("taken@example.com")).await {
        Err(CoreError::Validation(errors)) => {
            assert_eq!(errors.get("email"), Some(&["has already been taken".to_string()][..]));
        }
        other => panic!("expected a validation error, got {:?}", other.map(|a| a.id)),
    }

    match h.state.profiles.update(Some(me), edit("nope")).await {
        Err(CoreError::Validation(errors)) => {
            assert_eq!(errors.get("email"), Some(&["is invalid".to_string()][..]));
        }
        other => panic!("expected a validation error, got {:?}", other.map(|a| a.id)),
    }
    Ok(())
}

#[tokio::test]
async fn profile_needs_a_signed_in_account() -> Result<()> {
    let h = Harness::new();
    assert!(matches!(
        h.state.profiles.current(None).await,
        Err(CoreError::Unauthenticated)
    ));
    Ok(())
}
