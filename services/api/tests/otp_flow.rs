mod common;

use anyhow::Result;
use api_lib::testing::RecordingDelivery;
use chapterhouse_core::domain::{OtpCredential, SessionContext};
use chapterhouse_core::ports::{Clock, DatabaseService};
use chapterhouse_core::CoreError;
use chrono::Duration;
use common::Harness;

#[tokio::test]
async fn first_request_creates_account_named_after_mailbox() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();

    let account = h
        .state
        .authenticator
        .request_code(&mut session, "  Reader@Example.com ")
        .await?;

    assert_eq!(account.email, "reader@example.com");
    assert_eq!(account.name, "reader");
    assert_eq!(session.pending_account_id, Some(account.id));
    assert_eq!(session.authenticated_account_id, None);

    let code = h.delivery.last_code_for("reader@example.com").expect("code sent");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    Ok(())
}

#[tokio::test]
async fn second_request_reuses_the_account() -> Result<()> {
    let h = Harness::new();
    let mut first = SessionContext::default();
    let mut second = SessionContext::default();

    let a = h.state.authenticator.request_code(&mut first, "a@example.com").await?;
    let b = h.state.authenticator.request_code(&mut second, "a@example.com").await?;
    assert_eq!(a.id, b.id);
    Ok(())
}

#[tokio::test]
async fn empty_and_malformed_emails_are_rejected() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();

    let empty = h.state.authenticator.request_code(&mut session, "   ").await;
    assert!(matches!(empty, Err(CoreError::EmptyEmail)));

    let malformed = h.state.authenticator.request_code(&mut session, "not-an-email").await;
    assert!(matches!(malformed, Err(CoreError::InvalidEmailFormat)));

    assert_eq!(session, SessionContext::default());
    assert_eq!(h.delivery.sent_count(), 0);
    Ok(())
}

#[tokio::test]
async fn code_validates_one_second_before_expiry() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();
    let account = h.state.authenticator.request_code(&mut session, "a@example.com").await?;
    let code = h.delivery.last_code_for("a@example.com").expect("code sent");

    h.clock.advance(Duration::minutes(15) - Duration::seconds(1));
    let signed_in = h.state.authenticator.validate(&mut session, &code).await?;

    assert_eq!(signed_in.id, account.id);
    assert_eq!(session.authenticated_account_id, Some(account.id));
    assert_eq!(session.pending_account_id, None);
    Ok(())
}

#[tokio::test]
async fn code_is_expired_at_fifteen_minutes() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();
    h.state.authenticator.request_code(&mut session, "a@example.com").await?;
    let code = h.delivery.last_code_for("a@example.com").expect("code sent");

    h.clock.advance(Duration::minutes(15));
    let result = h.state.authenticator.validate(&mut session, &code).await;

    assert!(matches!(result, Err(CoreError::ExpiredCode)));
    assert_eq!(session.authenticated_account_id, None);
    Ok(())
}

#[tokio::test]
async fn expired_wrong_code_reports_expiry() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();
    let account = h.state.authenticator.request_code(&mut session, "a@example.com").await?;

    let issued_at = h.clock.now() - Duration::minutes(20);
    h.db.put_otp(
        account.id,
        OtpCredential {
            code: "123456".to_string(),
            issued_at,
        },
    )?;

    let result = h.state.authenticator.validate(&mut session, "654321").await;
    assert!(matches!(result, Err(CoreError::ExpiredCode)));
    Ok(())
}

#[tokio::test]
async fn wrong_code_keeps_the_session_pending() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();
    let account = h.state.authenticator.request_code(&mut session, "a@example.com").await?;
    let code = h.delivery.last_code_for("a@example.com").expect("code sent");
    let wrong = if code == "111111" { "222222" } else { "111111" };

    let result = h.state.authenticator.validate(&mut session, wrong).await;
    assert!(matches!(result, Err(CoreError::InvalidCode)));
    assert_eq!(session.pending_account_id, Some(account.id));

    // The right code still works afterwards.
    h.state.authenticator.validate(&mut session, &code).await?;
    Ok(())
}

#[tokio::test]
async fn code_is_single_use() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();
    let account = h.state.authenticator.request_code(&mut session, "a@example.com").await?;
    let code = h.delivery.last_code_for("a@example.com").expect("code sent");

    h.state.authenticator.validate(&mut session, &code).await?;
    assert!(h.db.get_account(account.id).await?.otp.is_none());

    // A second browser pending on the same account cannot reuse the code.
    let mut other = SessionContext {
        pending_account_id: Some(account.id),
        authenticated_account_id: None,
    };
    let replay = h.state.authenticator.validate(&mut other, &code).await;
    assert!(matches!(replay, Err(CoreError::InvalidCode)));
    Ok(())
}

#[tokio::test]
async fn racing_validations_sign_in_only_once() -> Result<()> {
    let (h, lagging) = Harness::lagging();
    let mut first = SessionContext::default();
    let account = h.state.authenticator.request_code(&mut first, "a@example.com").await?;
    let mut second = first.clone();
    let code = h.delivery.last_code_for("a@example.com").expect("code sent");

    // Both validations read the account before either clears the code.
    lagging.yield_after_account_reads(true);
    let (a, b) = tokio::join!(
        h.state.authenticator.validate(&mut first, &code),
        h.state.authenticator.validate(&mut second, &code),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(CoreError::InvalidCode))));
    let signed_in = [&first, &second]
        .iter()
        .filter(|s| s.authenticated_account_id == Some(account.id))
        .count();
    assert_eq!(signed_in, 1);
    assert!(h.db.get_account(account.id).await?.otp.is_none());
    Ok(())
}

#[tokio::test]
async fn validation_racing_a_resend_never_wipes_the_new_code() -> Result<()> {
    let (h, lagging) = Harness::lagging();
    let mut session = SessionContext::default();
    let account = h.state.authenticator.request_code(&mut session, "a@example.com").await?;
    let old = h.delivery.last_code_for("a@example.com").expect("code sent");
    let mut other_tab = session.clone();

    h.clock.advance(Duration::minutes(1));
    lagging.yield_after_account_reads(true);
    let (validated, resent) = tokio::join!(
        h.state.authenticator.validate(&mut session, &old),
        h.state.authenticator.resend_code(&mut other_tab),
    );
    resent?;
    lagging.yield_after_account_reads(false);

    // Whichever way they interleave, the code last sent is the one stored.
    let new = h.delivery.last_code_for("a@example.com").expect("code resent");
    let stored = h.db.get_account(account.id).await?.otp.expect("new code kept");
    assert_eq!(stored.code, new);

    match validated {
        Ok(_) => assert_eq!(session.authenticated_account_id, Some(account.id)),
        Err(CoreError::InvalidCode) => {
            h.state.authenticator.validate(&mut session, &new).await?;
        }
        Err(other) => panic!("unexpected validation error: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn resend_invalidates_the_previous_code() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();
    h.state.authenticator.request_code(&mut session, "a@example.com").await?;
    let first = h.delivery.last_code_for("a@example.com").expect("code sent");

    h.state.authenticator.resend_code(&mut session).await?;
    let second = h.delivery.last_code_for("a@example.com").expect("code resent");
    assert_ne!(first, second);

    let stale = h.state.authenticator.validate(&mut session, &first).await;
    assert!(matches!(stale, Err(CoreError::InvalidCode)));
    h.state.authenticator.validate(&mut session, &second).await?;
    Ok(())
}

#[tokio::test]
async fn resend_restarts_the_expiry_window() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();
    h.state.authenticator.request_code(&mut session, "a@example.com").await?;

    h.clock.advance(Duration::minutes(14));
    h.state.authenticator.resend_code(&mut session).await?;
    let code = h.delivery.last_code_for("a@example.com").expect("code resent");

    h.clock.advance(Duration::minutes(14));
    h.state.authenticator.validate(&mut session, &code).await?;
    Ok(())
}

#[tokio::test]
async fn validate_and_resend_need_a_pending_account() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();

    let validate = h.state.authenticator.validate(&mut session, "123456").await;
    assert!(matches!(validate, Err(CoreError::SessionExpired)));

    let resend = h.state.authenticator.resend_code(&mut session).await;
    assert!(matches!(resend, Err(CoreError::SessionExpired)));
    Ok(())
}

#[tokio::test]
async fn pending_reference_to_a_missing_account_is_cleared() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext {
        pending_account_id: Some(uuid::Uuid::new_v4()),
        authenticated_account_id: None,
    };

    let result = h.state.authenticator.validate(&mut session, "123456").await;
    assert!(matches!(result, Err(CoreError::SessionExpired)));
    assert_eq!(session.pending_account_id, None);
    Ok(())
}

#[tokio::test]
async fn failed_delivery_does_not_abort_the_request() -> Result<()> {
    let h = Harness::with_delivery(RecordingDelivery::failing());
    let mut session = SessionContext::default();

    let account = h.state.authenticator.request_code(&mut session, "a@example.com").await?;

    assert_eq!(session.pending_account_id, Some(account.id));
    assert!(h.db.get_account(account.id).await?.otp.is_some());
    Ok(())
}

#[tokio::test]
async fn sign_out_clears_only_the_authenticated_slot() -> Result<()> {
    let h = Harness::new();
    let mut session = SessionContext::default();
    h.state.authenticator.request_code(&mut session, "a@example.com").await?;
    let code = h.delivery.last_code_for("a@example.com").expect("code sent");
    h.state.authenticator.validate(&mut session, &code).await?;

    h.state.authenticator.sign_out(&mut session);
    assert_eq!(session, SessionContext::default());
    Ok(())
}
