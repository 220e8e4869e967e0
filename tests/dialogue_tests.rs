use anyhow::Result;
use chrono::NaiveDate;

use telefit::dialogue::{validate_food_name, DialogueState, SessionContext};
use telefit::errors::ValidationError;

/// Food names are trimmed and bounded
#[tokio::test]
async fn test_food_name_dialogue_validation() -> Result<()> {
    assert_eq!(validate_food_name("  Chicken Rice Bowl ")?, "Chicken Rice Bowl");
    assert!(validate_food_name(&"a".repeat(255)).is_ok());

    assert_eq!(validate_food_name(""), Err(ValidationError::Empty));
    assert_eq!(
        validate_food_name(&"a".repeat(256)),
        Err(ValidationError::TooLong { max: 255 })
    );

    Ok(())
}

/// Dialogue states survive a serde round trip with their payloads
#[tokio::test]
async fn test_dialogue_state_serialization() -> Result<()> {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let states = vec![
        DialogueState::MainMenu,
        DialogueState::AwaitingAdjustmentInput { index: 3 },
        DialogueState::SelectingWorkoutToLog { date },
    ];

    for state in states {
        let json = serde_json::to_string(&state)?;
        let back: DialogueState = serde_json::from_str(&json)?;
        assert_eq!(back, state);
    }

    Ok(())
}

/// Only the free-text states wait for typed input
#[tokio::test]
async fn test_text_expecting_states() -> Result<()> {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    assert!(DialogueState::AwaitingLogDate.expects_text());
    assert!(DialogueState::AwaitingSaveName.expects_text());
    assert!(DialogueState::AwaitingAdjustmentInput { index: 0 }.expects_text());
    assert!(!DialogueState::ReviewingLedger.expects_text());
    assert!(!DialogueState::AwaitingLogTypeChoice { date }.expects_text());

    let ctx = SessionContext::default();
    assert!(ctx.is_initial());
    assert_eq!(ctx.selected_index(), None);
    assert_eq!(ctx.selected_date(), None);

    Ok(())
}
