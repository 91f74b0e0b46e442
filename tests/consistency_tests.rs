// Convergence tests for the denormalized chat summary and the message page
// window under concurrency and reordering

mod common;
use common::TestEnv;

use anyhow::Result;
use chrono::{Duration, Utc};
use palaver::models::{ChatKind, LastMessage, MessageKind};
use palaver::store::{DocumentStore, MESSAGE_PAGE_SIZE};

fn summary(content: &str, sender_id: &str, offset_secs: i64) -> LastMessage {
    LastMessage {
        content: content.to_string(),
        sender_id: sender_id.to_string(),
        sender_name: sender_id.to_uppercase(),
        timestamp: Utc::now() + Duration::seconds(offset_secs),
        kind: MessageKind::Text,
    }
}

/// Summary updates applied out of timestamp order must settle on the entry
/// with the highest timestamp, while every unread increment still lands.
#[tokio::test]
async fn test_summary_is_last_writer_by_timestamp() -> Result<()> {
    let env = TestEnv::new();
    let ada = env.client("u1", "Ada");
    let chat_id = ada
        .create_chat(&["u2".to_string()], ChatKind::Private, None, None)
        .await?;

    println!("\n=== Testing out-of-order summary convergence ===");

    // The newest write arrives first, the older one second
    env.store
        .apply_chat_summary(&chat_id, summary("newest", "u1", 100), &["u2".to_string()])
        .await?;
    env.store
        .apply_chat_summary(&chat_id, summary("stale", "u1", 10), &["u2".to_string()])
        .await?;

    let chat = ada.chat(&chat_id).await?;
    let last = chat.last_message.as_ref().unwrap();
    assert_eq!(last.content, "newest", "older write must not overwrite");
    assert_eq!(chat.updated_at, last.timestamp);
    // Both writes count towards unread regardless of arrival order
    assert_eq!(chat.unread_count.get("u2"), Some(&2));
    println!("✅ Highest timestamp wins, both increments applied");
    Ok(())
}

/// Many clients sending into the same chat at once. Unread increments are
/// additive, so the recipient's counter equals the total message count and
/// the summary matches one of the actually-sent messages.
#[tokio::test]
async fn test_concurrent_senders_converge() -> Result<()> {
    let env = TestEnv::new();
    let ada = env.client("u1", "Ada");
    let chat_id = ada
        .create_chat(
            &["u2".to_string(), "u3".to_string(), "u4".to_string()],
            ChatKind::Group,
            Some("load test".to_string()),
            None,
        )
        .await?;

    println!("\n=== Testing concurrent senders ===");

    let mut handles = Vec::new();
    for sender in ["u1", "u3", "u4"] {
        for i in 0..5 {
            let client = env.client(sender, sender);
            let chat_id = chat_id.clone();
            handles.push(tokio::spawn(async move {
                client
                    .send_message(&chat_id, &format!("{} #{}", sender, i), MessageKind::Text, None)
                    .await
            }));
        }
    }
    for handle in handles {
        handle.await??;
    }

    let messages = ada.list_messages(&chat_id).await?;
    assert_eq!(messages.len(), 15);

    // u2 never sent, so every message is unread for them; each sender is
    // excluded from their own increments
    let chat = ada.chat(&chat_id).await?;
    assert_eq!(chat.unread_count.get("u2"), Some(&15));
    assert_eq!(chat.unread_count.get("u1"), Some(&10));
    assert_eq!(chat.unread_count.get("u3"), Some(&10));
    assert_eq!(chat.unread_count.get("u4"), Some(&10));

    // Whatever won the summary race is a real message
    let last = chat.last_message.as_ref().unwrap();
    assert!(messages.iter().any(|m| m.content == last.content));
    println!("✅ 15 messages, additive counters, summary is a real message");
    Ok(())
}

/// The stream window keeps only the newest `MESSAGE_PAGE_SIZE` messages and
/// always yields them in ascending timestamp order.
#[tokio::test]
async fn test_message_page_keeps_newest_in_ascending_order() -> Result<()> {
    let env = TestEnv::new();
    let ada = env.client("u1", "Ada");
    let chat_id = ada
        .create_chat(&["u2".to_string()], ChatKind::Private, None, None)
        .await?;

    let total = MESSAGE_PAGE_SIZE + 10;
    for i in 0..total {
        ada.send_message(&chat_id, &format!("msg {:03}", i), MessageKind::Text, None)
            .await?;
    }

    let page = ada.list_messages(&chat_id).await?;
    assert_eq!(page.len(), MESSAGE_PAGE_SIZE);
    // Oldest ten fell off the window
    assert_eq!(page.first().unwrap().content, "msg 010");
    assert_eq!(page.last().unwrap().content, format!("msg {:03}", total - 1));
    for pair in page.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    Ok(())
}

/// Sender identity in the summary follows the winning write, even when it
/// is not the chronologically last to arrive.
#[tokio::test]
async fn test_summary_sender_fields_follow_winner() -> Result<()> {
    let env = TestEnv::new();
    let ada = env.client("u1", "Ada");
    let chat_id = ada
        .create_chat(&["u2".to_string()], ChatKind::Private, None, None)
        .await?;

    env.store
        .apply_chat_summary(&chat_id, summary("from bea", "u2", 50), &["u1".to_string()])
        .await?;
    env.store
        .apply_chat_summary(&chat_id, summary("from ada", "u1", 5), &["u2".to_string()])
        .await?;

    let chat = ada.chat(&chat_id).await?;
    let last = chat.last_message.as_ref().unwrap();
    assert_eq!(last.sender_id, "u2");
    assert_eq!(last.sender_name, "U2");
    // Losing writes still contribute their increments
    assert_eq!(chat.unread_count.get("u1"), Some(&1));
    assert_eq!(chat.unread_count.get("u2"), Some(&1));
    Ok(())
}
