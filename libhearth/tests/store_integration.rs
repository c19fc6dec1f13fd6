//! Store integration tests
//!
//! Drive a `Store` end to end against `MockApi`: pagination, live
//! announcements, acknowledgement with partial failures, interactions and
//! the failure policy.

use anyhow::Result;
use libhearth::api::mock::MockApi;
use libhearth::error::ApiError;
use libhearth::notify::{Level, Notifier};
use libhearth::publisher::{PublishForm, PublishOutcome, Publisher};
use libhearth::store::{Action, Store};
use libhearth::streams::StreamDescriptor;
use libhearth::types::{Content, Profile};
use std::collections::HashSet;
use std::sync::Arc;

fn alice() -> Profile {
    Profile::new("1", "alice@social.example")
}

fn content(id: &str) -> Content {
    Content::new(id, alice(), format!("<p>post {}</p>", id))
}

fn contents(ids: &[&str]) -> Vec<Content> {
    ids.iter().map(|id| content(id)).collect()
}

fn store_for(api: &MockApi, stream: StreamDescriptor) -> (Store, Notifier) {
    let notifier = Notifier::default();
    let store = Store::new(stream, Arc::new(api.clone()), notifier.clone());
    (store, notifier)
}

fn visible(store: &Store) -> Vec<&str> {
    store
        .state()
        .current_content_ids
        .iter()
        .map(String::as_str)
        .collect()
}

fn buffered(store: &Store) -> Vec<&str> {
    store
        .state()
        .unfetched_content_ids
        .iter()
        .map(String::as_str)
        .collect()
}

fn flagged(store: &Store) -> Vec<&str> {
    let mut flagged: Vec<&str> = store
        .state()
        .contents
        .values()
        .filter(|c| c.has_load_more)
        .map(|c| c.id.as_str())
        .collect();
    flagged.sort();
    flagged
}

fn assert_id_invariants(store: &Store) {
    let state = store.state();
    let all: HashSet<&String> = state.all_content_ids.iter().collect();
    assert_eq!(all.len(), state.all_content_ids.len(), "duplicate in all ids");

    let current: HashSet<&String> = state.current_content_ids.iter().collect();
    assert_eq!(
        current.len(),
        state.current_content_ids.len(),
        "duplicate in visible ids"
    );
    assert!(current.is_subset(&all), "visible ids not a subset of all ids");

    for id in &state.unfetched_content_ids {
        assert!(!current.contains(id), "buffered id {} is visible", id);
    }
}

#[tokio::test]
async fn test_second_page_flags_last_of_short_batch() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1", "2", "6", "7"]));
    api.set_page_size(2);
    let (mut store, _) = store_for(&api, StreamDescriptor::public());

    store.dispatch(Action::FetchStream).await?;
    assert_eq!(visible(&store), ["1", "2"]);
    assert_eq!(flagged(&store), ["2"]);

    store.dispatch(Action::LoadMore).await?;
    assert_eq!(visible(&store), ["1", "2", "6", "7"]);
    assert_eq!(flagged(&store), ["7"]);

    assert_eq!(
        api.calls()[1],
        ("fetch_stream".to_string(), String::new())
    );
    assert_id_invariants(&store);
    Ok(())
}

#[tokio::test]
async fn test_full_page_flags_fifth_from_last() -> Result<()> {
    let ids: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let api = MockApi::with_stream(contents(&refs));
    api.set_page_size(8);
    let (mut store, _) = store_for(&api, StreamDescriptor::public());

    store.dispatch(Action::FetchStream).await?;
    assert_eq!(flagged(&store), ["4"]);

    store.dispatch(Action::LoadMore).await?;
    // 9..=12 is a batch of four
    assert_eq!(flagged(&store), ["12"]);
    assert_eq!(store.state().current_content_ids.len(), 12);
    Ok(())
}

#[tokio::test]
async fn test_load_more_uses_through_cursor() -> Result<()> {
    let mut share = content("30").share_of("3");
    share.through = Some("300".to_string());
    let api = MockApi::with_stream(vec![content("1"), share]);
    let (mut store, _) = store_for(&api, StreamDescriptor::followed());

    store.dispatch(Action::FetchStream).await?;
    assert_eq!(store.state().last_cursor().as_deref(), Some("300"));
    Ok(())
}

#[tokio::test]
async fn test_refetching_a_page_creates_no_duplicates() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1", "2", "3"]));
    let (mut store, _) = store_for(&api, StreamDescriptor::local());

    store.dispatch(Action::FetchStream).await?;
    store.dispatch(Action::FetchStream).await?;
    store.dispatch(Action::LoadMore).await?;

    // The last page came back empty, so nothing carries the marker
    assert_eq!(visible(&store), ["1", "2", "3"]);
    assert!(flagged(&store).is_empty());
    assert_id_invariants(&store);
    Ok(())
}

#[tokio::test]
async fn test_announcements_fill_the_buffer() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1", "2"]));
    let (mut store, _) = store_for(&api, StreamDescriptor::public());
    store.dispatch(Action::FetchStream).await?;

    for id in ["8", "7", "6", "7", "1"] {
        store
            .dispatch(Action::LiveAnnouncement {
                id: id.to_string(),
                parent_id: None,
            })
            .await?;
    }

    assert_eq!(buffered(&store), ["6", "7", "8"]);
    assert_eq!(store.state().new_content_count(), 3);
    assert_id_invariants(&store);
    Ok(())
}

#[tokio::test]
async fn test_reply_announcement_bumps_parent_only() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1"]));
    let (mut store, _) = store_for(&api, StreamDescriptor::public());
    store.dispatch(Action::FetchStream).await?;

    store
        .dispatch(Action::LiveAnnouncement {
            id: "20".to_string(),
            parent_id: Some("1".to_string()),
        })
        .await?;
    store
        .dispatch(Action::LiveAnnouncement {
            id: "21".to_string(),
            parent_id: Some("unknown".to_string()),
        })
        .await?;

    assert_eq!(store.state().content("1").map(|c| c.reply_count), Some(1));
    assert!(!store.state().has_new_content());
    Ok(())
}

#[tokio::test]
async fn test_acknowledge_with_one_failure() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1", "2"]));
    let (mut store, notifier) = store_for(&api, StreamDescriptor::public());
    store.dispatch(Action::FetchStream).await?;

    for id in ["8", "7", "6"] {
        api.announce(content(id));
        store
            .dispatch(Action::LiveAnnouncement {
                id: id.to_string(),
                parent_id: None,
            })
            .await?;
    }
    assert_eq!(buffered(&store), ["6", "7", "8"]);

    api.fail_ids(&["7"]);
    let mut notifications = notifier.subscribe();
    let summary = store.acknowledge_new_content().await?;

    assert_eq!(summary.merged, ["6", "8"]);
    assert_eq!(summary.requeued, ["7"]);
    assert_eq!(visible(&store), ["6", "8", "1", "2"]);
    assert_eq!(buffered(&store), ["7"]);
    assert!(!store.state().pending.new_content);
    assert_eq!(notifications.recv().await?.level, Level::Warning);
    assert_eq!(api.call_count("fetch_stream"), 4);

    api.clear_failures();
    store.dispatch(Action::AcknowledgeNewContent).await?;
    assert_eq!(visible(&store), ["7", "6", "8", "1", "2"]);
    assert!(!store.state().has_new_content());
    assert_id_invariants(&store);
    Ok(())
}

#[tokio::test]
async fn test_acknowledge_drops_ids_the_server_hides() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1"]));
    let (mut store, _) = store_for(&api, StreamDescriptor::public());
    store.dispatch(Action::FetchStream).await?;

    store
        .dispatch(Action::LiveAnnouncement {
            id: "99".to_string(),
            parent_id: None,
        })
        .await?;
    let summary = store.acknowledge_new_content().await?;

    assert_eq!(summary.dropped, ["99"]);
    assert_eq!(visible(&store), ["1"]);
    assert!(!store.state().has_new_content());
    Ok(())
}

#[tokio::test]
async fn test_acknowledge_on_empty_buffer_makes_no_request() -> Result<()> {
    let api = MockApi::new();
    let (mut store, _) = store_for(&api, StreamDescriptor::public());

    let summary = store.acknowledge_new_content().await?;
    assert!(summary.merged.is_empty());
    assert_eq!(api.call_count("fetch_stream"), 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_fetch_leaves_state_and_notifies() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1", "2"]));
    let (mut store, notifier) = store_for(&api, StreamDescriptor::public());
    store.dispatch(Action::FetchStream).await?;

    api.fail_with(ApiError::Server {
        status: 502,
        message: "Bad gateway".to_string(),
    });
    let mut notifications = notifier.subscribe();
    assert_eq!(store.state().load_more_marker().map(String::as_str), Some("2"));

    let result = store.dispatch(Action::LoadMore).await;
    assert!(result.is_err());
    assert_eq!(visible(&store), ["1", "2"]);
    assert!(!store.state().pending.any());
    assert_eq!(store.state().load_more_marker().map(String::as_str), Some("2"));

    let notification = notifications.recv().await?;
    assert_eq!(notification.level, Level::Error);
    assert!(notification.message.contains("502"));

    // Paging still works once the server recovers
    api.clear_failures();
    store.dispatch(Action::LoadMore).await?;
    assert_eq!(visible(&store), ["1", "2"]);
    assert!(flagged(&store).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_replies_and_shares_attach_without_duplicates() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1"]));
    api.set_replies(
        "1",
        vec![content("10").reply_to("1"), content("11").reply_to("1")],
    );
    api.set_shares("1", vec![content("12").share_of("1")]);
    let (mut store, _) = store_for(&api, StreamDescriptor::public());
    store.dispatch(Action::FetchStream).await?;

    store.dispatch(Action::FetchReplies("1".to_string())).await?;
    store.dispatch(Action::FetchReplies("1".to_string())).await?;
    store.dispatch(Action::FetchShares("1".to_string())).await?;

    let state = store.state();
    let replies: Vec<&str> = state.replies_of("1").iter().map(|c| c.id.as_str()).collect();
    assert_eq!(replies, ["10", "11"]);
    assert_eq!(state.content("1").map(|c| c.reply_count), Some(2));
    assert_eq!(state.shares_of("1").len(), 1);
    assert_eq!(state.content("1").map(|c| c.shares_count), Some(1));
    assert_eq!(visible(&store), ["1"]);
    assert_id_invariants(&store);
    Ok(())
}

#[tokio::test]
async fn test_share_and_unshare() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1", "2"]));
    let (mut store, _) = store_for(&api, StreamDescriptor::public());
    store.dispatch(Action::FetchStream).await?;

    store.dispatch(Action::Share("1".to_string())).await?;
    let shared = store.state().content("1").cloned();
    assert_eq!(shared.as_ref().map(|c| c.user_has_shared), Some(true));
    assert_eq!(shared.map(|c| c.shares_count), Some(1));

    store.dispatch(Action::Unshare("1".to_string())).await?;
    assert_eq!(store.state().content("1").map(|c| c.shares_count), Some(0));

    api.fail_ids(&["2"]);
    assert!(store.dispatch(Action::Share("2".to_string())).await.is_err());
    assert_eq!(
        store.state().content("2").map(|c| c.user_has_shared),
        Some(false)
    );
    Ok(())
}

#[tokio::test]
async fn test_single_content_view() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1", "2"]));
    api.set_replies("2", vec![content("20").reply_to("2")]);
    let (mut store, _) = store_for(&api, StreamDescriptor::content("2"));

    store.dispatch(Action::FetchStream).await?;
    store.dispatch(Action::LoadMore).await?;

    assert_eq!(visible(&store), ["2"]);
    assert_eq!(store.state().replies_of("2").len(), 1);
    assert_eq!(api.call_count("fetch_stream"), 0);
    assert_eq!(api.call_count("fetch_content"), 1);
    Ok(())
}

#[tokio::test]
async fn test_profile_follow_flow() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1"]));
    let mut profile = alice();
    profile.name = "Alice".to_string();
    api.set_profile(profile);
    let (mut store, _) = store_for(&api, StreamDescriptor::profile_all("1"));

    store.dispatch(Action::FetchStream).await?;
    store.dispatch(Action::FetchProfile("1".to_string())).await?;
    assert_eq!(
        store.state().content("1").map(|c| c.author.display_name()),
        Some("Alice")
    );

    store.dispatch(Action::Follow("1".to_string())).await?;
    assert!(store.state().profiles["1"].user_following);
    assert_eq!(
        store.state().content("1").map(|c| c.author.user_following),
        Some(true)
    );

    store.dispatch(Action::Unfollow("1".to_string())).await?;
    assert!(!store.state().profiles["1"].user_following);

    store
        .dispatch(Action::ScheduleProfileUpdate("1".to_string()))
        .await?;
    assert_eq!(api.call_count("schedule_profile_update"), 1);
    Ok(())
}

#[tokio::test]
async fn test_switch_stream_resets_state() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1"]));
    let (mut store, _) = store_for(&api, StreamDescriptor::public());
    store.dispatch(Action::FetchStream).await?;

    store
        .dispatch(Action::SwitchStream(StreamDescriptor::tag("rust")))
        .await?;
    assert!(store.state().contents.is_empty());
    assert_eq!(store.state().stream, StreamDescriptor::tag("rust"));
    Ok(())
}

#[tokio::test]
async fn test_published_reply_lands_under_parent() -> Result<()> {
    let api = MockApi::with_stream(contents(&["1"]));
    let (mut store, notifier) = store_for(&api, StreamDescriptor::public());
    let publisher = Publisher::new(
        Arc::new(api.clone()),
        notifier,
        "https://social.example",
    );
    store.dispatch(Action::FetchStream).await?;

    let outcome = publisher
        .publish(&PublishForm::reply_to("1", "nice post"))
        .await?;
    let PublishOutcome::Published { content, .. } = outcome else {
        panic!("reply was rejected");
    };
    let reply_id = content.id.clone();
    store.dispatch(Action::ContentPublished(content)).await?;

    let top = publisher.publish(&PublishForm::new("hello")).await?;
    let PublishOutcome::Published { content: post, .. } = top else {
        panic!("post was rejected");
    };
    let post_id = post.id.clone();
    store.dispatch(Action::ContentPublished(post)).await?;

    let state = store.state();
    assert_eq!(state.content("1").map(|c| c.reply_count), Some(1));
    assert_eq!(state.replies_of("1")[0].id, reply_id);
    assert_eq!(state.current_content_ids[0], post_id);
    assert!(!state.is_visible(&reply_id));
    assert_id_invariants(&store);
    Ok(())
}
