//! Integration tests against Redis.
//!
//! The unreachable-server test needs nothing running. The live test only runs when
//! WECOM_LOGGER_TEST_REDIS_URL points at a disposable Redis instance.

use serde_json::json;
use std::sync::Arc;
use wecom_logger::config::{Config, RedisConfig};
use wecom_logger::events::{Event, InboundMessage, LauncherType, ReplyEvent};
use wecom_logger::message::{MessageChain, Segment};
use wecom_logger::plugin::Plugin;
use wecom_logger::sink::RedisSink;

fn fast_fail() -> RedisConfig {
    RedisConfig {
        url: None,
        connect_timeout_secs: 1,
        response_timeout_secs: 1,
        connect_retries: 0,
    }
}

fn cycle(agent: &str, text: &str) -> (Event, Event) {
    let inbound = Event::inbound(InboundMessage {
        launcher_type: LauncherType::Person,
        launcher_id: "conv-live".to_string(),
        sender_id: "sender".to_string(),
        message_chain: MessageChain::new(vec![Segment::plain(text)]),
        source_platform_object: Some(json!({ "_internal_recipient": agent, "from": "C1" })),
    });
    let reply = Event::Responded(ReplyEvent {
        launcher_type: LauncherType::Person,
        launcher_id: "conv-live".to_string(),
        sender_id: "sender".to_string(),
        response_text: "Hi there".to_string(),
    });
    (inbound, reply)
}

#[tokio::test]
async fn unreachable_redis_does_not_fail_the_cycle() {
    let sink = Arc::new(RedisSink::new("redis://127.0.0.1:1/0", &fast_fail()));
    let plugin = Plugin::new(Config::default(), sink).await;

    let (inbound, reply) = cycle("A1", "Hello");
    plugin.on_event(&inbound).await;
    let outcome = plugin.on_event(&reply).await;

    assert_eq!(outcome.handled, 1);
    assert!(outcome.default_prevented);
    assert_eq!(plugin.pending_cycles().await, 0);
}

#[tokio::test]
async fn live_redis_receives_list_and_stream_entries() {
    let Ok(url) = std::env::var("WECOM_LOGGER_TEST_REDIS_URL") else {
        return;
    };
    let suffix = uuid::Uuid::new_v4().to_string();
    let mut config = Config::default();
    config.redis_key = Some(format!("wecom-logger:test:list:{suffix}"));
    config.redis_stream_prefix = Some(format!("wecom-logger:test:stream:{suffix}"));
    let list_key = config.redis_key.clone().unwrap();
    let stream_key = format!("{}:A1", config.redis_stream_prefix.clone().unwrap());

    let sink = Arc::new(RedisSink::new(url.clone(), &RedisConfig::default()));
    let plugin = Plugin::new(config, sink).await;
    let (inbound, reply) = cycle("A1", "Hello");
    plugin.on_event(&inbound).await;
    plugin.on_event(&reply).await;

    let client = redis::Client::open(url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let items: Vec<String> = redis::cmd("LRANGE")
        .arg(&list_key)
        .arg(0)
        .arg(-1)
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    let record: serde_json::Value = serde_json::from_str(&items[0]).unwrap();
    assert_eq!(record["internal_agent_id"], "A1");
    assert_eq!(record["user_message_text"], "Hello");

    let len: i64 = redis::cmd("XLEN")
        .arg(&stream_key)
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(len, 1);

    let _: i64 = redis::cmd("DEL")
        .arg(&list_key)
        .arg(&stream_key)
        .query_async(&mut conn)
        .await
        .unwrap();
}
