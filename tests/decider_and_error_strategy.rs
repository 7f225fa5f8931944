//! Exercises the decider adapter's history replay + guarded append, and the
//! `RetryThenStop` error strategy's sticky retry counter.

use eventline::reactor::decider::{Decider, DeciderReactor};
use eventline::{error_strategy::RetryThenStop, Config, Dispatcher, Message, MemoryStore, Reactor, Router, Store};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct AccountDecider;

impl Decider for AccountDecider {
    fn group_id(&self) -> &str {
        "account-decider"
    }

    fn partition_attrs(&self) -> &[String] {
        static ATTRS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        ATTRS.get_or_init(|| vec!["account_id".to_string()])
    }

    fn commands(&self) -> &[String] {
        static CMDS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        CMDS.get_or_init(|| vec!["account.deposit".to_string()])
    }

    fn evolved_types(&self) -> &[String] {
        static TYPES: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        TYPES.get_or_init(|| vec!["account.deposit".to_string(), "account.deposited".to_string()])
    }

    fn initial_state(&self) -> Value {
        json!({"balance": 0})
    }

    fn evolve(&self, state: &mut Value, message: &Message) {
        if message.message_type == "account.deposited" {
            let amount = message.payload["amount"].as_i64().unwrap_or(0);
            let balance = state["balance"].as_i64().unwrap_or(0);
            state["balance"] = json!(balance + amount);
        }
    }

    fn handle_command(&self, _state: &Value, command: &Message) -> eventline::Result<Vec<Message>> {
        let account_id = command.payload["account_id"].as_str().unwrap_or_default();
        let amount = command.payload["amount"].clone();
        Ok(vec![Message::builder(
            "account.deposited",
            json!({"account_id": account_id, "amount": amount}),
        )
        .build()])
    }
}

#[tokio::test]
async fn decider_evolves_history_and_appends_guarded_event() {
    let store = Arc::new(MemoryStore::new());
    let reactor: Arc<dyn Reactor> = Arc::new(DeciderReactor::new(AccountDecider));
    let router = Router::new(store.clone());

    store
        .append(
            vec![Message::builder("account.deposit", json!({"account_id": "A1", "amount": 100})).build()],
            None,
        )
        .await
        .unwrap();

    router.drain(&[reactor.clone()], "w1", 10).await.unwrap();

    let (events, _) = store
        .read(
            &[eventline::Condition::new("account.deposited", "account_id", "A1")],
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["amount"], json!(100));

    store
        .append(
            vec![Message::builder("account.deposit", json!({"account_id": "A1", "amount": 50})).build()],
            None,
        )
        .await
        .unwrap();
    router.drain(&[reactor], "w1", 10).await.unwrap();

    let (events, _) = store
        .read(
            &[eventline::Condition::new("account.deposited", "account_id", "A1")],
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
}

struct AlwaysFails;

#[async_trait::async_trait]
impl eventline::reactor::consumer::SimpleConsumer for AlwaysFails {
    fn group_id(&self) -> &str {
        "always-fails"
    }

    fn partition_attrs(&self) -> &[String] {
        static ATTRS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        ATTRS.get_or_init(Vec::new)
    }

    fn handled_messages(&self) -> &[String] {
        static TYPES: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        TYPES.get_or_init(|| vec!["orders.created".to_string()])
    }

    fn handle(&self, _message: &Message) -> eventline::Result<Vec<eventline::Action>> {
        Err(eventline::EventlineError::ReactorError("always fails".into()))
    }
}

#[tokio::test]
async fn retry_then_stop_stops_group_after_max_retries() {
    use eventline::reactor::consumer::SimpleConsumerReactor;

    let store = Arc::new(MemoryStore::new());
    let strategy = Arc::new(RetryThenStop::new(1, chrono::Duration::zero()));
    let reactor: Arc<dyn Reactor> = Arc::new(SimpleConsumerReactor::with_error_strategy(AlwaysFails, strategy));

    store
        .append(vec![Message::builder("orders.created", json!({})).build()], None)
        .await
        .unwrap();
    store.register_consumer_group("always-fails").await.unwrap();

    let config = Config::builder(store.clone())
        .worker_count(1)
        .catchup_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    let dispatcher = Dispatcher::start(&config, vec![reactor]).await.unwrap();

    // First failure: retry_at is immediate (zero backoff), so catch-up
    // picks it up again and it fails a second time, exceeding max_retries.
    tokio::time::sleep(Duration::from_millis(150)).await;
    dispatcher.stop().await;

    let group = store.get_consumer_group("always-fails").await.unwrap().unwrap();
    assert_eq!(group.status, eventline::GroupStatus::Stopped);
}
