//! End-to-end tests for onboarding, matching and the standalone commands.
//!
//! Each test drives a real `Bot` over an in-memory libSQL store and a
//! recording channel that keeps every outbound message.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use speakmate::bot::{Bot, BotDeps};
use speakmate::channels::{
    Channel, IncomingMessage, MessageStream, OutgoingMessage, ParseMode,
};
use speakmate::error::ChannelError;
use speakmate::matching::FirstCandidate;
use speakmate::onboarding::{RegistrationState, UserProfile, prompts};
use speakmate::store::{LibSqlBackend, ProfileStore};

/// Maximum time `Bot::run` may take on a scripted stream.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Channel that replays a script and records every delivery.
#[derive(Default)]
struct RecordingChannel {
    script: Mutex<Vec<IncomingMessage>>,
    sent: Mutex<Vec<(String, OutgoingMessage)>>,
}

impl RecordingChannel {
    fn with_script(script: Vec<IncomingMessage>) -> Self {
        Self {
            script: Mutex::new(script),
            ..Default::default()
        }
    }

    fn sent_to(&self, chat_id: &str) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat, _)| chat == chat_id)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    fn texts_to(&self, chat_id: &str) -> Vec<String> {
        self.sent_to(chat_id).into_iter().map(|m| m.text).collect()
    }

    fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let script = std::mem::take(&mut *self.script.lock().unwrap());
        Ok(Box::pin(stream::iter(script)))
    }

    async fn send_text(
        &self,
        chat_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message));
        Ok(())
    }

    async fn send_typing(&self, _chat_id: &str) -> Result<(), ChannelError> {
        Ok(())
    }
}

struct Harness {
    bot: Arc<Bot>,
    store: Arc<dyn ProfileStore>,
    channel: Arc<RecordingChannel>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_channel(RecordingChannel::default()).await
    }

    async fn with_channel(channel: RecordingChannel) -> Self {
        let store: Arc<dyn ProfileStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let channel = Arc::new(channel);
        let deps = BotDeps {
            store: Arc::clone(&store),
            channel: Arc::clone(&channel) as Arc<dyn Channel>,
            picker: Arc::new(FirstCandidate),
        };
        Self {
            bot: Arc::new(Bot::new(deps, Duration::ZERO)),
            store,
            channel,
        }
    }

    /// Send `text` from `user`, whose handle equals their id.
    async fn say(&self, user: &str, text: &str) -> Option<RegistrationState> {
        let message = IncomingMessage::new("test", user, text).with_handle(user);
        self.bot.handle(&message).await.unwrap()
    }

    async fn register(&self, user: &str, name: &str, level: &str, age: &str, interests: &str) {
        self.say(user, "/start").await;
        self.say(user, name).await;
        self.say(user, level).await;
        self.say(user, age).await;
        let state = self.say(user, interests).await;
        assert_eq!(state, Some(RegistrationState::Complete), "{user} should be registered");
    }

    async fn profile(&self, user: &str) -> Option<UserProfile> {
        self.store.find_by_id(user).await.unwrap()
    }
}

#[tokio::test]
async fn onboarding_walks_through_every_question() {
    let h = Harness::new().await;

    assert_eq!(h.say("ann", "/start").await, Some(RegistrationState::AwaitingName));
    assert_eq!(h.say("ann", "Ann").await, Some(RegistrationState::AwaitingLevel));
    assert_eq!(h.say("ann", "B1").await, Some(RegistrationState::AwaitingAge));
    assert_eq!(h.say("ann", "25").await, Some(RegistrationState::AwaitingInterests));
    assert_eq!(h.say("ann", "chess").await, Some(RegistrationState::Complete));

    let ann = h.profile("ann").await.unwrap();
    assert_eq!(ann.display_name.as_deref(), Some("Ann"));
    assert_eq!(ann.proficiency_level, Some(4));
    assert_eq!(ann.age, Some(25));
    assert_eq!(ann.interests.as_deref(), Some("chess"));
    assert!(!ann.available);

    let texts = h.channel.texts_to("ann");
    assert_eq!(texts[0], prompts::GREETING);
    assert_eq!(texts[1], prompts::ASK_NAME);
    assert_eq!(texts[2], prompts::ask_level("Ann"));
    assert_eq!(texts[3], prompts::ask_age("Ann"));
    assert_eq!(texts[4], prompts::ask_interests("Ann"));
    assert_eq!(texts[5], prompts::REGISTRATION_DONE);
    assert_eq!(texts.len(), 6);
}

#[tokio::test]
async fn lone_user_becomes_available_without_partner() {
    let h = Harness::new().await;
    h.register("ann", "Ann", "B1", "25", "chess").await;
    h.channel.clear();

    assert_eq!(h.say("ann", "/available").await, Some(RegistrationState::Complete));

    assert!(h.profile("ann").await.unwrap().available);
    assert_eq!(
        h.channel.texts_to("ann"),
        vec![prompts::NOW_AVAILABLE.to_string(), prompts::NO_PARTNER_YET.to_string()]
    );
}

#[tokio::test]
async fn requester_is_paired_within_level_window() {
    let h = Harness::new().await;
    h.register("a", "A", "B1", "30", "films").await; // index 4
    h.register("b", "B", "C2", "40", "chess").await; // index 10
    h.register("c", "C", "A2+", "20", "music").await; // index 3

    h.say("a", "/available").await;
    h.say("b", "/available").await;
    h.channel.clear();

    h.say("c", "/available").await;

    let a = h.profile("a").await.unwrap();
    let c = h.profile("c").await.unwrap();
    assert_eq!(
        h.channel.texts_to("c"),
        vec![prompts::NOW_AVAILABLE.to_string(), prompts::partner_found(&a)]
    );
    assert_eq!(h.channel.texts_to("a"), vec![prompts::partner_found(&c)]);
    assert!(h.channel.texts_to("b").is_empty());

    let intro = &h.channel.sent_to("c")[1];
    assert_eq!(intro.parse_mode, Some(ParseMode::Html));
    assert!(intro.text.contains("A (@a)"));
    assert!(intro.text.contains("B1"));

    // Matching leaves everyone available.
    for user in ["a", "b", "c"] {
        assert!(h.profile(user).await.unwrap().available, "{user}");
    }
}

#[tokio::test]
async fn command_shaped_name_is_rejected() {
    let h = Harness::new().await;
    h.say("ann", "/start").await;
    h.channel.clear();

    assert_eq!(h.say("ann", "/help").await, Some(RegistrationState::AwaitingName));
    assert_eq!(h.profile("ann").await.unwrap().display_name, None);
    assert_eq!(
        h.channel.texts_to("ann"),
        vec![prompts::name_looks_like_command("/help")]
    );

    assert_eq!(h.say("ann", "Ann").await, Some(RegistrationState::AwaitingLevel));
}

#[tokio::test]
async fn known_commands_mid_onboarding_are_gated() {
    let h = Harness::new().await;
    h.say("ann", "/start").await;
    h.say("ann", "Ann").await;
    h.say("ann", "B1").await;
    h.channel.clear();

    for command in ["/busy", "/available", "/list"] {
        assert_eq!(h.say("ann", command).await, Some(RegistrationState::AwaitingAge), "{command}");
    }

    let ann = h.profile("ann").await.unwrap();
    assert_eq!(ann.age, None);
    assert!(!ann.available);
    assert_eq!(
        h.channel.texts_to("ann"),
        vec![prompts::NOT_REGISTERED.to_string(); 3]
    );

    // The pending question still takes its answer afterwards.
    assert_eq!(h.say("ann", "25").await, Some(RegistrationState::AwaitingInterests));
}

#[tokio::test]
async fn every_step_rejects_bad_answers_without_writing() {
    let h = Harness::new().await;
    h.say("ann", "/start").await;
    h.say("ann", "Ann").await;

    for bad in ["D1", "B3", "/levels", ""] {
        assert_eq!(h.say("ann", bad).await, Some(RegistrationState::AwaitingLevel), "{bad:?}");
    }
    assert_eq!(h.profile("ann").await.unwrap().proficiency_level, None);

    h.say("ann", "c1+").await;
    for bad in ["abc", "0", "121", "25.5", "-5", "２５"] {
        assert_eq!(h.say("ann", bad).await, Some(RegistrationState::AwaitingAge), "{bad:?}");
    }
    assert_eq!(h.profile("ann").await.unwrap().age, None);

    h.say("ann", "120").await;
    assert_eq!(h.say("ann", "/hobbies").await, Some(RegistrationState::AwaitingInterests));
    assert_eq!(h.profile("ann").await.unwrap().interests, None);

    h.say("ann", "pigeons").await;
    let ann = h.profile("ann").await.unwrap();
    assert_eq!(ann.proficiency_level, Some(9));
    assert_eq!(ann.age, Some(120));
    assert_eq!(ann.interests.as_deref(), Some("pigeons"));
}

#[tokio::test]
async fn cyrillic_level_spelling_is_accepted() {
    let h = Harness::new().await;
    h.say("ann", "/start").await;
    h.say("ann", "Ann").await;

    assert_eq!(h.say("ann", "в2+").await, Some(RegistrationState::AwaitingAge));
    assert_eq!(h.profile("ann").await.unwrap().proficiency_level, Some(7));
}

#[tokio::test]
async fn second_available_is_a_no_op() {
    let h = Harness::new().await;
    h.register("ann", "Ann", "B1", "25", "chess").await;
    h.say("ann", "/available").await;
    h.channel.clear();

    h.say("ann", "/available").await;

    assert!(h.profile("ann").await.unwrap().available);
    assert_eq!(h.channel.texts_to("ann"), vec![prompts::already_available("Ann")]);
}

#[tokio::test]
async fn busy_clears_availability() {
    let h = Harness::new().await;
    h.register("ann", "Ann", "B1", "25", "chess").await;
    h.say("ann", "/available").await;
    h.channel.clear();

    h.say("ann", "/busy").await;
    h.say("ann", "/busy").await;

    assert!(!h.profile("ann").await.unwrap().available);
    assert_eq!(
        h.channel.texts_to("ann"),
        vec![prompts::NOW_BUSY.to_string(), prompts::NOW_BUSY.to_string()]
    );
}

#[tokio::test]
async fn cancel_removes_profile_everywhere() {
    let h = Harness::new().await;
    h.register("ann", "Ann", "B1", "25", "chess").await;
    h.register("bob", "Bob", "B1", "30", "go").await;
    h.say("ann", "/available").await;
    h.channel.clear();

    assert_eq!(h.say("ann", "/cancel").await, None);
    assert!(h.profile("ann").await.is_none());
    assert_eq!(h.channel.texts_to("ann"), vec![prompts::PROFILE_DELETED.to_string()]);

    h.say("bob", "/list").await;
    let listing = h.channel.texts_to("bob").pop().unwrap();
    assert!(!listing.contains("Ann"));
    assert!(listing.contains("Bob (@bob)"));

    h.channel.clear();
    h.say("bob", "/available").await;
    assert_eq!(
        h.channel.texts_to("bob"),
        vec![prompts::NOW_AVAILABLE.to_string(), prompts::NO_PARTNER_YET.to_string()]
    );

    h.channel.clear();
    h.say("ann", "/available").await;
    assert_eq!(h.channel.texts_to("ann"), vec![prompts::NOT_REGISTERED.to_string()]);
}

#[tokio::test]
async fn cancel_works_mid_onboarding_and_without_profile() {
    let h = Harness::new().await;

    assert_eq!(h.say("ann", "/cancel").await, None);
    assert_eq!(
        h.channel.texts_to("ann"),
        vec![prompts::CANCEL_WITHOUT_PROFILE.to_string()]
    );

    h.say("ann", "/start").await;
    h.say("ann", "Ann").await;
    h.channel.clear();

    assert_eq!(h.say("ann", "/cancel@speakmate_bot").await, None);
    assert!(h.profile("ann").await.is_none());
    assert_eq!(h.channel.texts_to("ann"), vec![prompts::PROFILE_DELETED.to_string()]);

    // A fresh /start begins from scratch.
    assert_eq!(h.say("ann", "/start").await, Some(RegistrationState::AwaitingName));
}

#[tokio::test]
async fn repeated_start_keeps_existing_profile() {
    let h = Harness::new().await;
    h.say("ann", "/start").await;
    h.say("ann", "Ann").await;
    h.channel.clear();

    assert_eq!(h.say("ann", "/start").await, Some(RegistrationState::AwaitingLevel));

    let ann = h.profile("ann").await.unwrap();
    assert_eq!(ann.display_name.as_deref(), Some("Ann"));
    assert_eq!(h.channel.texts_to("ann"), vec![prompts::already_registered(&ann)]);
}

#[tokio::test]
async fn list_shows_every_profile_including_unfinished() {
    let h = Harness::new().await;
    h.register("ann", "Ann", "B1", "25", "chess").await;
    h.say("bo", "/start").await;
    h.say("bo", "Bo").await;
    h.channel.clear();

    h.say("ann", "/list").await;

    let sent = h.channel.sent_to("ann");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].parse_mode, Some(ParseMode::Html));
    assert!(sent[0].disable_link_preview);
    assert_eq!(
        sent[0].text,
        "Ann (@ann) | B1 | 25 y.o.\nBo (@bo) | ? | ? y.o."
    );
}

#[tokio::test]
async fn commands_need_a_finished_profile() {
    let h = Harness::new().await;

    assert_eq!(h.say("ann", "/list").await, None);
    assert_eq!(h.channel.texts_to("ann"), vec![prompts::NOT_REGISTERED.to_string()]);
    assert!(h.profile("ann").await.is_none());
}

#[tokio::test]
async fn stray_messages_get_a_hint() {
    let h = Harness::new().await;

    assert_eq!(h.say("ann", "hello?").await, None);
    assert_eq!(h.channel.texts_to("ann"), vec![prompts::HINT_UNREGISTERED.to_string()]);

    h.register("ann", "Ann", "B1", "25", "chess").await;
    h.channel.clear();

    h.say("ann", "hello again").await;
    h.say("ann", "/help").await;
    assert_eq!(
        h.channel.texts_to("ann"),
        vec![prompts::HINT_REGISTERED.to_string(), prompts::HINT_REGISTERED.to_string()]
    );
    assert!(!h.profile("ann").await.unwrap().available);
}

#[tokio::test]
async fn concurrent_starts_create_one_profile() {
    let h = Harness::new().await;
    let first = IncomingMessage::new("test", "ann", "/start");
    let second = first.clone();

    let (a, b) = tokio::join!(h.bot.handle(&first), h.bot.handle(&second));
    assert_eq!(a.unwrap(), Some(RegistrationState::AwaitingName));
    assert_eq!(b.unwrap(), Some(RegistrationState::AwaitingName));

    assert_eq!(h.store.find_all().await.unwrap().len(), 1);
    let greetings = h
        .channel
        .texts_to("ann")
        .into_iter()
        .filter(|t| t == prompts::GREETING)
        .count();
    assert_eq!(greetings, 1);
}

#[tokio::test]
async fn simultaneous_available_pairs_the_two_users() {
    let h = Harness::new().await;
    h.register("a", "A", "B1", "30", "films").await;
    h.register("b", "B", "B2", "25", "chess").await;
    h.channel.clear();

    let from_a = IncomingMessage::new("test", "a", "/available").with_handle("a");
    let from_b = IncomingMessage::new("test", "b", "/available").with_handle("b");
    let (ra, rb) = tokio::join!(h.bot.handle(&from_a), h.bot.handle(&from_b));
    ra.unwrap();
    rb.unwrap();

    let a = h.profile("a").await.unwrap();
    let b = h.profile("b").await.unwrap();
    let a_texts = h.channel.texts_to("a");
    let b_texts = h.channel.texts_to("b");
    assert_eq!(
        a_texts.iter().filter(|t| **t == prompts::partner_found(&b)).count(),
        1
    );
    assert_eq!(
        b_texts.iter().filter(|t| **t == prompts::partner_found(&a)).count(),
        1
    );
    let misses = a_texts
        .iter()
        .chain(&b_texts)
        .filter(|t| *t == prompts::NO_PARTNER_YET)
        .count();
    assert_eq!(misses, 1);
}

#[tokio::test]
async fn run_handles_scripted_stream_and_stops() {
    let script = ["ann", "bob", "cid"]
        .into_iter()
        .map(|user| IncomingMessage::new("test", user, "/start"))
        .collect();
    let h = Harness::with_channel(RecordingChannel::with_script(script)).await;

    tokio::time::timeout(TEST_TIMEOUT, Arc::clone(&h.bot).run())
        .await
        .expect("run should stop when the stream ends")
        .unwrap();

    assert_eq!(h.store.find_all().await.unwrap().len(), 3);
    for user in ["ann", "bob", "cid"] {
        assert_eq!(
            h.channel.texts_to(user),
            vec![prompts::GREETING.to_string(), prompts::ASK_NAME.to_string()]
        );
    }
}
