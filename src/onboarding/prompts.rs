//! Texts the bot sends during onboarding and for standalone commands.
//!
//! Strings that interpolate user input are HTML-escaped because replies
//! are sent with the HTML parse mode.

use super::level;
use super::model::{UserProfile, escape_html};

// ── Onboarding ──────────────────────────────────────────────────────

pub const GREETING: &str = "Hi! 👋\n\nI'm a helper bot. I was made to find you an \
🇺🇸 English-speaking conversation partner.";

pub const ASK_NAME: &str = "What should I call you? 🙃";

pub fn already_registered(profile: &UserProfile) -> String {
    format!(
        "{}, you already have a profile. If you want to change something, send /cancel \
         and then /start again to register from scratch. Maybe you changed your name, \
         or your views 👀😆",
        escape_html(profile.name_or_placeholder())
    )
}

pub fn name_looks_like_command(input: &str) -> String {
    format!(
        "Is your name really {}? 😅\n\nLet's try again:",
        escape_html(input)
    )
}

pub fn ask_level(name: &str) -> String {
    format!(
        "Nice to meet you 🤝\n\n{}, what is your 🇺🇸 English level?",
        escape_html(name)
    )
}

pub fn unknown_level() -> String {
    format!(
        "I don't understand you 🤷🏻‍♂️... Try picking one of these:\n{}",
        level::scale_listing()
    )
}

pub fn ask_age(name: &str) -> String {
    format!(
        "Great ✨\n\nAnd now, {}, how old are you?",
        escape_html(name)
    )
}

pub fn invalid_age(name: &str, input: &str) -> String {
    format!(
        "{}, are you really {} years old? Hard to believe...\n\nLet's try once more 😉",
        escape_html(name),
        escape_html(input)
    )
}

pub fn ask_interests(name: &str) -> String {
    format!(
        "Wow! Almost done! 🔥\n\n{}, tell me what you are into and what interests you?",
        escape_html(name)
    )
}

pub fn interests_look_like_command(name: &str, input: &str) -> String {
    format!(
        "{}, are you really into {}? 🤯\n\nI, for one, like watching pigeons: their \
         behaviour reminds me of the logistic map x → rx(1 − x). 🧐\n\nAnd what do you like doing?",
        escape_html(name),
        escape_html(input)
    )
}

pub const REGISTRATION_DONE: &str = "Done! Your profile is ready! 🏁\n\nNext, send \
/available whenever you have a free minute and feel like 🗣 talking to someone.\n\n\
As Alphonse Allais said:\n\"Never put off till tomorrow what you can do the day after tomorrow\" 😉";

// ── Standalone commands ─────────────────────────────────────────────

pub const NOT_REGISTERED: &str =
    "You can't use this command until you answer all the questions 😉";

pub const CANCEL_WITHOUT_PROFILE: &str =
    "There is nothing to delete, you don't have a profile yet 😉 Send /start to create one.";

pub const PROFILE_DELETED: &str = "I deleted everything I knew about you 🗑";

pub const NOW_AVAILABLE: &str = "You set your status to 🏝 \"available\".\n\n\
If your plans change, you can always send /busy to stop searching 😏";

pub fn already_available(name: &str) -> String {
    format!(
        "No need to spam commands! 🤨\n\nTalk to people! Professionals in any field are \
         made only through blood, sweat and tears.\n\nSo, {}, get over your shyness if \
         English means something to you 😎",
        escape_html(name)
    )
}

pub const NO_PARTNER_YET: &str =
    "When I find you a partner I'll let you know – wait for the signal 🔔!";

/// Introduction of `partner`, sent to the other side of a match.
pub fn partner_found(partner: &UserProfile) -> String {
    format!(
        "I found you a conversation partner! 😎\n\nTheir name is {}, age {}, level – {}, \
         interests:\n{}\n\nBe brave and make the first move!",
        partner.html_link(),
        partner.age.map(|a| a.to_string()).unwrap_or_default(),
        partner.level_code().unwrap_or("?"),
        escape_html(partner.interests.as_deref().unwrap_or_default())
    )
}

pub const NOW_BUSY: &str = "You set your status to 🏋️‍♂️ \"busy\".\n\n\
As soon as you have a free minute again, send /available and I'll find you a partner.\n\n\
P.S. \"If you can get 1 percent better each day for one year, you'll end up thirty-seven \
times better by the time you're done\" – James Clear, Atomic Habits 😉";

// ── Hints for messages outside any flow ─────────────────────────────

pub const HINT_UNREGISTERED: &str = "Send /start to create your profile 🙂";

pub const HINT_REGISTERED: &str = "Commands: /available to look for a partner, \
/busy to stop looking, /list to see everyone, /cancel to delete your profile.";
