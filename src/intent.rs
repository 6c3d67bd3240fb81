use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse label for what an utterance is about.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentLabel {
    #[default]
    Start,
    Greeting,
    CourseQuery,
    EventQuery,
    FacultyQuery,
    GpaQuery,
    Goodbye,
    GeneralQuery,
}

impl IntentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Start => "START",
            IntentLabel::Greeting => "GREETING",
            IntentLabel::CourseQuery => "COURSE_QUERY",
            IntentLabel::EventQuery => "EVENT_QUERY",
            IntentLabel::FacultyQuery => "FACULTY_QUERY",
            IntentLabel::GpaQuery => "GPA_QUERY",
            IntentLabel::Goodbye => "GOODBYE",
            IntentLabel::GeneralQuery => "GENERAL_QUERY",
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule looks at the lowercased utterance.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Any of these appears as a whole whitespace-separated word.
    Word(&'static [&'static str]),
    /// Any of these appears anywhere, including inside other words.
    Substring(&'static [&'static str]),
    /// Whole word from the first list, or substring from the second.
    WordOrSubstring(&'static [&'static str], &'static [&'static str]),
}

impl Matcher {
    fn matches(&self, lower: &str, words: &[&str]) -> bool {
        let any_word = |set: &[&str]| set.iter().any(|w| words.contains(w));
        let any_sub = |set: &[&str]| set.iter().any(|s| lower.contains(s));
        match *self {
            Matcher::Word(set) => any_word(set),
            Matcher::Substring(set) => any_sub(set),
            Matcher::WordOrSubstring(w, s) => any_word(w) || any_sub(s),
        }
    }
}

/// Classification rules in priority order. The keyword sets overlap
/// ("course" and "faculty" can share a sentence), so the first hit wins.
pub const INTENT_RULES: &[(Matcher, IntentLabel)] = &[
    (
        Matcher::Word(&["hello", "hi", "hey", "hii", "helo"]),
        IntentLabel::Greeting,
    ),
    (
        Matcher::Substring(&["course", "semester", "class", "subject", "unit"]),
        IntentLabel::CourseQuery,
    ),
    (
        Matcher::Substring(&[
            "events",
            "happening",
            "upcoming",
            "event",
            "activities",
            "activity",
        ]),
        IntentLabel::EventQuery,
    ),
    (
        Matcher::Substring(&["faculty", "professor", "teacher"]),
        IntentLabel::FacultyQuery,
    ),
    (Matcher::Substring(&["gpa"]), IntentLabel::GpaQuery),
    (
        Matcher::WordOrSubstring(&["bye", "goodbye"], &["see you"]),
        IntentLabel::Goodbye,
    ),
];

/// Maps an utterance to an intent. Pure; `prior` is only reported in traces.
pub fn classify(text: &str, prior: IntentLabel) -> IntentLabel {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let next = INTENT_RULES
        .iter()
        .find(|(matcher, _)| matcher.matches(&lower, &words))
        .map(|(_, label)| *label)
        .unwrap_or(IntentLabel::GeneralQuery);

    log::trace!("intent transition {} -> {}", prior, next);
    next
}
