use crate::intent::IntentLabel;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Maximum number of turns and intents kept per conversation.
pub const HISTORY_LIMIT: usize = 10;

/// What kind of answer the bot is currently waiting for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topic {
    AskName,
    AskDept,
    NeedSemesterNumber,
    NeedFacultyName,
    NeedCourseCode,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::AskName => "ASK_NAME",
            Topic::AskDept => "ASK_DEPT",
            Topic::NeedSemesterNumber => "NEED_SEMESTER_NUMBER",
            Topic::NeedFacultyName => "NEED_FACULTY_NAME",
            Topic::NeedCourseCode => "NEED_COURSE_CODE",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", content = "topic", rename_all = "lowercase")]
pub enum StackOp {
    Push(Topic),
    Pop(Topic),
}

impl fmt::Display for StackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackOp::Push(t) => write!(f, "PUSH: {}", t),
            StackOp::Pop(t) => write!(f, "POP: {}", t),
        }
    }
}

/// Pending topics, last element is the current obligation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TopicStack {
    items: Vec<Topic>,
    last_op: Option<StackOp>,
}

impl TopicStack {
    pub fn push(&mut self, topic: Topic) {
        self.items.push(topic);
        self.last_op = Some(StackOp::Push(topic));
    }

    /// Removes the top topic. An empty stack yields `None`, never an error.
    pub fn pop(&mut self) -> Option<Topic> {
        let topic = self.items.pop()?;
        self.last_op = Some(StackOp::Pop(topic));
        Some(topic)
    }

    pub fn peek(&self) -> Option<Topic> {
        self.items.last().copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Topic] {
        &self.items
    }

    pub fn last_op(&self) -> Option<StackOp> {
        self.last_op
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Turn {
    #[serde(rename = "query")]
    pub utterance: String,
    /// Intent classified for this utterance, not the one before it.
    pub intent: IntentLabel,
}

/// Append-only log of main-phase turns, oldest evicted first.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TurnLog {
    turns: VecDeque<Turn>,
}

impl TurnLog {
    pub fn record(&mut self, utterance: &str, intent: IntentLabel) {
        self.turns.push_back(Turn {
            utterance: utterance.to_string(),
            intent,
        });
        while self.turns.len() > HISTORY_LIMIT {
            self.turns.pop_front();
        }
    }

    /// The last `limit` turns in chronological order.
    pub fn recent(&self, limit: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(limit);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Identification sub-machine: name, then department, then the main phase.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    CollectName { awaiting: bool },
    CollectDept { name: String, awaiting: bool },
    Main { name: String, dept: String },
}

impl Default for Phase {
    fn default() -> Self {
        Phase::CollectName { awaiting: false }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub phase: Phase,
    pub intent: IntentLabel,
    pub topics: TopicStack,
    pub turns: TurnLog,
    intent_trail: VecDeque<IntentLabel>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            phase: Phase::default(),
            intent: IntentLabel::Start,
            topics: TopicStack::default(),
            turns: TurnLog::default(),
            intent_trail: VecDeque::from([IntentLabel::Start]),
        }
    }
}

impl ConversationState {
    /// Sets the current intent and appends it to the capped trail.
    pub fn enter_intent(&mut self, intent: IntentLabel) {
        self.intent = intent;
        self.intent_trail.push_back(intent);
        while self.intent_trail.len() > HISTORY_LIMIT {
            self.intent_trail.pop_front();
        }
    }

    pub fn intent_trail(&self) -> Vec<IntentLabel> {
        self.intent_trail.iter().copied().collect()
    }
}
