use crate::intent::{classify, IntentLabel};
use crate::knowledge::{Faculty, KnowledgeBase};
use crate::present;
use crate::settings::DialogueSettings;
use crate::slots::{extract_course, extract_event, extract_faculty, extract_semester};
use crate::state::{ConversationState, Phase, Topic};
use rand::seq::SliceRandom;
use std::sync::Arc;
use thiserror::Error;

pub const FAREWELLS: [&str; 4] = [
    "Goodbye! Have a great day! 👋",
    "See you later! Feel free to come back anytime.",
    "Bye! Good luck with your studies!",
    "Take care! Let me know if you need help again.",
];

const EXIT_PHRASES: &[&str] = &["bye", "goodbye", "see you", "exit", "quit", "later"];
const PREREQ_KEYWORDS: &[&str] = &["prerequisite", "prereq"];
const CALENDAR_KEYWORDS: &[&str] = &["calendar", "schedule"];
/// FAQ entry answered with the internship guide rather than plain text.
const INTERNSHIP_FAQ: &str = "internships";

const WELCOME: &str = "Welcome to University Chatbot👋";
pub const HELP_REPLY: &str = "I'm here to help! Ask me about courses, faculty, events, or more.";
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";
pub const SEMESTER_PROMPT: &str = "Which semester's courses do you want? (1–8)";
pub const SEMESTER_REPROMPT: &str = "Please enter a valid semester number (1–8).";
pub const COURSE_PROMPT: &str = "Which course do you want prerequisites for?";
pub const COURSE_REPROMPT: &str = "Please provide a valid course code (e.g., CSC201).";

#[derive(Debug, Error, PartialEq)]
pub enum DialogueError {
    #[error("empty input")]
    EmptyInput,
    #[error("no usable answer for {0}")]
    UnresolvedSlot(Topic),
    #[error("no course matches {0:?}")]
    UnknownCourse(String),
    #[error("no faculty member matches {0:?}")]
    UnknownFaculty(String),
    #[error("internal fault: {0}")]
    Internal(String),
}

impl DialogueError {
    /// The question to ask again when a slot could not be filled.
    fn reprompt(&self) -> Option<&'static str> {
        match self {
            DialogueError::UnresolvedSlot(Topic::NeedSemesterNumber) => Some(SEMESTER_REPROMPT),
            DialogueError::UnresolvedSlot(Topic::NeedCourseCode)
            | DialogueError::UnknownCourse(_) => Some(COURSE_REPROMPT),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    /// The user left; the caller should drop every trace of the session.
    pub end_session: bool,
}

impl Reply {
    fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            end_session: false,
        }
    }
}

fn contains_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lower.contains(k))
}

/// Drives one conversation turn at a time over a caller-owned state.
pub struct ConversationManager {
    kb: Arc<dyn KnowledgeBase>,
    calendar_year: i32,
}

impl ConversationManager {
    pub fn new(kb: Arc<dyn KnowledgeBase>, settings: &DialogueSettings) -> Self {
        Self {
            kb,
            calendar_year: settings.calendar_year,
        }
    }

    /// Processes one utterance. Only `EmptyInput` is returned as an error;
    /// every other failure is turned into a reply and the state is kept.
    pub fn handle_user_input(
        &self,
        state: &mut ConversationState,
        input: &str,
    ) -> Result<Reply, DialogueError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DialogueError::EmptyInput);
        }

        let lower = input.to_lowercase();
        if contains_any(&lower, EXIT_PHRASES) {
            *state = ConversationState::default();
            let text = FAREWELLS
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(FAREWELLS[0]);
            return Ok(Reply {
                text: text.to_string(),
                end_session: true,
            });
        }

        match state.phase.clone() {
            Phase::CollectName { awaiting: false } => {
                push_once(state, Topic::AskName);
                state.phase = Phase::CollectName { awaiting: true };
                Ok(Reply::say(format!("{}<br><br>What is your name?", WELCOME)))
            }
            Phase::CollectName { awaiting: true } => {
                let name = present::escape_html(input);
                state.topics.pop();
                state.topics.push(Topic::AskDept);
                let text = format!("Nice to meet you, {}! Which department are you in?", name);
                state.phase = Phase::CollectDept {
                    name,
                    awaiting: true,
                };
                Ok(Reply::say(text))
            }
            Phase::CollectDept {
                name,
                awaiting: false,
            } => {
                push_once(state, Topic::AskDept);
                let text = format!("{}, which department are you in?", name);
                state.phase = Phase::CollectDept {
                    name,
                    awaiting: true,
                };
                Ok(Reply::say(text))
            }
            Phase::CollectDept {
                name,
                awaiting: true,
            } => {
                let dept = present::escape_html(input);
                state.topics.pop();
                let text = format!("Hey {} from {}! How can I help you today?", name, dept);
                log::info!("{} from {} joined the conversation", name, dept);
                state.phase = Phase::Main { name, dept };
                Ok(Reply::say(text))
            }
            Phase::Main { .. } => Ok(Reply::say(self.main_turn(state, input))),
        }
    }

    fn main_turn(&self, state: &mut ConversationState, input: &str) -> String {
        let intent = classify(input, state.intent);
        state.enter_intent(intent);
        state.turns.record(input, intent);
        log::debug!("turn intent={} top={:?}", intent, state.topics.peek());

        let outcome = match state.topics.peek() {
            Some(Topic::NeedSemesterNumber) => self.resolve_semester(state, input),
            Some(Topic::NeedFacultyName) => Ok(self.resolve_faculty(state, input)),
            Some(Topic::NeedCourseCode) => self.resolve_course(state, input),
            // Identification markers never drive the main phase.
            Some(Topic::AskName | Topic::AskDept) | None => {
                self.direct_answer(state, input, intent)
            }
        };

        outcome.unwrap_or_else(|e| match e.reprompt() {
            Some(prompt) => {
                log::debug!("re-prompting: {}", e);
                prompt.to_string()
            }
            None => {
                log::error!("turn failed: {}", e);
                APOLOGY.to_string()
            }
        })
    }

    fn resolve_semester(
        &self,
        state: &mut ConversationState,
        input: &str,
    ) -> Result<String, DialogueError> {
        let unresolved = || DialogueError::UnresolvedSlot(Topic::NeedSemesterNumber);
        let semester = extract_semester(input).ok_or_else(unresolved)?;
        let courses = self.kb.courses_by_semester(semester);
        if courses.is_empty() {
            return Err(unresolved());
        }
        state.topics.pop();
        Ok(present::semester_courses(semester, &courses, self.kb.as_ref()))
    }

    // Unlike the semester and course prompts this one never repeats: an
    // unresolved name shows the whole faculty list and drops the topic.
    // Kept as a deliberate policy; revisit if users ask to be re-prompted.
    fn resolve_faculty(&self, state: &mut ConversationState, input: &str) -> String {
        state.topics.pop();
        match self.lookup_faculty(input) {
            Ok(member) => present::faculty_table(&[member]),
            Err(e) => {
                log::debug!("{}", e);
                self.all_faculty()
            }
        }
    }

    fn resolve_course(
        &self,
        state: &mut ConversationState,
        input: &str,
    ) -> Result<String, DialogueError> {
        let code = extract_course(input, self.kb.as_ref())
            .ok_or_else(|| DialogueError::UnknownCourse(input.to_string()))?;
        state.topics.pop();
        Ok(self.prerequisites(&code))
    }

    fn direct_answer(
        &self,
        state: &mut ConversationState,
        input: &str,
        intent: IntentLabel,
    ) -> Result<String, DialogueError> {
        let kb = self.kb.as_ref();
        let lower = input.to_lowercase();

        if contains_any(&lower, PREREQ_KEYWORDS) {
            return Ok(match extract_course(input, kb) {
                Some(code) => self.prerequisites(&code),
                None => {
                    state.topics.push(Topic::NeedCourseCode);
                    COURSE_PROMPT.to_string()
                }
            });
        }
        if contains_any(&lower, CALENDAR_KEYWORDS) {
            let groups = kb.calendar_by_year(self.calendar_year);
            return Ok(present::calendar(self.calendar_year, &groups));
        }
        if let Some(key) = kb.faq_key(input) {
            if key == INTERNSHIP_FAQ {
                let groups = kb.calendar_by_year(self.calendar_year);
                return Ok(present::internships(kb.faq(key), &groups));
            }
            return kb
                .faq(key)
                .map(str::to_string)
                .ok_or_else(|| DialogueError::Internal(format!("FAQ key {} has no answer", key)));
        }
        if let Some(event) = extract_event(input, kb) {
            return Ok(present::single_event(event));
        }

        match intent {
            IntentLabel::CourseQuery => {
                state.topics.push(Topic::NeedSemesterNumber);
                Ok(SEMESTER_PROMPT.to_string())
            }
            IntentLabel::FacultyQuery => {
                if let Some(semester) = extract_semester(input) {
                    let grouped = kb.faculty_for_semester(semester);
                    if grouped.is_empty() {
                        return Err(DialogueError::Internal(format!(
                            "no faculty on record for semester {}",
                            semester
                        )));
                    }
                    return Ok(present::semester_faculty(semester, &grouped));
                }
                Ok(match self.lookup_faculty(input) {
                    Ok(member) => present::faculty_table(&[member]),
                    Err(_) => self.all_faculty(),
                })
            }
            IntentLabel::EventQuery => Ok(present::events(kb.events())),
            IntentLabel::GpaQuery => Ok(present::gpa_guide(kb.faq("grading"))),
            _ => Ok(HELP_REPLY.to_string()),
        }
    }

    fn lookup_faculty(&self, input: &str) -> Result<&Faculty, DialogueError> {
        extract_faculty(input, self.kb.as_ref())
            .and_then(|key| self.kb.faculty_by_key(&key))
            .ok_or_else(|| DialogueError::UnknownFaculty(input.to_string()))
    }

    fn all_faculty(&self) -> String {
        let members: Vec<&Faculty> = self
            .kb
            .faculty_keys()
            .into_iter()
            .filter_map(|key| self.kb.faculty_by_key(key))
            .collect();
        present::faculty_table(&members)
    }

    fn prerequisites(&self, code: &str) -> String {
        let kb = self.kb.as_ref();
        present::prerequisites(code, kb.course_by_code(code), kb.prerequisites_of(code), kb)
    }
}

/// Identification topics are pushed at most once.
fn push_once(state: &mut ConversationState, topic: Topic) {
    if state.topics.peek() != Some(topic) {
        state.topics.push(topic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::tests::fixture;
    use crate::knowledge::StaticKnowledgeBase;
    use crate::state::StackOp;

    fn manager() -> ConversationManager {
        ConversationManager::new(
            Arc::new(fixture()),
            &DialogueSettings { calendar_year: 2026 },
        )
    }

    fn say(m: &ConversationManager, state: &mut ConversationState, text: &str) -> String {
        m.handle_user_input(state, text).unwrap().text
    }

    /// A state that has finished introductions.
    fn ready(m: &ConversationManager) -> ConversationState {
        let mut state = ConversationState::default();
        say(m, &mut state, "hello");
        say(m, &mut state, "Zara");
        say(m, &mut state, "Computer Science");
        state
    }

    #[test]
    fn first_turn_always_asks_for_name() {
        let m = manager();
        let mut state = ConversationState::default();
        let reply = say(&m, &mut state, "show me semester 3 courses");
        assert!(reply.ends_with("What is your name?"));
        assert_eq!(state.topics.items(), &[Topic::AskName]);
        assert_eq!(state.phase, Phase::CollectName { awaiting: true });
    }

    #[test]
    fn second_turn_records_name_verbatim() {
        let m = manager();
        let mut state = ConversationState::default();
        say(&m, &mut state, "hi");
        let reply = say(&m, &mut state, "  Semester Seven Sam ");
        assert_eq!(
            reply,
            "Nice to meet you, Semester Seven Sam! Which department are you in?"
        );
        assert_eq!(state.topics.items(), &[Topic::AskDept]);
        assert_eq!(
            state.phase,
            Phase::CollectDept {
                name: "Semester Seven Sam".into(),
                awaiting: true
            }
        );
    }

    #[test]
    fn department_completes_identification() {
        let m = manager();
        let state = ready(&m);
        assert!(state.topics.is_empty());
        assert_eq!(
            state.phase,
            Phase::Main {
                name: "Zara".into(),
                dept: "Computer Science".into()
            }
        );
        // Introductions are not part of the turn log.
        assert!(state.turns.is_empty());
    }

    #[test]
    fn dept_prompt_reentered_does_not_stack_twice() {
        let m = manager();
        let mut state = ConversationState::default();
        state.phase = Phase::CollectDept {
            name: "Zara".into(),
            awaiting: false,
        };
        state.topics.push(Topic::AskDept);
        let reply = say(&m, &mut state, "anything");
        assert_eq!(reply, "Zara, which department are you in?");
        assert_eq!(state.topics.items(), &[Topic::AskDept]);
    }

    #[test]
    fn course_query_waits_for_semester() {
        let m = manager();
        let mut state = ready(&m);
        assert_eq!(say(&m, &mut state, "what courses are offered"), SEMESTER_PROMPT);
        assert_eq!(state.topics.peek(), Some(Topic::NeedSemesterNumber));

        let reply = say(&m, &mut state, "I want sem 3");
        assert!(reply.contains("Semester 3 Courses"));
        assert!(reply.contains("Data Structures & Algorithms"));
        assert!(state.topics.is_empty());
        assert_eq!(state.topics.last_op(), Some(StackOp::Pop(Topic::NeedSemesterNumber)));
    }

    #[test]
    fn unresolved_semester_keeps_the_topic() {
        let m = manager();
        let mut state = ready(&m);
        state.topics.push(Topic::NeedSemesterNumber);
        assert_eq!(say(&m, &mut state, "hmm not sure"), SEMESTER_REPROMPT);
        assert_eq!(state.topics.len(), 1);
        assert_eq!(say(&m, &mut state, "semester 12"), SEMESTER_REPROMPT);
        assert_eq!(state.topics.peek(), Some(Topic::NeedSemesterNumber));
    }

    #[test]
    fn faculty_topic_pops_even_when_unresolved() {
        let m = manager();
        let mut state = ready(&m);
        state.topics.push(Topic::NeedFacultyName);
        let reply = say(&m, &mut state, "khan");
        assert!(reply.contains("Dr Ayesha Khan"));
        assert!(reply.contains("Ms Rabia Khan"));
        assert!(state.topics.is_empty());

        state.topics.push(Topic::NeedFacultyName);
        let reply = say(&m, &mut state, "Dr Omar Khalid");
        assert!(reply.contains("omar@uni.edu"));
        assert!(!reply.contains("jawad@uni.edu"));
        assert!(state.topics.is_empty());
    }

    #[test]
    fn prerequisites_inline_or_by_follow_up() {
        let m = manager();
        let mut state = ready(&m);
        let reply = say(&m, &mut state, "prerequisites for CSC301");
        assert!(reply.contains("Data Structures & Algorithms"));
        assert!(reply.contains("Theory of Automata"));
        assert!(state.topics.is_empty());

        assert_eq!(say(&m, &mut state, "what are the prereqs?"), COURSE_PROMPT);
        assert_eq!(state.topics.peek(), Some(Topic::NeedCourseCode));
        assert_eq!(say(&m, &mut state, "the hard one"), COURSE_REPROMPT);
        assert_eq!(state.topics.peek(), Some(Topic::NeedCourseCode));

        let reply = say(&m, &mut state, "compiler construction");
        assert!(reply.contains("CSC303"));
        assert!(reply.contains("Design & Analysis of Algorithms"));
        assert!(state.topics.is_empty());
    }

    #[test]
    fn pending_topic_outranks_new_questions() {
        let m = manager();
        let mut state = ready(&m);
        say(&m, &mut state, "list the subjects");
        // An event question while a semester is owed is treated as an answer.
        assert_eq!(say(&m, &mut state, "any events?"), SEMESTER_REPROMPT);
        assert_eq!(state.topics.len(), 1);
    }

    #[test]
    fn direct_answers_follow_priority() {
        let m = manager();
        let mut state = ready(&m);
        assert!(say(&m, &mut state, "show the academic calendar").contains("Academic Calendar 2026"));
        assert!(say(&m, &mut state, "when does the library open").starts_with("Library timings"));
        assert!(say(&m, &mut state, "holiday list").starts_with("University holidays"));
        assert!(say(&m, &mut state, "tell me about Tech Fest").contains("Technology exhibition"));
        assert!(say(&m, &mut state, "what is happening on campus").contains("Upcoming University Events"));
        assert!(say(&m, &mut state, "how do I calculate my gpa").contains("GPA Calculator Guide"));
        assert_eq!(say(&m, &mut state, "hello"), HELP_REPLY);
        assert!(state.topics.is_empty());
    }

    #[test]
    fn internship_questions_get_the_guide_with_deadlines() {
        let m = manager();
        let mut state = ready(&m);
        let reply = say(&m, &mut state, "any internship deadlines?");
        assert!(reply.contains("Minimum 8 weeks"));
        assert!(reply.contains("Deadlines"));
        assert!(reply.contains("Internship Registration Deadline"));
        assert!(reply.contains("April 30, 2026"));

        let reply = say(&m, &mut state, "any placement help");
        assert!(reply.contains("Internship Registration Deadline"));
    }

    #[test]
    fn introductions_are_escaped_before_echoing() {
        let m = manager();
        let mut state = ConversationState::default();
        say(&m, &mut state, "hi");
        let reply = say(&m, &mut state, "<img src=x onerror=alert(1)>");
        assert!(reply.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(!reply.contains("<img"));

        let reply = say(&m, &mut state, "R&D <b>");
        assert!(reply.contains("from R&amp;D &lt;b&gt;!"));
        assert!(!reply.contains("<b>"));
    }

    #[test]
    fn faculty_query_resolves_inline() {
        let m = manager();
        let mut state = ready(&m);
        let by_sem = say(&m, &mut state, "who are the teachers in sem 4");
        assert!(by_sem.contains("Faculty Teaching in Semester 4"));
        assert!(by_sem.contains("Dr Sana Iqbal"));

        let all = say(&m, &mut state, "list all professors");
        assert!(all.contains("Sir Jawad Ahmad"));
        assert!(all.contains("Ms Iqra Shah"));
        assert!(state.topics.is_empty());
    }

    #[test]
    fn exit_phrase_clears_everything() {
        let m = manager();
        let mut state = ready(&m);
        say(&m, &mut state, "which courses");
        let reply = m.handle_user_input(&mut state, "ok bye").unwrap();
        assert!(reply.end_session);
        assert!(FAREWELLS.contains(&reply.text.as_str()));
        assert_eq!(state, ConversationState::default());
    }

    #[test]
    fn exit_works_during_introductions() {
        let m = manager();
        let mut state = ConversationState::default();
        say(&m, &mut state, "hey");
        let reply = m.handle_user_input(&mut state, "quit").unwrap();
        assert!(reply.end_session);
        assert!(state.topics.is_empty());
    }

    #[test]
    fn empty_input_is_rejected_without_mutation() {
        let m = manager();
        let mut state = ready(&m);
        let before = state.clone();
        assert_eq!(
            m.handle_user_input(&mut state, "   "),
            Err(DialogueError::EmptyInput)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn turns_and_intents_are_logged() {
        let m = manager();
        let mut state = ready(&m);
        say(&m, &mut state, "upcoming events");
        say(&m, &mut state, "gpa");
        let turns = state.turns.recent(10);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].intent, IntentLabel::EventQuery);
        assert_eq!(turns[1].utterance, "gpa");
        assert_eq!(state.intent, IntentLabel::GpaQuery);
        assert_eq!(
            state.intent_trail(),
            vec![IntentLabel::Start, IntentLabel::EventQuery, IntentLabel::GpaQuery]
        );
    }

    #[test]
    fn internal_fault_becomes_apology_and_keeps_state() {
        let kb = StaticKnowledgeBase::from_json(
            r#"{"courses":[{"code":"CSC101","name":"Intro","semester":1,"theory_hours":2,"lab_hours":1,"credits":3}],
               "prerequisites":{},"faculty":[],"events":[],"calendar":[],"faq":[],"faq_aliases":[]}"#,
        )
        .unwrap();
        let m = ConversationManager::new(Arc::new(kb), &DialogueSettings { calendar_year: 2026 });
        let mut state = ready(&m);
        assert_eq!(say(&m, &mut state, "teachers for sem 1"), APOLOGY);
        assert_eq!(state.turns.len(), 1);
        assert_eq!(state.intent, IntentLabel::FacultyQuery);
    }
}
