use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;

/// Honorifics stripped from faculty names to build their lookup keys.
pub const TITLES: &[&str] = &["sir ", "miss ", "mr ", "ms ", "dr ", "prof "];

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Course {
    pub code: String,
    pub name: String,
    pub semester: u8,
    pub theory_hours: u32,
    pub lab_hours: u32,
    pub credits: u32,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Faculty {
    pub name: String,
    pub designation: String,
    pub department: String,
    pub email: String,
    pub courses: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Event {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub date: String,
    pub time: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CalendarEntry {
    pub name: String,
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Calendar entries of one category (e.g. `SPRING_2026`), already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarGroup {
    pub category: String,
    pub entries: Vec<(NaiveDate, CalendarEntry)>,
}

/// Read-only lookups the dialogue engine depends on.
pub trait KnowledgeBase: Send + Sync {
    fn courses_by_semester(&self, semester: u8) -> Vec<&Course>;
    fn course_by_code(&self, code: &str) -> Option<&Course>;
    /// All courses in semester order.
    fn courses(&self) -> &[Course];
    /// `None` when the course has no prerequisite record at all.
    fn prerequisites_of(&self, code: &str) -> Option<&[String]>;
    fn faculty_by_key(&self, key: &str) -> Option<&Faculty>;
    /// Faculty keys in catalogue order.
    fn faculty_keys(&self) -> Vec<&str>;
    fn instructor_of(&self, code: &str) -> Option<&Faculty>;
    /// Faculty teaching in a semester, with the courses they teach there.
    fn faculty_for_semester(&self, semester: u8) -> Vec<(&Faculty, Vec<&Course>)>;
    fn events(&self) -> &[Event];
    fn event_by_name_substring(&self, text: &str) -> Option<&Event>;
    fn faq(&self, key: &str) -> Option<&str>;
    /// The FAQ key a question refers to, if any.
    fn faq_key(&self, text: &str) -> Option<&str>;
    fn faq_lookup(&self, text: &str) -> Option<&str> {
        self.faq_key(text).and_then(|key| self.faq(key))
    }
    fn calendar_by_year(&self, year: i32) -> Vec<CalendarGroup>;
}

#[derive(Deserialize)]
struct FaqItem {
    key: String,
    answer: String,
}

#[derive(Deserialize)]
struct FaqAlias {
    phrase: String,
    key: String,
}

#[derive(Deserialize)]
struct CalendarCategory {
    category: String,
    entries: Vec<CalendarEntry>,
}

#[derive(Deserialize)]
struct KnowledgeFile {
    courses: Vec<Course>,
    prerequisites: HashMap<String, Vec<String>>,
    faculty: Vec<Faculty>,
    events: Vec<Event>,
    calendar: Vec<CalendarCategory>,
    faq: Vec<FaqItem>,
    faq_aliases: Vec<FaqAlias>,
}

/// Knowledge base loaded once from a JSON catalogue.
pub struct StaticKnowledgeBase {
    courses: Vec<Course>,
    prerequisites: HashMap<String, Vec<String>>,
    faculty: Vec<(String, Faculty)>,
    events: Vec<Event>,
    calendar: Vec<CalendarCategory>,
    faq: Vec<(String, String)>,
    faq_aliases: Vec<(String, String)>,
}

/// Lowercases a display name and drops honorifics: "Dr Ayesha Khan" -> "ayesha khan".
pub fn faculty_key(name: &str) -> String {
    let mut key = name.to_lowercase();
    for title in TITLES {
        key = key.replace(title, "");
    }
    key.trim().to_string()
}

impl StaticKnowledgeBase {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = read_to_string(path_ref)
            .with_context(|| format!("reading knowledge file {:?}", path_ref))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let data: KnowledgeFile =
            serde_json::from_str(content).context("parsing knowledge file")?;
        let mut courses = data.courses;
        courses.sort_by_key(|c| c.semester);
        let faculty = data
            .faculty
            .into_iter()
            .map(|f| (faculty_key(&f.name), f))
            .collect();
        Ok(Self {
            courses,
            prerequisites: data.prerequisites,
            faculty,
            events: data.events,
            calendar: data.calendar,
            faq: data.faq.into_iter().map(|i| (i.key, i.answer)).collect(),
            faq_aliases: data
                .faq_aliases
                .into_iter()
                .map(|a| (a.phrase, a.key))
                .collect(),
        })
    }
}

impl KnowledgeBase for StaticKnowledgeBase {
    fn courses_by_semester(&self, semester: u8) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|c| c.semester == semester)
            .collect()
    }

    fn course_by_code(&self, code: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.code == code)
    }

    fn courses(&self) -> &[Course] {
        &self.courses
    }

    fn prerequisites_of(&self, code: &str) -> Option<&[String]> {
        self.prerequisites.get(code).map(|p| p.as_slice())
    }

    fn faculty_by_key(&self, key: &str) -> Option<&Faculty> {
        self.faculty.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    fn faculty_keys(&self) -> Vec<&str> {
        self.faculty.iter().map(|(k, _)| k.as_str()).collect()
    }

    // First listed instructor wins when a course appears twice.
    fn instructor_of(&self, code: &str) -> Option<&Faculty> {
        self.faculty
            .iter()
            .map(|(_, f)| f)
            .find(|f| f.courses.iter().any(|c| c == code))
    }

    fn faculty_for_semester(&self, semester: u8) -> Vec<(&Faculty, Vec<&Course>)> {
        let mut grouped: Vec<(&Faculty, Vec<&Course>)> = Vec::new();
        for course in self.courses_by_semester(semester) {
            let Some(teacher) = self.instructor_of(&course.code) else {
                continue;
            };
            match grouped.iter_mut().find(|(f, _)| f.name == teacher.name) {
                Some((_, list)) => list.push(course),
                None => grouped.push((teacher, vec![course])),
            }
        }
        grouped.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        grouped
    }

    fn events(&self) -> &[Event] {
        &self.events
    }

    fn event_by_name_substring(&self, text: &str) -> Option<&Event> {
        let lower = text.to_lowercase();
        self.events
            .iter()
            .find(|e| lower.contains(&e.name.to_lowercase()))
    }

    fn faq(&self, key: &str) -> Option<&str> {
        self.faq
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, answer)| answer.as_str())
    }

    /// Exact FAQ keys first, then the alias phrases, both as substrings.
    fn faq_key(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        if let Some((key, _)) = self.faq.iter().find(|(k, _)| lower.contains(k.as_str())) {
            return Some(key.as_str());
        }
        self.faq_aliases
            .iter()
            .find(|(phrase, _)| lower.contains(phrase.as_str()))
            .map(|(_, key)| key.as_str())
    }

    fn calendar_by_year(&self, year: i32) -> Vec<CalendarGroup> {
        self.calendar
            .iter()
            .filter_map(|cat| {
                let entries: Vec<_> = cat
                    .entries
                    .iter()
                    .filter_map(|e| {
                        // Entries with malformed dates are skipped.
                        let date = NaiveDate::parse_from_str(&e.date, "%Y-%m-%d").ok()?;
                        (date.year() == year).then(|| (date, e.clone()))
                    })
                    .collect();
                if entries.is_empty() {
                    None
                } else {
                    Some(CalendarGroup {
                        category: cat.category.clone(),
                        entries,
                    })
                }
            })
            .collect()
    }
}
