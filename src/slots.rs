use crate::knowledge::{Event, KnowledgeBase, TITLES};
use once_cell::sync::Lazy;
use regex::Regex;

/// Semester patterns, tried in order: "sem 3" / "semester3", "3rd sem", bare number word.
static SEMESTER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bsem(?:ester)?\s*(\d+)",
        r"\b(\d+)(?:st|nd|rd|th)?\s*sem",
        r"\b(one|two|three|four|five|six|seven|eight|1|2|3|4|5|6|7|8)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("semester pattern compiles"))
    .collect()
});

const NUMBER_WORDS: &[(&str, u8)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
];

/// Filler removed before matching a faculty name.
const FACULTY_FILLER: &[&str] = &["about", "tell me", "who is"];

pub const SEMESTER_RANGE: std::ops::RangeInclusive<u8> = 1..=8;

/// Pulls a semester number out of free text. The first pattern that matches
/// decides; a number outside 1..=8 counts as no answer.
pub fn extract_semester(text: &str) -> Option<u8> {
    let lower = text.to_lowercase();
    let raw = SEMESTER_PATTERNS
        .iter()
        .find_map(|re| re.captures(&lower))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())?;

    let number = NUMBER_WORDS
        .iter()
        .find(|(word, _)| *word == raw)
        .map(|(_, n)| *n)
        .or_else(|| raw.parse::<u8>().ok())?;

    SEMESTER_RANGE.contains(&number).then_some(number)
}

/// Resolves text to a faculty key: exact key, then the text as part of
/// exactly one key, then a last name carried by exactly one faculty member.
/// Anything still ambiguous is unresolved.
pub fn extract_faculty(text: &str, kb: &dyn KnowledgeBase) -> Option<String> {
    let mut cleaned = text.to_lowercase();
    for title in TITLES {
        cleaned = cleaned.replace(title, "");
    }
    for filler in FACULTY_FILLER {
        cleaned = cleaned.replace(filler, "");
    }
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let keys = kb.faculty_keys();
    if let Some(key) = keys.iter().find(|k| **k == cleaned) {
        return Some(key.to_string());
    }
    // Only an unambiguous fragment is accepted here, not the first key that
    // contains it; shared fragments fall through to the last-name check.
    let partial: Vec<&&str> = keys.iter().filter(|k| k.contains(cleaned)).collect();
    if let [only] = partial.as_slice() {
        return Some(only.to_string());
    }

    let by_last_name: Vec<&&str> = keys
        .iter()
        .filter(|k| k.split_whitespace().last() == Some(cleaned))
        .collect();
    match by_last_name.as_slice() {
        [only] => Some(only.to_string()),
        _ => None,
    }
}

/// Finds a course code in the text, or a course whose name the text mentions.
pub fn extract_course(text: &str, kb: &dyn KnowledgeBase) -> Option<String> {
    let upper = text.to_uppercase();
    let lower = text.to_lowercase();
    let courses = kb.courses();
    courses
        .iter()
        .find(|c| upper.contains(&c.code))
        .or_else(|| {
            courses
                .iter()
                .find(|c| lower.contains(&c.name.to_lowercase()))
        })
        .map(|c| c.code.clone())
}

pub fn extract_event<'a>(text: &str, kb: &'a dyn KnowledgeBase) -> Option<&'a Event> {
    kb.event_by_name_substring(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::tests::fixture;

    #[test]
    fn semester_from_abbreviation() {
        assert_eq!(extract_semester("I want sem 3"), Some(3));
        assert_eq!(extract_semester("Semester5 please"), Some(5));
        assert_eq!(extract_semester("my 2nd sem"), Some(2));
    }

    #[test]
    fn semester_from_words_and_digits() {
        assert_eq!(extract_semester("seven"), Some(7));
        assert_eq!(extract_semester("4"), Some(4));
        assert_eq!(extract_semester("hmm not sure"), None);
    }

    #[test]
    fn semester_out_of_range_is_rejected() {
        assert_eq!(extract_semester("semester 9"), None);
        assert_eq!(extract_semester("sem 0"), None);
    }

    #[test]
    fn faculty_exact_and_partial() {
        let kb = fixture();
        assert_eq!(
            extract_faculty("Dr Ayesha Khan", &kb).as_deref(),
            Some("ayesha khan")
        );
        assert_eq!(
            extract_faculty("tell me about hina", &kb).as_deref(),
            Some("hina malik")
        );
    }

    #[test]
    fn faculty_last_name_must_be_unique() {
        let kb = fixture();
        assert_eq!(extract_faculty("ehtisham", &kb).as_deref(), Some("hamza ehtisham"));
        // Ayesha Khan and Rabia Khan share a last name; no first-match pick.
        assert_eq!(extract_faculty("khan", &kb), None);
        assert_eq!(extract_faculty("sana", &kb), None);
        // "ali" sits inside several keys but is the last name of one.
        assert_eq!(extract_faculty("ali", &kb).as_deref(), Some("kamran ali"));
        assert_eq!(extract_faculty("nobody here", &kb), None);
        assert_eq!(extract_faculty("dr ", &kb), None);
    }

    #[test]
    fn course_by_code_or_name() {
        let kb = fixture();
        assert_eq!(extract_course("prereqs for csc201?", &kb).as_deref(), Some("CSC201"));
        assert_eq!(
            extract_course("what about operating systems", &kb).as_deref(),
            Some("CSC203")
        );
        assert_eq!(extract_course("no idea", &kb), None);
    }

    #[test]
    fn event_by_name() {
        let kb = fixture();
        assert_eq!(
            extract_event("tell me about the workshop on ai", &kb).map(|e| e.id),
            Some(2)
        );
    }
}
