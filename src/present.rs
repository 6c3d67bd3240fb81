//! HTML fragments for chat replies. Everything here is a pure function of
//! already-resolved knowledge data; the chat page styles the classes used.

use crate::knowledge::{CalendarGroup, Course, Event, Faculty, KnowledgeBase};
use chrono::NaiveDate;

/// Escapes user-supplied text for inclusion in reply HTML.
pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn pretty_date(raw: &str) -> String {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%B %d, %Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut out = String::from("<table class=\"kb-table\"><thead><tr>");
    for h in headers {
        out.push_str(&format!("<th>{}</th>", h));
    }
    out.push_str("</tr></thead><tbody>");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str(&format!("<td>{}</td>", cell));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

/// Course table for one semester with instructors and a credit total.
pub fn semester_courses(semester: u8, courses: &[&Course], kb: &dyn KnowledgeBase) -> String {
    let rows = courses
        .iter()
        .map(|c| {
            let instructor = kb
                .instructor_of(&c.code)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "TBA".to_string());
            vec![
                format!("<b>{}</b>", c.code),
                c.name.clone(),
                c.credits.to_string(),
                c.theory_hours.to_string(),
                c.lab_hours.to_string(),
                instructor,
            ]
        })
        .collect();
    let total: u32 = courses.iter().map(|c| c.credits).sum();
    format!(
        "<strong>Semester {} Courses</strong><br><br>{}<strong>📚 Total Credits: {}</strong>",
        semester,
        table(
            &["Code", "Course Name", "Credits", "Theory", "Lab", "Instructor"],
            rows
        ),
        total
    )
}

/// Faculty table; pass a single member to render just their row.
pub fn faculty_table(members: &[&Faculty]) -> String {
    let rows = members
        .iter()
        .map(|f| {
            let courses = if f.courses.is_empty() {
                "N/A".to_string()
            } else {
                f.courses.join(", ")
            };
            vec![
                format!("<b>{}</b>", f.name),
                f.designation.clone(),
                f.email.clone(),
                courses,
            ]
        })
        .collect();
    format!(
        "<h3>👨‍🏫 Faculty Members</h3>{}",
        table(&["Name", "Designation", "Email", "Courses Teaching"], rows)
    )
}

pub fn semester_faculty(semester: u8, grouped: &[(&Faculty, Vec<&Course>)]) -> String {
    let rows = grouped
        .iter()
        .map(|(f, courses)| {
            let list: String = courses
                .iter()
                .map(|c| format!("<li><strong>{}</strong> – {}</li>", c.code, c.name))
                .collect();
            vec![
                format!("<strong>{}</strong>", f.name),
                f.designation.clone(),
                f.email.clone(),
                format!("<ul>{}</ul>", list),
            ]
        })
        .collect();
    format!(
        "<h3>👨‍🏫 Faculty Teaching in Semester {}</h3>{}",
        semester,
        table(&["Faculty", "Designation", "Email", "Courses Teaching"], rows)
    )
}

/// Prerequisite chain for a course. `prereqs` is `None` when the catalogue
/// has no record for the course.
pub fn prerequisites(
    code: &str,
    course: Option<&Course>,
    prereqs: Option<&[String]>,
    kb: &dyn KnowledgeBase,
) -> String {
    let Some(prereqs) = prereqs else {
        return format!(
            "Sorry, I couldn't find prerequisite information for {}. Please check the course code.",
            code
        );
    };
    let name = course.map(|c| c.name.as_str()).unwrap_or("Unknown course");
    let mut out = format!("📚 <strong>{}</strong>: {}<br><br>", code, name);
    if prereqs.is_empty() {
        out.push_str(
            "✅ <strong>No prerequisites required!</strong><br>This is a foundational course you can take anytime.",
        );
        return out;
    }
    out.push_str("📋 <strong>Prerequisites Required:</strong><br><br>");
    for p in prereqs {
        match kb.course_by_code(p) {
            Some(c) => out.push_str(&format!("• <strong>{}</strong>: {}<br>", p, c.name)),
            None => out.push_str(&format!("• <strong>{}</strong><br>", p)),
        }
    }
    out.push_str(&format!(
        "<br>⚠️ <em>You must complete these courses before enrolling in {}.</em>",
        code
    ));
    out
}

fn title_case(category: &str) -> String {
    category
        .split('_')
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn calendar(year: i32, groups: &[CalendarGroup]) -> String {
    let mut out = format!("<h2>Academic Calendar {}</h2>", year);
    if groups.is_empty() {
        out.push_str(&format!("No calendar entries for {}.", year));
        return out;
    }
    for group in groups {
        let rows = group
            .entries
            .iter()
            .map(|(date, e)| {
                vec![
                    format!("<b>{}</b>", e.name),
                    date.format("%Y-%m-%d").to_string(),
                    format!("<em>{}</em>", e.notes.as_deref().unwrap_or("")),
                ]
            })
            .collect();
        out.push_str(&format!(
            "<h3>{}</h3>{}<br>",
            title_case(&group.category),
            table(&["Event", "Date", "Notes"], rows)
        ));
    }
    out
}

pub fn single_event(event: &Event) -> String {
    format!(
        "<strong>{}</strong><br><br>📝 {}<br>📅 {}<br>🕐 {}<br>",
        event.name,
        event.description,
        pretty_date(&event.date),
        event.time
    )
}

pub fn events(events: &[Event]) -> String {
    let mut out = String::from("<strong>Upcoming University Events:</strong><br><br>");
    for e in events {
        out.push_str(&format!(
            "• <strong>{}</strong><br>  📝 {}<br>  📅 {} | {}<br><br>",
            e.name,
            e.description,
            pretty_date(&e.date),
            e.time
        ));
    }
    out
}

pub fn gpa_guide(grading: Option<&str>) -> String {
    let mut out = String::from("🎓 <strong>GPA Calculator Guide:</strong><br><br>");
    if let Some(grading) = grading {
        out.push_str(&format!("<strong>Grading System:</strong><br>{}<br><br>", grading));
    }
    out.push_str("<strong>Grade Points:</strong><br>");
    out.push_str("• A = 4.0<br>• B = 3.0<br>• C = 2.0<br>• D = 1.0<br>• F = 0.0<br><br>");
    out.push_str("<strong>Formula:</strong><br>");
    out.push_str("GPA = (Sum of Grade Points × Credits) / Total Credits<br><br>");
    out.push_str(
        "<em>Example:</em> A=4 in 3-credit, B=3 in 4-credit → GPA = ((4*3)+(3*4))/7 = 3.43",
    );
    out
}

/// Internship policy plus any internship deadlines from the calendar.
pub fn internships(policy: Option<&str>, groups: &[CalendarGroup]) -> String {
    let mut out = String::from("💼 <strong>Internships</strong><br><br>");
    out.push_str(policy.unwrap_or("Contact the placement office for internship details."));
    let deadlines: Vec<String> = groups
        .iter()
        .flat_map(|g| g.entries.iter())
        .filter(|(_, e)| e.name.to_lowercase().contains("internship"))
        .map(|(date, e)| format!("• <strong>{}</strong>: {}", e.name, date.format("%B %d, %Y")))
        .collect();
    if !deadlines.is_empty() {
        out.push_str("<br><br>📅 <strong>Deadlines:</strong><br>");
        out.push_str(&deadlines.join("<br>"));
    }
    out
}
