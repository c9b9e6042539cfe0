//! Plain-text rendering of the replica and the form.

use roster_sync::{EditSession, User};

const HEADERS: [&str; 5] = ["ID", "First name", "Last name", "Nickname", "Email"];

/// Render users as an aligned table.
pub fn table(users: &[User]) -> String {
    let rows: Vec<[String; 5]> = users
        .iter()
        .map(|u| {
            [
                u.id.to_string(),
                u.firstname.clone(),
                u.lastname.clone(),
                u.nickname.clone().unwrap_or_default(),
                u.email.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, HEADERS.map(String::from).iter(), &widths);
    push_row(&mut out, widths.map(|w| "-".repeat(w)).iter(), &widths);
    for row in &rows {
        push_row(&mut out, row.iter(), &widths);
    }
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a String>, widths: &[usize; 5]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// One-line summary of the active form.
pub fn session(session: &EditSession) -> String {
    let heading = match session.target {
        Some(id) => format!("editing user {id}"),
        None => "new user".to_string(),
    };
    let draft = &session.draft;
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "_".to_string());
    format!(
        "[{heading}] first={} last={} nick={} email={}",
        field(&draft.firstname),
        field(&draft.lastname),
        field(&draft.nickname),
        field(&draft.email),
    )
}
