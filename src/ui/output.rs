use crate::index::SearchHit;
use crate::statement::Statement;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::START, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::OK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::FAIL, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// One statement per line, terms colored by kind
pub fn statement(st: &Statement) {
    let theme = theme();
    let context = st
        .context
        .as_ref()
        .map(|c| format!(" {}", muted(&c.to_string())))
        .unwrap_or_default();
    println!(
        "{} {} {}{} .",
        st.subject.style(theme.resource(&st.subject)),
        dim(&st.predicate.to_string()),
        st.object.style(theme.value(&st.object)),
        context
    );
}

pub fn search_hit(rank: usize, hit: &SearchHit) {
    println!(
        "{:>3}. {} {}",
        rank,
        format!("{:.3}", hit.score).style(theme().success.clone()),
        hit.snippet
    );
    println!("     {}", muted(&hit.statement.to_string()));
}
