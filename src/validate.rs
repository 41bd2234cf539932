//! Response validator: runs every check, collects every failure.
//!
//! Mirrors the non-short-circuiting shape of the validator this was modeled
//! on — each check is independent and all of them run, rather than stopping
//! at the first failure.

use crate::net::UniformResponse;
use scraper::{Html, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    InvalidStatusCode,
    NoContent,
    InvalidContentType,
    NotTurkish,
}

/// Runs all four checks against `response`, returning every failure found.
pub fn validate(response: &UniformResponse, accepted_status_codes: &[u16]) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();

    if !accepted_status_codes.contains(&response.status_code) {
        failures.push(ValidationFailure::InvalidStatusCode);
    }
    if response.body.trim().is_empty() {
        failures.push(ValidationFailure::NoContent);
    }
    if !content_type_is_html(response) {
        failures.push(ValidationFailure::InvalidContentType);
    }
    if !is_turkish(response) {
        failures.push(ValidationFailure::NotTurkish);
    }

    failures
}

fn content_type_is_html(response: &UniformResponse) -> bool {
    response
        .header("content-type")
        .map(|ct| ct.contains("text/html"))
        .unwrap_or(false)
}

fn is_turkish(response: &UniformResponse) -> bool {
    const TR_TAGS: &[&str] = &["tr", "tr-TR", "tr_TR"];

    if let Some(lang) = response.header("content-language") {
        if TR_TAGS.iter().any(|t| t.eq_ignore_ascii_case(lang)) {
            return true;
        }
    }

    let document = Html::parse_document(&response.body);

    if let Ok(sel) = Selector::parse(r#"meta[http-equiv="Content-Language"]"#) {
        if document.select(&sel).any(|el| {
            el.value()
                .attr("content")
                .map(|c| c.eq_ignore_ascii_case("tr"))
                .unwrap_or(false)
        }) {
            return true;
        }
    }

    if let Ok(sel) = Selector::parse(r#"meta[property="og:locale"]"#) {
        if document.select(&sel).any(|el| {
            el.value()
                .attr("content")
                .map(|c| c.eq_ignore_ascii_case("tr_TR"))
                .unwrap_or(false)
        }) {
            return true;
        }
    }

    if let Ok(sel) = Selector::parse("html[lang]") {
        if document.select(&sel).any(|el| {
            el.value()
                .attr("lang")
                .map(|l| TR_TAGS.iter().any(|t| t.eq_ignore_ascii_case(l)))
                .unwrap_or(false)
        }) {
            return true;
        }
    }

    false
}
