//! Natural-language diagnosis templated from the scores

use super::Scores;

const MAX_LISTED_KEYWORDS: usize = 5;

fn band(overall: f64) -> &'static str {
    if overall >= 0.75 {
        "strong"
    } else if overall >= 0.55 {
        "moderate"
    } else {
        "weak"
    }
}

fn label(name: &str) -> String {
    name.replace('_', " ")
}

/// Two sentences, three when keywords were missed.
pub(super) fn describe(overall: f64, scores: &Scores, missed: &[String]) -> String {
    let entries = scores.iter();
    // Ties resolve to the earliest sub-score in weight order.
    let (best_name, best) = entries
        .iter()
        .copied()
        .fold(entries[0], |acc, e| if e.1 > acc.1 { e } else { acc });
    let (worst_name, worst) = entries
        .iter()
        .copied()
        .fold(entries[0], |acc, e| if e.1 < acc.1 { e } else { acc });

    let mut summary = format!(
        "Overall quality is {} at {overall:.2}. Strongest signal is {} ({best:.2}); weakest is {} ({worst:.2}).",
        band(overall),
        label(best_name),
        label(worst_name),
    );

    if !missed.is_empty() {
        let listed: Vec<&str> = missed
            .iter()
            .take(MAX_LISTED_KEYWORDS)
            .map(String::as_str)
            .collect();
        summary.push_str(&format!(" Missing prompt keywords: {}.", listed.join(", ")));
    }
    summary
}
