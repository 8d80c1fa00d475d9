use crate::models::ListingRecord;

/// Phrases owners use when selling without an agent
const OWNER_SIGNALS: &[(&str, i32)] = &[
    ("sahibinden", 3),
    ("sahipten", 3),
    ("ihtiyaçtan", 3),
    ("acil", 2),
    ("kelepir", 2),
    ("değişim", 2),
    ("takas", 2),
    ("aracısız", 2),
    ("komisyonsuz", 2),
];

/// Phrases that point at an agency
const AGENCY_SIGNALS: &[(&str, i32)] = &[
    ("emlak", -1),
    ("gayrimenkul", -1),
    ("ofis", -1),
    ("danışman", -1),
    ("acentesi", -1),
    ("grup", -1),
    ("şirket", -1),
    ("ltd", -1),
];

const RECENT_MARKERS: &[&str] = &["bugün", "dün", "1 gün", "2 gün"];

pub const MAX_SCORE: u8 = 10;

/// Likelihood (0..=10) that a listing is posted by its owner
pub fn fsbo_score(record: &ListingRecord) -> u8 {
    let text = format!(
        "{} {}",
        record.title.as_deref().unwrap_or(""),
        record.location_text.as_deref().unwrap_or("")
    )
    .to_lowercase();

    let mut score: i32 = OWNER_SIGNALS
        .iter()
        .chain(AGENCY_SIGNALS)
        .filter(|(keyword, _)| text.contains(keyword))
        .map(|(_, weight)| weight)
        .sum();

    // Private sellers rarely pick round prices
    if matches!(record.price, Some(p) if p > 0 && p % 1000 != 0) {
        score += 1;
    }

    let posted = record.posted_text.as_deref().unwrap_or("").to_lowercase();
    if RECENT_MARKERS.iter().any(|m| posted.contains(m)) {
        score += 1;
    }

    score.clamp(0, MAX_SCORE as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, price: Option<i64>, posted: Option<&str>) -> ListingRecord {
        let mut r = ListingRecord::candidate("1");
        r.title = Some(title.to_string());
        r.price = price;
        r.posted_text = posted.map(str::to_string);
        r
    }

    #[test]
    fn owner_phrasing_scores_high() {
        let r = record("Sahibinden acil komisyonsuz 2+1", Some(2_345_500), Some("Bugün"));
        // 3 + 2 + 2, odd price, posted today
        assert_eq!(fsbo_score(&r), 9);
    }

    #[test]
    fn agency_phrasing_scores_zero() {
        let r = record("ABC Emlak Gayrimenkul Ofis", Some(3_000_000), None);
        assert_eq!(fsbo_score(&r), 0);
    }

    #[test]
    fn score_is_capped() {
        let r = record(
            "sahibinden sahipten ihtiyaçtan acil kelepir takas",
            Some(1_234_567),
            Some("dün"),
        );
        assert_eq!(fsbo_score(&r), MAX_SCORE);
    }
}
