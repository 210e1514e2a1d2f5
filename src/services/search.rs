//! Query normalization and candidate ranking
//!
//! Ranking favors plain home-market listings on the main board. See
//! [`crate::constants::ranking`] for the weight table.

use crate::constants::ranking::*;
use crate::models::Candidate;

/// Canonical form of raw search text: trimmed and upper-cased, empty when blank
pub fn normalize_query(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    trimmed.to_uppercase()
}

/// Score of one candidate; lower sorts first
pub fn rank_score(candidate: &Candidate) -> f64 {
    if !candidate.is_home_market() {
        return FOREIGN_SCORE;
    }

    let name = if candidate.display_name.trim().is_empty() {
        candidate.localized_name.as_deref().unwrap_or_default()
    } else {
        candidate.display_name.as_str()
    }
    .to_uppercase();
    let code = candidate.listing_code.trim();

    let when_issued = name.contains(WHEN_ISSUED_RESTRICTED_MARKER);
    let restricted = name.contains(RESTRICTED_MARKER);
    let dual_class = name.contains(DUAL_CLASS_MARKER);

    let mut score = 0.0;
    if !when_issued && !restricted {
        score += PLAIN_BONUS;
    }
    if dual_class {
        score += DUAL_CLASS_PENALTY;
    }
    if restricted {
        score += RESTRICTED_PENALTY;
    }
    if when_issued {
        score += WHEN_ISSUED_RESTRICTED_PENALTY;
    }

    if code.starts_with('0') {
        score += MAIN_BOARD_BONUS;
    }
    if code.starts_with('8') {
        score += GROWTH_BOARD_PENALTY;
    }

    if let Some(n) = leading_integer(code) {
        score += n as f64 / CODE_TIE_BREAK_DIVISOR;
    }

    score
}

/// Stable sort by [`rank_score`]; equal scores keep their input order
pub fn rank_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut scored: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|c| (rank_score(&c), c))
        .collect();
    scored.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    scored.into_iter().map(|(_, c)| c).collect()
}

/// Integer value of the leading digits, e.g. `"00700"` -> 700
fn leading_integer(code: &str) -> Option<u64> {
    let digits: String = code.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    // Over-long digit runs saturate rather than fail
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hk(name: &str, code: &str) -> Candidate {
        Candidate::new(&format!("{}.HK", code.trim_start_matches('0')), name, code, "HK")
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  tencent "), "TENCENT");
        assert_eq!(normalize_query(""), "");
        assert_eq!(normalize_query(" \t\n "), "");
        assert_eq!(normalize_query("9988"), "9988");
    }

    #[test]
    fn test_normalize_query_is_idempotent() {
        for raw in ["  tencent ", "", "  ", "Alibaba-SW", "00700"] {
            let once = normalize_query(raw);
            assert_eq!(normalize_query(&once), once);
        }
    }

    #[test]
    fn test_plain_listing_beats_restricted() {
        let plain = hk("ALIBABA", "09988");
        let restricted = hk("ALIBABA-R", "09988");
        assert!(rank_score(&plain) < rank_score(&restricted));

        let ranked = rank_candidates(vec![restricted.clone(), plain.clone()]);
        assert_eq!(ranked[0], plain);
    }

    #[test]
    fn test_lower_code_wins_among_plain_listings() {
        let tencent = hk("TENCENT", "00700");
        let alibaba = hk("BABA", "09988");
        let ranked = rank_candidates(vec![alibaba.clone(), tencent.clone()]);
        assert_eq!(ranked[0].symbol, tencent.symbol);
        assert_eq!(ranked[1].symbol, alibaba.symbol);
    }

    #[test]
    fn test_foreign_market_ranks_last() {
        let foreign = Candidate::new("BABA", "ALIBABA", "0", "US");
        let worst_home = hk("ANY-WR", "89988");
        assert_eq!(rank_score(&foreign), 1000.0);
        assert!(rank_score(&worst_home) < rank_score(&foreign));

        let ranked = rank_candidates(vec![foreign.clone(), worst_home.clone()]);
        assert_eq!(ranked.last(), Some(&foreign));
    }

    #[test]
    fn test_score_components() {
        // plain, main board, code 700
        assert!((rank_score(&hk("TENCENT", "00700")) - (-60.0 + 0.007)).abs() < 1e-9);
        // dual class still counts as plain
        assert!((rank_score(&hk("BABA-SW", "09988")) - (-55.0 + 0.09988)).abs() < 1e-9);
        // growth board
        assert!((rank_score(&hk("SMALLCO", "8001")) - (-40.0 + 0.08001)).abs() < 1e-9);
        // when-issued restricted
        assert!((rank_score(&hk("NEWCO-WR", "09988")) - (30.0 - 10.0 + 0.09988)).abs() < 1e-9);
    }

    #[test]
    fn test_symbol_suffix_marks_home_market() {
        let c = Candidate::new("0700.HK", "TENCENT", "00700", "");
        assert!(rank_score(&c) < 0.0);
    }

    #[test]
    fn test_stable_for_equal_scores() {
        let a = Candidate::new("A", "A", "", "US");
        let b = Candidate::new("B", "B", "", "JP");
        let c = Candidate::new("C", "C", "", "SG");
        let ranked = rank_candidates(vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(ranked, vec![a, b, c]);
    }

    #[test]
    fn test_non_numeric_code_has_no_tie_break() {
        let c = hk("PLAIN", "ABC");
        assert_eq!(rank_score(&c), -50.0);
        assert_eq!(leading_integer("00700"), Some(700));
        assert_eq!(leading_integer("12AB"), Some(12));
        assert_eq!(leading_integer(""), None);
    }
}
