//! Approximate string ranking for the global search.
//!
//! A value is ranked against a query in tiers, from an exact match down to an
//! in-order subsequence match. Subsequence matches carry a closeness bonus so
//! that tighter matches rank higher. Ranking is case insensitive apart from the
//! top tier and deterministic for fixed inputs.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Ranking {
    NoMatch,
    Matches,
    Acronym,
    Contains,
    WordStartsWith,
    StartsWith,
    Equal,
    CaseSensitiveEqual,
}

impl Ranking {
    fn score(self) -> f64 {
        self as u8 as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankInfo {
    pub ranking: Ranking,
    /// Tier score plus the closeness bonus of subsequence matches.
    pub rank: f64,
    pub passed: bool,
}

/// Ranks `value` against `query`, passing anything at or above [`Ranking::Matches`].
pub fn rank_item(value: &str, query: &str) -> RankInfo {
    rank_item_with_threshold(value, query, Ranking::Matches)
}

pub fn rank_item_with_threshold(value: &str, query: &str, threshold: Ranking) -> RankInfo {
    let rank = match_ranking(value, query);
    let ranking = tier(rank);
    RankInfo {
        ranking,
        rank,
        passed: ranking >= threshold && ranking != Ranking::NoMatch,
    }
}

/// Orders better ranked items first.
pub fn compare_items(a: &RankInfo, b: &RankInfo) -> Ordering {
    b.rank.total_cmp(&a.rank)
}

fn tier(rank: f64) -> Ranking {
    match rank {
        r if r >= 7.0 => Ranking::CaseSensitiveEqual,
        r if r >= 6.0 => Ranking::Equal,
        r if r >= 5.0 => Ranking::StartsWith,
        r if r >= 4.0 => Ranking::WordStartsWith,
        r if r >= 3.0 => Ranking::Contains,
        r if r >= 2.0 => Ranking::Acronym,
        r if r >= 1.0 => Ranking::Matches,
        _ => Ranking::NoMatch,
    }
}

fn match_ranking(value: &str, query: &str) -> f64 {
    if query.chars().count() > value.chars().count() {
        return Ranking::NoMatch.score();
    }
    if value == query {
        return Ranking::CaseSensitiveEqual.score();
    }

    let value = value.to_lowercase();
    let query = query.to_lowercase();
    if value == query {
        return Ranking::Equal.score();
    }
    if value.starts_with(&query) {
        return Ranking::StartsWith.score();
    }
    if value.contains(&format!(" {query}")) {
        return Ranking::WordStartsWith.score();
    }
    if value.contains(&query) {
        return Ranking::Contains.score();
    }
    if query.chars().count() == 1 {
        return Ranking::NoMatch.score();
    }
    if acronym(&value).contains(&query) {
        return Ranking::Acronym.score();
    }
    closeness_ranking(&value, &query)
}

fn acronym(value: &str) -> String {
    value
        .split(' ')
        .flat_map(|word| word.split('-'))
        .filter_map(|part| part.chars().next())
        .collect()
}

// In-order subsequence match, scored by how tightly the characters cluster.
fn closeness_ranking(value: &str, query: &str) -> f64 {
    let value: Vec<char> = value.chars().collect();
    let mut query = query.chars();

    let find = |c: char, from: usize| {
        value[from..]
            .iter()
            .position(|&v| v == c)
            .map(|pos| from + pos + 1)
    };

    let Some(first) = query.next().and_then(|c| find(c, 0)) else {
        return Ranking::NoMatch.score();
    };
    let mut position = first;
    for c in query {
        match find(c, position) {
            Some(next) => position = next,
            None => return Ranking::NoMatch.score(),
        }
    }

    let spread = (position - first).max(1) as f64;
    Ranking::Matches.score() + 1.0 / spread
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Rossi", "Rossi", Ranking::CaseSensitiveEqual)]
    #[case("Rossi", "rossi", Ranking::Equal)]
    #[case("Rossi", "ros", Ranking::StartsWith)]
    #[case("De Rossi", "ros", Ranking::WordStartsWith)]
    #[case("Barella", "rel", Ranking::Contains)]
    #[case("Inter-Milan Club", "imc", Ranking::Acronym)]
    #[case("Lautaro Martinez", "ltz", Ranking::Matches)]
    #[case("Rossi", "zzz", Ranking::NoMatch)]
    #[case("Rossi", "x", Ranking::NoMatch)]
    #[case("Ros", "Rossi", Ranking::NoMatch)]
    fn ranks_by_tier(#[case] value: &str, #[case] query: &str, #[case] expected: Ranking) {
        let info = rank_item(value, query);
        assert_eq!(info.ranking, expected);
        assert_eq!(info.passed, expected != Ranking::NoMatch);
    }

    #[test]
    fn tighter_subsequence_ranks_higher() {
        let tight = rank_item("abxcd", "abd");
        let loose = rank_item("axxxbxxxxd", "abd");
        assert_eq!(tight.ranking, Ranking::Matches);
        assert_eq!(loose.ranking, Ranking::Matches);
        assert!(tight.rank > loose.rank);
        assert!(tight.rank < Ranking::Acronym.score());
        assert_eq!(compare_items(&tight, &loose), Ordering::Less);
    }

    #[test]
    fn ranking_is_deterministic_and_ordered() {
        let values = ["Rossi", "De Rossi", "Rosetti", "Brossi"];
        let first: Vec<f64> = values.iter().map(|v| rank_item(v, "ros").rank).collect();
        let second: Vec<f64> = values.iter().map(|v| rank_item(v, "ros").rank).collect();
        assert_eq!(first, second);
        assert!(first[0] > first[1]);
        assert!(first[1] > first[3]);
    }

    #[test]
    fn threshold_can_be_raised() {
        let info = rank_item_with_threshold("Barella", "rel", Ranking::StartsWith);
        assert_eq!(info.ranking, Ranking::Contains);
        assert!(!info.passed);
    }
}
