use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::BoardError;

/// Strategy entries outside these tiers never reach the table.
pub const MIN_TIER: i64 = 1;
pub const MAX_TIER: i64 = 6;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerRecord {
    pub player_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub team: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "string_list")]
    pub mantra_roles: Vec<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub classic_10_mod_median: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quotazione: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub mv: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fmv: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub presenze: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub starts_eleven: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub gol_fatti: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub assist: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub penalties: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub injured: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub amm: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub esp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrategyEntry {
    pub player_id: String,
    #[serde(default)]
    pub strategy_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_tier")]
    pub fascia: Option<i64>,
    #[serde(default, deserialize_with = "lenient_tier")]
    pub fascia_second: Option<i64>,
    #[serde(default, deserialize_with = "lenient_tier")]
    pub fascia_third: Option<i64>,
    #[serde(default)]
    pub price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub ex_fmv: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tit_index: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub aff_index: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub inf_index: Option<f64>,
    #[serde(default, deserialize_with = "string_list")]
    pub notes: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub target: Option<bool>,
}

/// A strategy entry with its resolved player.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub entry: StrategyEntry,
    pub player: PlayerRecord,
}

// Numbers show up as numbers, numeric strings or flags depending on the export.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
        _ => None,
    }))
}

fn lenient_tier<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = lenient_number(deserializer)?;
    Ok(number.filter(|n| n.fract() == 0.0).map(|n| n as i64))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let list = Option::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(list.unwrap_or_default().into_iter().flatten().collect())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, BoardError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => BoardError::FileNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => BoardError::PermissionDenied(path.to_path_buf()),
        _ => BoardError::IoError(e),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| BoardError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_players(path: &Path) -> Result<Vec<PlayerRecord>, BoardError> {
    let start_time = Instant::now();
    let players: Vec<PlayerRecord> = load_json(path)?;
    info!(
        "Loaded {} players from {} in {}ms",
        players.len(),
        path.display(),
        start_time.elapsed().as_millis()
    );
    Ok(players)
}

pub fn load_strategy(path: &Path) -> Result<Vec<StrategyEntry>, BoardError> {
    let start_time = Instant::now();
    let strategy: Vec<StrategyEntry> = load_json(path)?;
    info!(
        "Loaded {} strategy entries from {} in {}ms",
        strategy.len(),
        path.display(),
        start_time.elapsed().as_millis()
    );
    Ok(strategy)
}

/// Joins strategy entries with their players.
///
/// Only entries with a tier between [`MIN_TIER`] and [`MAX_TIER`] are kept, entries whose
/// player cannot be resolved are dropped. The result is ordered by price,
/// most expensive first, ties keep their input order.
pub fn join_strategy(players: &[PlayerRecord], strategy: &[StrategyEntry]) -> Vec<EnrichedRow> {
    let mut by_id: HashMap<&str, &PlayerRecord> = HashMap::with_capacity(players.len());
    for player in players {
        // First occurrence wins
        by_id.entry(player.player_id.as_str()).or_insert(player);
    }

    let eligible = strategy
        .iter()
        .filter(|entry| entry.fascia.is_some_and(|tier| (MIN_TIER..=MAX_TIER).contains(&tier)));

    let mut rows: Vec<EnrichedRow> = eligible
        .filter_map(|entry| {
            by_id.get(entry.player_id.as_str()).map(|player| EnrichedRow {
                entry: entry.clone(),
                player: (*player).clone(),
            })
        })
        .collect();
    debug!("Joined {} strategy rows", rows.len());

    rows.sort_by(|a, b| b.entry.price.total_cmp(&a.entry.price));
    rows
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use std::path::PathBuf;

    pub(crate) fn player(id: &str, name: &str, team: &str, role: &str) -> PlayerRecord {
        PlayerRecord {
            player_id: id.to_string(),
            role: role.to_string(),
            team: team.to_string(),
            name: name.to_string(),
            mantra_roles: Vec::new(),
            classic_10_mod_median: None,
            quotazione: None,
            mv: None,
            fmv: None,
            presenze: None,
            starts_eleven: None,
            gol_fatti: None,
            assist: None,
            penalties: None,
            injured: None,
            amm: None,
            esp: None,
        }
    }

    pub(crate) fn entry(id: &str, fascia: Option<i64>, price: f64) -> StrategyEntry {
        StrategyEntry {
            player_id: id.to_string(),
            strategy_id: None,
            fascia,
            fascia_second: None,
            fascia_third: None,
            price,
            ex_fmv: None,
            tit_index: None,
            aff_index: None,
            inf_index: None,
            notes: Vec::new(),
            comment: None,
            target: None,
        }
    }

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn join_keeps_only_resolved_entries_up_to_tier_six() {
        let players = vec![
            player("p1", "Rossi", "ABC", "A"),
            player("p2", "Bianchi", "DEF", "D"),
        ];
        let strategy = vec![
            entry("p1", Some(2), 50.0),
            entry("p2", Some(7), 999.0),
            entry("p3", Some(1), 10.0),
            entry("p2", None, 20.0),
            entry("p2", Some(6), 5.0),
        ];

        let rows = join_strategy(&players, &strategy);
        let ids: Vec<(&str, f64)> = rows
            .iter()
            .map(|r| (r.player.player_id.as_str(), r.entry.price))
            .collect();
        assert_eq!(ids, vec![("p1", 50.0), ("p2", 5.0)]);
        for row in &rows {
            assert!(row.entry.fascia.is_some_and(|t| (MIN_TIER..=MAX_TIER).contains(&t)));
            assert_eq!(row.entry.player_id, row.player.player_id);
        }
    }

    #[test]
    fn join_sorts_by_price_descending_and_is_stable() {
        let players = vec![
            player("a", "A", "T", "P"),
            player("b", "B", "T", "P"),
            player("c", "C", "T", "P"),
            player("d", "D", "T", "P"),
        ];
        let strategy = vec![
            entry("a", Some(1), 10.0),
            entry("b", Some(1), 30.0),
            entry("c", Some(1), 10.0),
            entry("d", Some(1), 30.0),
        ];

        let rows = join_strategy(&players, &strategy);
        let ids: Vec<&str> = rows.iter().map(|r| r.player.player_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
        assert!(rows.windows(2).all(|w| w[0].entry.price >= w[1].entry.price));

        // Same input, same output
        assert_eq!(rows, join_strategy(&players, &strategy));
    }

    #[test]
    fn join_drops_tiers_below_one() {
        let players = vec![player("p1", "Rossi", "ABC", "A"), player("p2", "Bianchi", "DEF", "D")];
        let strategy = vec![
            entry("p1", Some(0), 50.0),
            entry("p2", Some(-1), 40.0),
            entry("p2", Some(1), 30.0),
        ];
        let rows = join_strategy(&players, &strategy);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entry.fascia, Some(1));
    }

    fn arb_players() -> impl Strategy<Value = Vec<PlayerRecord>> {
        prop::collection::vec(("p[0-9]{1,2}", "[A-Z][a-z]{1,6}"), 0..20).prop_map(|players| {
            players
                .into_iter()
                .map(|(id, name)| player(&id, &name, "T", "A"))
                .collect()
        })
    }

    fn arb_entries() -> impl Strategy<Value = Vec<StrategyEntry>> {
        prop::collection::vec(
            ("p[0-9]{1,2}", prop::option::of(-2i64..10), 0u32..2000),
            0..40,
        )
        .prop_map(|entries| {
            entries
                .into_iter()
                .map(|(id, fascia, price)| entry(&id, fascia, f64::from(price) / 4.0))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn join_invariants_hold_for_any_input(players in arb_players(), picks in arb_entries()) {
            let rows = join_strategy(&players, &picks);

            for row in &rows {
                prop_assert!(row.entry.fascia.is_some_and(|t| (MIN_TIER..=MAX_TIER).contains(&t)));
                prop_assert!(players.iter().any(|p| p.player_id == row.entry.player_id));
                prop_assert_eq!(&row.player.player_id, &row.entry.player_id);
            }
            prop_assert!(rows.windows(2).all(|w| w[0].entry.price >= w[1].entry.price));

            // Every eligible entry with a known player is kept
            let expected = picks
                .iter()
                .filter(|e| e.fascia.is_some_and(|t| (MIN_TIER..=MAX_TIER).contains(&t)))
                .filter(|e| players.iter().any(|p| p.player_id == e.player_id))
                .count();
            prop_assert_eq!(rows.len(), expected);

            prop_assert_eq!(&rows, &join_strategy(&players, &picks));
        }
    }

    #[test]
    fn join_uses_first_player_on_duplicate_ids() {
        let players = vec![player("p1", "First", "T", "A"), player("p1", "Second", "T", "A")];
        let rows = join_strategy(&players, &[entry("p1", Some(3), 1.0)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].player.name, "First");
    }

    #[test]
    fn loads_fixtures() {
        let players = load_players(&fixture("players.json")).unwrap();
        let strategy = load_strategy(&fixture("strategy.json")).unwrap();
        assert_eq!(players.len(), 6);
        assert_eq!(strategy.len(), 8);

        let rossi = players.iter().find(|p| p.player_id == "p1").unwrap();
        assert_eq!(rossi.name, "Rossi");
        assert_eq!(rossi.classic_10_mod_median, Some(6.5));

        let rows = join_strategy(&players, &strategy);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].player.name, "Lautaro");
    }

    #[test]
    fn lenient_fields_are_normalized() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"player_id": "x", "name": null, "quotazione": "12", "injured": true,
                 "amm": "n/a", "mantra_roles": ["Pc", null]}}]"#
        )
        .unwrap();
        let players = load_players(file.path()).unwrap();
        let p = &players[0];
        assert_eq!(p.name, "");
        assert_eq!(p.quotazione, Some(12.0));
        assert_eq!(p.injured, Some(1.0));
        assert_eq!(p.amm, None);
        assert_eq!(p.mantra_roles, vec!["Pc".to_string()]);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"player_id": "x", "fascia": 2.0, "price": 3, "notes": ["a", null, "b"]}},
               {{"player_id": "y", "fascia": null, "price": 1, "notes": null}}]"#
        )
        .unwrap();
        let strategy = load_strategy(file.path()).unwrap();
        assert_eq!(strategy[0].fascia, Some(2));
        assert_eq!(strategy[0].notes, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(strategy[1].fascia, None);
        assert!(strategy[1].notes.is_empty());
    }

    #[test]
    fn load_errors() {
        let missing = load_players(Path::new("/does/not/exist.json"));
        assert!(matches!(missing, Err(BoardError::FileNotFound(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let broken = load_strategy(file.path());
        assert!(matches!(broken, Err(BoardError::Json { .. })));
    }
}
