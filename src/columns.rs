use std::cmp::Ordering;
use std::fmt;

use crate::strategy::EnrichedRow;

/// Total draft budget, used for the budget share columns.
pub const BUDGET: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnId {
    Fascia,
    Role,
    Name,
    Team,
    Notes,
    Price,
    Budget,
    Median,
    Quotazione,
    TitIndex,
    AffIndex,
    InfIndex,
    ExFmv,
    Mv,
    Fmv,
    Presenze,
    StartsEleven,
    GolFatti,
    Assist,
    Penalties,
    Injured,
    Amm,
    Esp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Case insensitive equality of the stringified value.
    Equals,
    /// Case insensitive substring match.
    Includes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortingKind {
    /// Numbers numerically, everything else alphanumerically.
    Auto,
    /// Rank of the global search first, then alphanumerically.
    Fuzzy,
}

#[derive(Debug)]
pub struct ColumnDef {
    pub id: ColumnId,
    pub header: &'static str,
    pub max_width: Option<usize>,
    pub filter: Option<FilterKind>,
    pub global_filter: bool,
    pub sorting: SortingKind,
    pub numeric: bool,
}

impl ColumnDef {
    const fn number(id: ColumnId, header: &'static str, max_width: usize) -> Self {
        ColumnDef {
            id,
            header,
            max_width: Some(max_width),
            filter: None,
            global_filter: true,
            sorting: SortingKind::Auto,
            numeric: true,
        }
    }

    pub fn can_filter(&self) -> bool {
        self.filter.is_some()
    }
}

pub static COLUMNS: [ColumnDef; 23] = [
    ColumnDef {
        filter: Some(FilterKind::Equals),
        ..ColumnDef::number(ColumnId::Fascia, "F", 5)
    },
    ColumnDef {
        id: ColumnId::Role,
        header: "R",
        max_width: Some(5),
        filter: Some(FilterKind::Equals),
        global_filter: true,
        sorting: SortingKind::Auto,
        numeric: false,
    },
    ColumnDef {
        id: ColumnId::Name,
        header: "Name",
        max_width: None,
        filter: Some(FilterKind::Includes),
        global_filter: true,
        sorting: SortingKind::Fuzzy,
        numeric: false,
    },
    ColumnDef {
        id: ColumnId::Team,
        header: "Team",
        max_width: Some(8),
        filter: Some(FilterKind::Includes),
        global_filter: true,
        sorting: SortingKind::Auto,
        numeric: false,
    },
    ColumnDef {
        id: ColumnId::Notes,
        header: "Note",
        max_width: None,
        filter: Some(FilterKind::Includes),
        global_filter: false,
        sorting: SortingKind::Auto,
        numeric: false,
    },
    ColumnDef::number(ColumnId::Price, "Prezzo", 8),
    ColumnDef::number(ColumnId::Budget, "Budget", 10),
    ColumnDef::number(ColumnId::Median, "Med", 18),
    ColumnDef::number(ColumnId::Quotazione, "Quot", 8),
    ColumnDef::number(ColumnId::TitIndex, "Tit", 5),
    ColumnDef::number(ColumnId::AffIndex, "Aff", 5),
    ColumnDef::number(ColumnId::InfIndex, "Inf", 5),
    ColumnDef::number(ColumnId::ExFmv, "Ex FMV", 8),
    ColumnDef::number(ColumnId::Mv, "MV", 8),
    ColumnDef::number(ColumnId::Fmv, "FMV", 8),
    ColumnDef::number(ColumnId::Presenze, "Presenze", 8),
    ColumnDef::number(ColumnId::StartsEleven, "Titolarità", 8),
    ColumnDef::number(ColumnId::GolFatti, "Gol", 8),
    ColumnDef::number(ColumnId::Assist, "Assist", 8),
    ColumnDef::number(ColumnId::Penalties, "Rigori", 8),
    ColumnDef::number(ColumnId::Injured, "Inf", 8),
    ColumnDef::number(ColumnId::Amm, "Amm", 8),
    ColumnDef::number(ColumnId::Esp, "Esp", 8),
];

pub fn column(id: ColumnId) -> &'static ColumnDef {
    // COLUMNS is declared in ColumnId order
    &COLUMNS[id as usize]
}

/// Raw value of a cell, before display formatting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue<'a> {
    Null,
    Number(f64),
    Text(&'a str),
    List(&'a [String]),
}

impl CellValue<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// String form used by filters and search, `None` for missing values.
    pub fn to_filter_string(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<Option<f64>> for CellValue<'_> {
    fn from(value: Option<f64>) -> Self {
        value.map_or(CellValue::Null, CellValue::Number)
    }
}

impl ColumnId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnId::Fascia => "fascia",
            ColumnId::Role => "role",
            ColumnId::Name => "name",
            ColumnId::Team => "team",
            ColumnId::Notes => "notes",
            ColumnId::Price => "price",
            ColumnId::Budget => "budget",
            ColumnId::Median => "median",
            ColumnId::Quotazione => "quotazione",
            ColumnId::TitIndex => "tit_index",
            ColumnId::AffIndex => "aff_index",
            ColumnId::InfIndex => "inf_index",
            ColumnId::ExFmv => "ex_fmv",
            ColumnId::Mv => "mv",
            ColumnId::Fmv => "fmv",
            ColumnId::Presenze => "presenze",
            ColumnId::StartsEleven => "starts_eleven",
            ColumnId::GolFatti => "gol_fatti",
            ColumnId::Assist => "assist",
            ColumnId::Penalties => "penalties",
            ColumnId::Injured => "injured",
            ColumnId::Amm => "amm",
            ColumnId::Esp => "esp",
        }
    }

    pub fn value<'a>(&self, row: &'a EnrichedRow) -> CellValue<'a> {
        let entry = &row.entry;
        let player = &row.player;
        match self {
            ColumnId::Fascia => entry.fascia.map(|f| f as f64).into(),
            ColumnId::Role => CellValue::Text(&player.role),
            ColumnId::Name => CellValue::Text(&player.name),
            ColumnId::Team => CellValue::Text(&player.team),
            ColumnId::Notes => CellValue::List(&entry.notes),
            ColumnId::Price | ColumnId::Budget => CellValue::Number(entry.price),
            ColumnId::Median => player.classic_10_mod_median.into(),
            ColumnId::Quotazione => player.quotazione.into(),
            ColumnId::TitIndex => entry.tit_index.into(),
            ColumnId::AffIndex => entry.aff_index.into(),
            ColumnId::InfIndex => entry.inf_index.into(),
            ColumnId::ExFmv => entry.ex_fmv.into(),
            ColumnId::Mv => player.mv.into(),
            ColumnId::Fmv => player.fmv.into(),
            ColumnId::Presenze => player.presenze.into(),
            ColumnId::StartsEleven => player.starts_eleven.into(),
            ColumnId::GolFatti => player.gol_fatti.into(),
            ColumnId::Assist => player.assist.into(),
            ColumnId::Penalties => player.penalties.into(),
            ColumnId::Injured => player.injured.into(),
            ColumnId::Amm => player.amm.into(),
            ColumnId::Esp => player.esp.into(),
        }
    }

    /// Display text of the cell.
    pub fn format(&self, row: &EnrichedRow) -> String {
        match (self, self.value(row)) {
            (ColumnId::Budget, CellValue::Number(price)) => budget_share(price),
            (ColumnId::Median, CellValue::Number(median)) => median_share(median),
            (_, value) => value.to_string(),
        }
    }
}

pub fn budget_share(price: f64) -> String {
    format!("{}%", to_fixed(price / BUDGET * 100.0, 2))
}

/// Fixed point rendering that rounds exact ties away from zero.
///
/// `format!` rounds ties to even. A tie at `digits` decimals is an odd multiple
/// of 2^-(digits+1), so those values are nudged one ulp away from zero first.
pub fn to_fixed(value: f64, digits: usize) -> String {
    let scaled = value * 2f64.powi(digits as i32 + 1);
    let tie = scaled.is_finite() && scaled.fract() == 0.0 && scaled.abs() % 2.0 == 1.0;
    let value = if tie {
        // Bit increments grow the magnitude for either sign
        f64::from_bits(value.to_bits() + 1)
    } else {
        value
    };
    format!("{value:.digits$}")
}

pub fn median_share(median: f64) -> String {
    format!("{}% - {}", median, median * BUDGET / 100.0)
}

/// Natural order comparison: digit runs compare by value, the rest case
/// insensitive. Text runs sort before digit runs.
pub fn compare_alphanumeric(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut a_chunks = chunks(&a);
    let mut b_chunks = chunks(&b);
    loop {
        match (a_chunks.next(), b_chunks.next()) {
            (Some(x), Some(y)) => {
                let x_digits = x.starts_with(|c: char| c.is_ascii_digit());
                let y_digits = y.starts_with(|c: char| c.is_ascii_digit());
                let ord = match (x_digits, y_digits) {
                    (true, true) => compare_digits(x, y),
                    (false, false) => x.cmp(y),
                    (false, true) => Ordering::Less,
                    (true, false) => Ordering::Greater,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tests::{entry, player};

    fn rossi() -> EnrichedRow {
        let mut entry = entry("p1", Some(2), 50.0);
        entry.notes = vec!["good".to_string()];
        EnrichedRow {
            entry,
            player: player("p1", "Rossi", "ABC", "A"),
        }
    }

    #[test]
    fn columns_are_declared_in_id_order() {
        for (idx, def) in COLUMNS.iter().enumerate() {
            assert_eq!(def.id as usize, idx, "{}", def.id.as_str());
            assert_eq!(column(def.id).header, def.header);
        }
        let filterable: Vec<ColumnId> =
            COLUMNS.iter().filter(|c| c.can_filter()).map(|c| c.id).collect();
        assert_eq!(
            filterable,
            vec![ColumnId::Fascia, ColumnId::Role, ColumnId::Name, ColumnId::Team, ColumnId::Notes]
        );
    }

    #[test]
    fn derived_columns_format_exactly() {
        let mut row = rossi();
        assert_eq!(ColumnId::Budget.format(&row), "10.00%");
        assert_eq!(ColumnId::Price.format(&row), "50");
        assert_eq!(ColumnId::Fascia.format(&row), "2");
        assert_eq!(ColumnId::Notes.format(&row), "good");
        assert_eq!(ColumnId::Median.format(&row), "");

        row.player.classic_10_mod_median = Some(6.5);
        assert_eq!(ColumnId::Median.format(&row), "6.5% - 32.5");
        row.entry.notes = vec!["a".into(), "b".into()];
        assert_eq!(ColumnId::Notes.format(&row), "a, b");
        row.entry.notes.clear();
        assert_eq!(ColumnId::Notes.format(&row), "");

        assert_eq!(budget_share(123.0), "24.60%");
        assert_eq!(budget_share(0.625), "0.13%");
        assert_eq!(budget_share(1.875), "0.38%");
        assert_eq!(median_share(12.0), "12% - 60");
    }

    #[test]
    fn fixed_point_rounds_ties_away_from_zero() {
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(0.375, 2), "0.38");
        assert_eq!(to_fixed(-0.125, 2), "-0.13");
        assert_eq!(to_fixed(2.5, 0), "3");
        // Not a tie: the nearest double is below 1.005
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(0.124, 2), "0.12");
        assert_eq!(to_fixed(10.0, 2), "10.00");
    }

    #[test]
    fn null_cells_have_no_filter_string() {
        let row = rossi();
        assert_eq!(ColumnId::Mv.value(&row).to_filter_string(), None);
        assert_eq!(
            ColumnId::Name.value(&row).to_filter_string(),
            Some("Rossi".to_string())
        );
    }

    #[test]
    fn alphanumeric_order() {
        assert_eq!(compare_alphanumeric("item2", "item10"), Ordering::Less);
        assert_eq!(compare_alphanumeric("Rossi", "bianchi"), Ordering::Greater);
        assert_eq!(compare_alphanumeric("abc", "ABC"), Ordering::Equal);
        assert_eq!(compare_alphanumeric("a", "ab"), Ordering::Less);
        assert_eq!(compare_alphanumeric("007", "7"), Ordering::Equal);
        assert_eq!(compare_alphanumeric("x", "1"), Ordering::Less);
    }
}
