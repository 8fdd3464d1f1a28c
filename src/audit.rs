//! Listing audit: flags generic-branded products in restricted categories
//! and colour fields that name no recognisable colour.

use std::collections::HashSet;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info};
use regex::Regex;

use crate::{
    cli::AuditArgs,
    data::Cell,
    error::{PipelineError, PipelineResult},
    io_utils::{self, CsvOutput},
    loader,
    lookup,
    naming::{Disambiguator, OutputName},
    session::Session,
    table::Table,
};

pub const CHECK_BRAND: &str = "check_Brand";
pub const CHECK_COLOR: &str = "Check_Color";

const YES: &str = "Yes";
const NO: &str = "No";

const COLOUR_WORDS: &[&str] = &[
    "navy", "black", "yellow", "red", "blue", "green", "orange", "purple", "pink", "brown",
    "white", "gray", "grey", "khaki", "coffee", "gold", "silver", "beige", "burgundy", "multi",
    "turquoise", "violet", "indigo", "maroon", "olive", "lime", "teal", "aqua", "apricot", "wine",
    "mocha", "multicolor", "plaid", "rose", "lily", "daisy", "tulip", "sunflower", "iris",
    "orchid", "lavender", "marigold", "poppy", "jasmine", "peony", "camellia", "hyacinth",
    "magnolia", "daffodil", "chrysanthemum", "geranium", "dahlia", "transparent", "clear",
    "rainbow", "caramel", "milk", "bronze", "argent", "chocolate", "stawberry", "colorful",
    "peach", "magenta", "carbon", "camouflage", "camo", "stripes", "polka dot", "floral",
    "geometric", "animal print", "tie-dye", "chevron", "herringbone", "paisley", "checkered",
    "gingham", "tartan", "abstract", "batik", "ikat", "ombre", "checked", "cyan", "ivory",
    "periwinkle", "chartreuse", "fandango", "wisteria", "mauve", "vermilion", "viridian",
    "tangerine", "cerulean", "heliotrope", "gamboge", "xanadu", "byzantium", "caput mortuum",
    "persimmon", "coquelicot", "falu red", "zaffre", "wood", "mahogany", "auburn", "turmeric",
    "lemon", "skin", "nude", "walnut", "copper", "chrome", "watermelon", "leopard", "print",
    "tan", "amber", "smoky", "smoked", "coral", "tomato", "rusty", "rust", "steel", "cream",
    "champagne", "matte", "blossom", "graffiti", "sapphire", "velvet", "translucent", "metal",
    "metallic", "iridium", "chroma", "scarlet", "crimson", "ruby", "cherry", "carmine",
    "raspberry", "azure", "cobalt", "sky blue", "emerald", "jade", "mint", "sage",
    "forest green", "hunter green", "kelly green", "canary", "maize", "buttercup", "mustard",
    "dandelion", "honey", "iron", "pumpkin", "terracotta", "salmon", "lilac", "plum", "grape",
    "amethyst", "blush", "bubblegum", "salmon pink", "coral pink", "fuchsia", "neon",
    "carnation", "chestnut", "sienna", "umber", "charcoal", "slate", "ash", "dove", "graphite",
    "pearl", "smoke", "snow", "pearl white", "off-white", "vanilla", "alabaster", "bone",
    "chiffon", "jet", "onyx", "ebony", "charcoal black", "coal", "midnight", "obsidian", "raven",
    "soot",
];

pub fn default_colour_words() -> Vec<String> {
    COLOUR_WORDS.iter().map(|w| w.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOptions {
    pub brand_column: String,
    pub category_column: String,
    pub colour_column: String,
    pub generic_brand: String,
    pub colours: Vec<String>,
}

/// Case-insensitive substring matcher over a colour vocabulary.
#[derive(Debug, Clone)]
pub struct ColourMatcher {
    pattern: Option<Regex>,
}

impl ColourMatcher {
    pub fn new<S: AsRef<str>>(words: &[S]) -> PipelineResult<Self> {
        let alternatives = words
            .iter()
            .map(|w| w.as_ref().trim())
            .filter(|w| !w.is_empty())
            .unique_by(|w| w.to_lowercase())
            .map(regex::escape)
            .join("|");
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = Regex::new(&format!("(?i){alternatives}"))
            .map_err(|err| PipelineError::InvalidArgument(format!("colour vocabulary: {err}")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }

    pub fn flag(&self, cell: &Cell) -> Cell {
        let found = !cell.is_blank() && self.is_match(&cell.as_display());
        Cell::text(if found { YES } else { NO })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditOutcome {
    pub table: Table,
    pub warnings: Vec<String>,
}

/// Adds the brand and colour check columns. `restricted` holds the category
/// codes where a generic brand is not acceptable; `None` means the category
/// file could not provide them and the brand check is skipped.
pub fn audit(
    table: &Table,
    restricted: Option<&HashSet<String>>,
    options: &AuditOptions,
) -> PipelineResult<AuditOutcome> {
    let mut warnings = Vec::new();
    let mut out = table.clone();

    match table.column_index(&options.brand_column) {
        None => warnings.push(format!(
            "'{}' column not found in the input file; brand check skipped",
            options.brand_column
        )),
        Some(brand_idx) => {
            let is_generic = |row: &[Cell]| row[brand_idx].as_display() == options.generic_brand;
            if !table.rows().iter().any(|row| is_generic(row)) {
                warnings.push(format!(
                    "No value '{}' found in '{}' column; brand check skipped",
                    options.generic_brand, options.brand_column
                ));
            } else if let Some(codes) = restricted {
                out = lookup::membership(
                    &out,
                    &options.category_column,
                    codes,
                    CHECK_BRAND,
                    |row, member| Cell::text(if member && is_generic(row) { NO } else { YES }),
                )?;
            } else {
                warnings.push(format!(
                    "'{}' column not found in the category file; brand check skipped",
                    options.category_column
                ));
            }
        }
    }

    if let Some(colour_idx) = table.column_index(&options.colour_column) {
        let matcher = ColourMatcher::new(&options.colours)?;
        let flags = table.column_values(colour_idx).map(|c| matcher.flag(c)).collect();
        out = out.with_column(CHECK_COLOR, flags);
    } else {
        debug!("No '{}' column; colour check skipped", options.colour_column);
    }

    Ok(AuditOutcome {
        table: out,
        warnings,
    })
}

pub fn execute(args: &AuditArgs, session: &mut Session) -> Result<()> {
    let options = session.config().audit_options();
    let load = session.load_options(args.sheet.clone(), args.delimiter, args.input_encoding.as_deref())?;
    info!("Auditing {:?} against {:?}", args.input, args.categories);
    let input = loader::load_table(&args.input, &load)
        .with_context(|| format!("Loading {:?}", args.input))?;

    let restricted = session
        .usable_reference(&args.categories, &options.category_column, &options.category_column)
        .map(|categories| categories.keys());

    let outcome = audit(&input, restricted.as_ref(), &options)
        .with_context(|| format!("Auditing {:?}", args.input))?;
    for message in outcome.warnings {
        session.warn(message);
    }

    let dir = session.ensure_output_dir()?.to_path_buf();
    let name = OutputName::new(
        "Output_PIM",
        session.stamp().date(),
        "csv",
        Disambiguator::Counter,
    );
    let path = session
        .write_output(&dir, &name, |path| {
            io_utils::write_table_csv(path, &outcome.table, &CsvOutput::default().with_bom())
        })
        .with_context(|| format!("Writing audit output in {dir:?}"))?;
    session.record_artifact("audit", &path, outcome.table.row_count());
    info!(
        "Output file {:?} created with {} row(s)",
        path,
        outcome.table.row_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> AuditOptions {
        AuditOptions {
            brand_column: "BRAND".to_string(),
            category_column: "CATEGORY_CODE".to_string(),
            colour_column: "COLOR".to_string(),
            generic_brand: "Generic".to_string(),
            colours: default_colour_words(),
        }
    }

    fn listings() -> Table {
        Table::from_rows(
            vec!["BRAND".into(), "CATEGORY_CODE".into(), "COLOR".into()],
            vec![
                vec![Cell::text("Generic"), Cell::Integer(100), Cell::text("Navy Blue")],
                vec![Cell::text("Generic"), Cell::Integer(200), Cell::text("as shown")],
                vec![Cell::text("Acme"), Cell::Integer(100), Cell::Empty],
            ],
        )
    }

    fn flags(table: &Table, column: &str) -> Vec<String> {
        let idx = table.column_index(column).expect("column");
        table.column_values(idx).map(|c| c.as_display()).collect()
    }

    #[test]
    fn generic_brand_in_restricted_category_fails() {
        let restricted: HashSet<String> = ["100".to_string()].into_iter().collect();
        let outcome = audit(&listings(), Some(&restricted), &options()).expect("audit");
        assert!(outcome.warnings.is_empty());
        assert_eq!(flags(&outcome.table, CHECK_BRAND), vec!["No", "Yes", "Yes"]);
    }

    #[test]
    fn colour_check_is_case_insensitive_and_blank_is_no() {
        let outcome = audit(&listings(), None, &options()).expect("audit");
        assert_eq!(flags(&outcome.table, CHECK_COLOR), vec!["Yes", "No", "No"]);
        assert!(outcome.table.column_index(CHECK_BRAND).is_none());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn empty_restricted_set_passes_every_row() {
        let outcome = audit(&listings(), Some(&HashSet::new()), &options()).expect("audit");
        assert!(outcome.warnings.is_empty());
        assert_eq!(flags(&outcome.table, CHECK_BRAND), vec!["Yes", "Yes", "Yes"]);
    }

    #[test]
    fn missing_brand_column_skips_brand_check() {
        let table = Table::from_rows(vec!["COLOR".into()], vec![vec![Cell::text("RED")]]);
        let outcome = audit(&table, None, &options()).expect("audit");
        assert!(outcome.warnings[0].contains("'BRAND'"));
        assert_eq!(outcome.table.headers(), ["COLOR", CHECK_COLOR]);
    }

    #[test]
    fn matcher_escapes_vocabulary() {
        let matcher = ColourMatcher::new(&["tie-dye", "c++"]).expect("matcher");
        assert!(matcher.is_match("Tie-Dye Shirt"));
        assert!(matcher.is_match("C++"));
        assert!(!matcher.is_match("cotton"));
        assert!(!ColourMatcher::new::<&str>(&[]).expect("empty").is_match("red"));
    }
}
