//! CSV ingestion, smile grouping and result output.
//!
//! These are the outer collaborators of the calibrator: the numeric core never
//! reads or writes files itself.
//!
//! Input columns: `expiry` (YYYY-MM-DD), `forward`, `discount`, `strike`,
//! `market_iv`, `option_type` (C/CALL/P/PUT, any case), and optionally
//! `tenor` (default empty) and `notional` (default 1.0).

use crate::calibration::types::{CalibrationResult, SmileQuote};
use crate::models::black::OptionSide;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Columns every input file must carry
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "expiry",
    "forward",
    "discount",
    "strike",
    "market_iv",
    "option_type",
];

/// Maturity floor (years) applied when grouping
pub const DEFAULT_MIN_MATURITY: f64 = 0.25;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct CsvRow {
    expiry: String,
    forward: f64,
    discount: f64,
    strike: f64,
    market_iv: f64,
    option_type: String,
    #[serde(default)]
    tenor: Option<String>,
    #[serde(default)]
    notional: Option<f64>,
}

/// One validated quote row
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRow {
    pub expiry: NaiveDate,
    pub tenor: String,
    pub forward: f64,
    pub discount: f64,
    pub strike: f64,
    pub market_iv: f64,
    pub side: OptionSide,
    /// Position size; validated by [`group_smiles`] but not used by the
    /// calibration, which fits each smile unweighted by size.
    pub notional: f64,
}

impl TryFrom<CsvRow> for QuoteRow {
    type Error = anyhow::Error;

    fn try_from(r: CsvRow) -> Result<Self> {
        let expiry = NaiveDate::parse_from_str(r.expiry.trim(), DATE_FORMAT)
            .with_context(|| format!("Invalid expiry date '{}'", r.expiry))?;
        let side = r.option_type.parse::<OptionSide>()?;
        Ok(Self {
            expiry,
            tenor: r.tenor.unwrap_or_default(),
            forward: r.forward,
            discount: r.discount,
            strike: r.strike,
            market_iv: r.market_iv,
            side,
            notional: r.notional.unwrap_or(1.0),
        })
    }
}

/// Grouping key of a smile
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SmileKey {
    pub expiry: NaiveDate,
    pub tenor: String,
}

/// A smile ready for calibration together with its key
#[derive(Debug, Clone, PartialEq)]
pub struct SmileGroup {
    pub key: SmileKey,
    pub quote: SmileQuote,
}

/// Read quote rows from any CSV source.
pub fn read_quote_rows_from<R: std::io::Read>(reader: R) -> Result<Vec<QuoteRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV header")?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!("Missing columns: {:?}", missing));
    }

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let raw = result.with_context(|| format!("Malformed CSV record {}", line + 1))?;
        let row = QuoteRow::try_from(raw).with_context(|| format!("Invalid CSV record {}", line + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read quote rows from a CSV file.
pub fn read_quote_rows(path: impl AsRef<Path>) -> Result<Vec<QuoteRow>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open input CSV {}", path.display()))?;
    read_quote_rows_from(file).with_context(|| format!("Failed to load {}", path.display()))
}

/// Group rows into per-(expiry, tenor) smiles in ascending key order.
///
/// Strikes are sorted ascending inside each group. Every group must quote a
/// single option side, a single positive forward and a single discount in
/// (0, 1], with positive finite strikes, vols and notionals; the first
/// violation is returned as an error naming the smile. Maturity is measured
/// from the earliest expiry in `rows` and floored at `min_maturity`.
pub fn group_smiles(rows: &[QuoteRow], min_maturity: f64) -> Result<Vec<SmileGroup>> {
    let Some(min_expiry) = rows.iter().map(|r| r.expiry).min() else {
        return Ok(Vec::new());
    };

    let mut groups: BTreeMap<SmileKey, Vec<&QuoteRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry(SmileKey {
                expiry: row.expiry,
                tenor: row.tenor.clone(),
            })
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by(|a, b| a.strike.total_cmp(&b.strike));
            validate_group(&members).with_context(|| {
                format!("Invalid smile {} {}", key.expiry.format(DATE_FORMAT), key.tenor)
            })?;
            let first = members[0];
            let days = (key.expiry - min_expiry).num_days() as f64;
            let maturity = (days / 365.0).max(min_maturity);
            let strikes: Vec<f64> = members.iter().map(|r| r.strike).collect();
            let ivs: Vec<f64> = members.iter().map(|r| r.market_iv).collect();
            let quote = SmileQuote::new(first.forward, maturity, &strikes, &ivs)
                .with_discount(first.discount)
                .with_side(first.side);
            Ok(SmileGroup { key, quote })
        })
        .collect()
}

fn positive(value: f64) -> bool {
    value > 0.0 && value.is_finite()
}

fn validate_group(members: &[&QuoteRow]) -> Result<()> {
    let Some(first) = members.first() else {
        return Ok(());
    };
    if !positive(first.forward) {
        return Err(anyhow!("forward={} must be > 0", first.forward));
    }
    if !(first.discount > 0.0 && first.discount <= 1.0) {
        return Err(anyhow!("discount={} must be in (0, 1]", first.discount));
    }
    for row in members {
        if row.side != first.side {
            return Err(anyhow!(
                "mixed option sides {} and {} at strike {}",
                first.side,
                row.side,
                row.strike
            ));
        }
        if row.forward != first.forward || row.discount != first.discount {
            return Err(anyhow!(
                "forward/discount {}/{} at strike {} disagree with {}/{}",
                row.forward,
                row.discount,
                row.strike,
                first.forward,
                first.discount
            ));
        }
        if !positive(row.strike) {
            return Err(anyhow!("strike={} must be > 0", row.strike));
        }
        if !positive(row.market_iv) {
            return Err(anyhow!("market_iv={} at strike {} must be > 0", row.market_iv, row.strike));
        }
        if !positive(row.notional) {
            return Err(anyhow!("notional={} at strike {} must be > 0", row.notional, row.strike));
        }
    }
    Ok(())
}

/// Output record, one per calibrated smile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub expiry: String,
    pub tenor: String,
    pub alpha: f64,
    pub beta: f64,
    pub rho: f64,
    pub nu: f64,
    pub success: bool,
    pub nfev: usize,
    pub rmse_iv: f64,
    pub rmse_iv_bps: f64,
    pub rmse_price_bps: f64,
    pub runtime_ms: f64,
}

impl ResultRow {
    pub fn new(key: &SmileKey, result: &CalibrationResult) -> Self {
        Self {
            expiry: key.expiry.format(DATE_FORMAT).to_string(),
            tenor: key.tenor.clone(),
            alpha: result.params.alpha,
            beta: result.params.beta,
            rho: result.params.rho,
            nu: result.params.nu,
            success: result.success,
            nfev: result.nfev,
            rmse_iv: result.rmse_iv,
            rmse_iv_bps: result.rmse_iv_bps,
            rmse_price_bps: result.rmse_price_bps,
            runtime_ms: result.runtime_ms,
        }
    }
}

/// Write result rows as CSV to any sink.
pub fn write_results_to<W: std::io::Write>(writer: W, rows: &[ResultRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).context("Failed to serialize result row")?;
    }
    wtr.flush().context("Failed to flush results")?;
    Ok(())
}

/// Write result rows to a CSV file, creating parent directories as needed.
pub fn write_results(path: impl AsRef<Path>, rows: &[ResultRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_results_to(file, rows)
}
