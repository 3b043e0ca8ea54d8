//! Multi-wave indicator drivers.
//!
//! Each driver expresses one of the published indicators through the
//! pipeline primitives: load every wave, aggregate, accumulate across
//! waves, then derive the rate or share once. Waves that yield no usable
//! rows (or whose sources all failed the schema contract) are skipped with
//! a warning and counted; the run fails only when every wave was skipped.
//!
//! Discovery of wave directories and files is the caller's job; drivers
//! receive concrete source lists per wave.

use std::path::PathBuf;

use crate::aggregate::{self, Aggregation, RatioTable, Weighting};
use crate::config::{CohortSelection, WaveConfig};
use crate::error::{PipelineError, Result};
use crate::filter::RecordFilter;
use crate::inflation::{DeflationReport, PriceIndex};
use crate::models::{KeyColumn, KeyValue, STATUS_UNEMPLOYED, SurveyRecord, WaveTable};
use crate::wave::load_wave;

/// The concrete source files of one collection wave
#[derive(Debug, Clone)]
pub struct WaveSources {
    /// Wave label (typically the year-labeled batch directory)
    pub label: String,
    /// Delimited source files belonging to the wave
    pub paths: Vec<PathBuf>,
}

/// Skip accounting for one indicator run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Waves that contributed rows
    pub waves_used: usize,
    /// Waves skipped for yielding no usable rows
    pub waves_skipped: usize,
    /// Individual sources skipped across all waves
    pub sources_skipped: usize,
}

/// An indicator result: the derived table plus skip accounting
#[derive(Debug)]
pub struct IndicatorRun {
    /// The derived measure per cohort
    pub table: RatioTable,
    /// Skip accounting for the run
    pub report: RunReport,
}

/// An income indicator result, with deflation accounting
#[derive(Debug)]
pub struct IncomeRun {
    /// Mean real income per cohort
    pub table: RatioTable,
    /// Skip accounting for the run
    pub report: RunReport,
    /// Per-cause exclusion counts from deflation
    pub deflation: DeflationReport,
}

/// Weighted employment rate per (year, quarter, sex): weighted employed
/// over the weighted total population in scope. Weighted by the occupation
/// weight (`PONDIIO`), the one the published employment series uses.
pub fn employment_rate_by_sex(
    waves: &[WaveSources],
    selection: &CohortSelection,
) -> Result<IndicatorRun> {
    let config = build_config(
        &["ANO4", "TRIMESTRE", "ESTADO", "CH04"],
        Some("PONDIIO"),
        selection,
    );
    let key = [KeyColumn::Year, KeyColumn::Quarter, KeyColumn::Sex];
    let (tables, report) = load_waves(waves, &config)?;

    let employed = accumulate(&tables, &key, Weighting::Weight, Some(RecordFilter::employed()));
    let total = accumulate(&tables, &key, Weighting::Weight, None);
    Ok(IndicatorRun {
        table: aggregate::ratio(&employed, &total)?,
        report,
    })
}

/// Unemployment rate per (year, education level) among the economically
/// active population.
pub fn unemployment_rate_by_education(
    waves: &[WaveSources],
    selection: &CohortSelection,
) -> Result<IndicatorRun> {
    let config = build_config(&["ANO4", "ESTADO", "NIVEL_ED"], None, selection);
    let key = [KeyColumn::Year, KeyColumn::EducationLevel];
    let (tables, report) = load_waves(waves, &config)?;

    let unemployed = accumulate(
        &tables,
        &key,
        Weighting::Count,
        Some(RecordFilter::ActivityStatusIn(vec![STATUS_UNEMPLOYED])),
    );
    let active = accumulate(
        &tables,
        &key,
        Weighting::Count,
        Some(RecordFilter::economically_active()),
    );
    Ok(IndicatorRun {
        table: aggregate::ratio(&unemployed, &active)?,
        report,
    })
}

/// Education-level distribution of the economically active population per
/// (year, quarter): each level's share of the period's PEA. The optional
/// range keeps only the levels of interest in the output; shares stay
/// relative to the full PEA of the period.
pub fn education_distribution(
    waves: &[WaveSources],
    selection: &CohortSelection,
    education_range: Option<(i64, i64)>,
) -> Result<IndicatorRun> {
    let config = build_config(&["ANO4", "TRIMESTRE", "ESTADO", "NIVEL_ED"], None, selection);
    let key = [KeyColumn::Year, KeyColumn::Quarter, KeyColumn::EducationLevel];
    let (tables, report) = load_waves(waves, &config)?;

    let active = accumulate(
        &tables,
        &key,
        Weighting::Count,
        Some(RecordFilter::economically_active()),
    );
    let mut table = aggregate::share_within(&active, 2)?;
    if let Some((min, max)) = education_range {
        table = table.retain_keys(|cohort| match cohort[2] {
            KeyValue::Int(level) => level >= min && level <= max,
            KeyValue::Str(_) => false,
        });
    }
    Ok(IndicatorRun { table, report })
}

/// Weighted activity-sector distribution of the employed per (year,
/// sector code). Enrich the resulting table with a CAES-style lookup via
/// [`crate::lookup::LookupTable::enrich`] when labels are wanted.
pub fn sector_distribution(
    waves: &[WaveSources],
    selection: &CohortSelection,
) -> Result<IndicatorRun> {
    let config = build_config(&["ANO4", "ESTADO", "PP04B_COD"], Some("PONDERA"), selection);
    let key = [KeyColumn::Year, KeyColumn::ActivityCode];
    let (tables, report) = load_waves(waves, &config)?;

    let employed = accumulate(
        &tables,
        &key,
        Weighting::Weight,
        Some(RecordFilter::employed()),
    );
    Ok(IndicatorRun {
        table: aggregate::share_within(&employed, 1)?,
        report,
    })
}

/// Mean inflation-adjusted income per (year, age). Rows without a usable
/// income or price-index entry are excluded and accounted.
pub fn mean_real_income_by_age(
    waves: &[WaveSources],
    selection: &CohortSelection,
    index: &PriceIndex,
) -> Result<IncomeRun> {
    let config = build_config(&["ANO4", "TRIMESTRE", "CH06", "P47T"], None, selection);
    let key = [KeyColumn::Year, KeyColumn::Age];
    let (tables, report) = load_waves(waves, &config)?;

    // Wave boundaries do not matter for the mean, so the waves collapse
    // into one record set before deflation and grouping.
    let records: Vec<SurveyRecord> = tables
        .into_iter()
        .flat_map(|table| table.records)
        .collect();
    let (_, deflation) = index.deflate(&records);
    let table = aggregate::mean_of(&records, &key, |record| index.real_income_of(record));

    Ok(IncomeRun {
        table,
        report,
        deflation,
    })
}

/// Load every wave, skipping empty ones, and account for skips.
///
/// # Errors
/// `NoUsableWaves` when every wave was skipped.
fn load_waves(waves: &[WaveSources], config: &WaveConfig) -> Result<(Vec<WaveTable>, RunReport)> {
    let mut tables = Vec::with_capacity(waves.len());
    let mut report = RunReport::default();
    for wave in waves {
        match load_wave(&wave.label, &wave.paths, config) {
            Ok(table) => {
                report.waves_used += 1;
                report.sources_skipped += table.skipped_sources;
                tables.push(table);
            }
            Err(PipelineError::EmptyWave { wave }) => {
                log::warn!("skipping wave '{wave}': no usable rows");
                report.waves_skipped += 1;
            }
            Err(other) => return Err(other),
        }
    }
    if tables.is_empty() {
        return Err(PipelineError::NoUsableWaves);
    }
    Ok((tables, report))
}

/// Aggregate every wave table and fold the results together.
fn accumulate(
    tables: &[WaveTable],
    key: &[KeyColumn],
    weighting: Weighting,
    filter: Option<RecordFilter>,
) -> Aggregation {
    let mut merged: Option<Aggregation> = None;
    for table in tables {
        let agg = aggregate::aggregate(&table.records, key, weighting, filter.as_ref());
        match &mut merged {
            Some(accumulated) => accumulated.merge(agg),
            None => merged = Some(agg),
        }
    }
    merged.unwrap_or(Aggregation {
        key: key.to_vec(),
        cells: std::collections::BTreeMap::new(),
    })
}

/// Build the wave config for one driver. `weight` names the raw weight
/// column the indicator reads (extracts carry several side by side); it is
/// required under the canonical `PONDERA` label and renamed onto it.
fn build_config(
    columns: &[&str],
    weight: Option<&str>,
    selection: &CohortSelection,
) -> WaveConfig {
    let mut required: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
    for column in selection.required_columns() {
        let label = column.label().to_string();
        if !required.contains(&label) {
            required.push(label);
        }
    }

    let mut config = WaveConfig {
        required,
        filters: selection.filters(),
        ..WaveConfig::default()
    };
    if let Some(raw) = weight {
        config.required.push("PONDERA".to_string());
        if raw != "PONDERA" {
            config.renames.insert(raw.to_string(), "PONDERA".to_string());
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CohortKey;
    use smallvec::smallvec;
    use std::path::Path;

    fn write_wave(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_weighted_employment_rate_two_waves() {
        // Wave A: 3 employed rows (weight 10 each) + 1 unemployed (weight 5)
        // Wave B: 2 employed rows (weight 8) + 2 unemployed (weight 4 each)
        // Overall rate: (30 + 16) / (30 + 16 + 5 + 8) = 46/59
        let dir = tempfile::tempdir().unwrap();
        let a = write_wave(
            dir.path(),
            "a.txt",
            "ANO4;TRIMESTRE;ESTADO;CH04;PONDERA\n\
             2023;1;1;1;10\n2023;1;1;1;10\n2023;1;1;1;10\n2023;1;2;1;5\n",
        );
        let b = write_wave(
            dir.path(),
            "b.txt",
            "ANO4;TRIMESTRE;ESTADO;CH04;PONDIIO\n\
             2023;1;1;1;8\n2023;1;1;1;8\n2023;1;2;1;4\n2023;1;2;1;4\n",
        );
        let waves = vec![
            WaveSources { label: "2023a".into(), paths: vec![a] },
            WaveSources { label: "2023b".into(), paths: vec![b] },
        ];

        let run = employment_rate_by_sex(&waves, &CohortSelection::default()).unwrap();
        let cohort: CohortKey =
            smallvec![KeyValue::Int(2023), KeyValue::Int(1), KeyValue::Int(1)];
        let rate = run.table.cells[&cohort].unwrap();
        assert!((rate - 46.0 / 59.0).abs() < 1e-9);
        assert_eq!(run.report.waves_used, 2);
        assert_eq!(run.report.waves_skipped, 0);
    }

    #[test]
    fn test_employment_rate_reads_occupation_weight_from_full_extract() {
        // Real extracts carry PONDERA, PONDIIO and PONDII side by side; the
        // employment rate must come from PONDIIO (here 30/40), not from the
        // coexisting PONDERA column (which would give 0.5).
        let dir = tempfile::tempdir().unwrap();
        let path = write_wave(
            dir.path(),
            "full.txt",
            "ANO4;TRIMESTRE;ESTADO;CH04;PONDERA;PONDIIO;PONDII\n\
             2023;1;1;1;99;30;1\n2023;1;2;1;99;10;1\n",
        );
        let waves = vec![WaveSources { label: "2023".into(), paths: vec![path] }];

        let run = employment_rate_by_sex(&waves, &CohortSelection::default()).unwrap();
        let cohort: CohortKey =
            smallvec![KeyValue::Int(2023), KeyValue::Int(1), KeyValue::Int(1)];
        let rate = run.table.cells[&cohort].unwrap();
        assert!((rate - 0.75).abs() < 1e-12);
        assert_eq!(run.report.sources_skipped, 0);
    }

    #[test]
    fn test_run_skips_empty_waves_and_fails_without_usable_data() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_wave(
            dir.path(),
            "good.txt",
            "ANO4;TRIMESTRE;ESTADO;CH04;PONDERA\n2022;2;1;2;7\n",
        );
        let empty = write_wave(dir.path(), "empty.txt", "FOO;BAR\n1;2\n");

        let waves = vec![
            WaveSources { label: "2022".into(), paths: vec![good] },
            WaveSources { label: "broken".into(), paths: vec![empty.clone()] },
        ];
        let run = employment_rate_by_sex(&waves, &CohortSelection::default()).unwrap();
        assert_eq!(run.report.waves_used, 1);
        assert_eq!(run.report.waves_skipped, 1);

        let all_broken = vec![WaveSources { label: "broken".into(), paths: vec![empty] }];
        let err = employment_rate_by_sex(&all_broken, &CohortSelection::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoUsableWaves));
    }

    #[test]
    fn test_education_distribution_range_keeps_shares_relative() {
        let dir = tempfile::tempdir().unwrap();
        // Four PEA rows: levels 1, 2, 2, 9 (9 falls outside the range)
        let path = write_wave(
            dir.path(),
            "w.txt",
            "ANO4;TRIMESTRE;ESTADO;NIVEL_ED\n\
             2021;3;1;1\n2021;3;2;2\n2021;3;1;2\n2021;3;1;9\n",
        );
        let waves = vec![WaveSources { label: "2021".into(), paths: vec![path] }];

        let run =
            education_distribution(&waves, &CohortSelection::default(), Some((1, 7))).unwrap();
        let k1: CohortKey =
            smallvec![KeyValue::Int(2021), KeyValue::Int(3), KeyValue::Int(1)];
        let k2: CohortKey =
            smallvec![KeyValue::Int(2021), KeyValue::Int(3), KeyValue::Int(2)];
        let k9: CohortKey =
            smallvec![KeyValue::Int(2021), KeyValue::Int(3), KeyValue::Int(9)];
        assert!((run.table.cells[&k1].unwrap() - 0.25).abs() < 1e-12);
        assert!((run.table.cells[&k2].unwrap() - 0.5).abs() < 1e-12);
        assert!(!run.table.cells.contains_key(&k9));
    }

    #[test]
    fn test_sector_distribution_sums_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wave(
            dir.path(),
            "w.txt",
            "ANO4;ESTADO;PP04B_COD;PONDERA\n\
             2021;1;0401;30\n2021;1;0502;10\n2021;2;0401;99\n",
        );
        let waves = vec![WaveSources { label: "2021".into(), paths: vec![path] }];

        let run = sector_distribution(&waves, &CohortSelection::default()).unwrap();
        let total: f64 = run.table.cells.values().map(|v| v.unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-12);
        let commerce: CohortKey =
            smallvec![KeyValue::Int(2021), KeyValue::Str("0401".to_string())];
        assert!((run.table.cells[&commerce].unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_mean_real_income_by_age() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wave(
            dir.path(),
            "w.txt",
            "ANO4;TRIMESTRE;CH06;P47T\n\
             2020;1;30;50000\n2020;1;30;70000\n2020;1;40;-5\n2021;1;30;10000\n",
        );
        let waves = vec![WaveSources { label: "2020".into(), paths: vec![path] }];
        let index = PriceIndex::from_pairs([(crate::models::Period::Quarter(2020, 1), 100.0)])
            .unwrap();

        let run =
            mean_real_income_by_age(&waves, &CohortSelection::default(), &index).unwrap();
        let cohort: CohortKey = smallvec![KeyValue::Int(2020), KeyValue::Int(30)];
        assert_eq!(run.table.cells[&cohort], Some(600.0));
        assert_eq!(run.deflation.adjusted, 2);
        assert_eq!(run.deflation.no_income, 1);
        // 2021-T1 has no index entry
        assert_eq!(run.deflation.missing_index, 1);
    }
}
