// src/recipe/run.rs
use super::{Format, GridConversion, HeaderSpec, Recipe, Step};
use crate::error::{Error, Result};
use crate::grid::{open_grid, GridSource, GridVariable};
use crate::header::{
    apply_header, clean_name, ensure_unique, extract_header_row_with_delimiter, merge_headers,
};
use crate::label::LabelParser;
use crate::render::{render_grid, render_table};
use crate::table::{read_csv, Table};
use crate::vector::{read_kmz, EqualArea};
use crate::fetch;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{info, instrument};

/// What one document run produced.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunReport {
    pub name: String,
    pub source: PathBuf,
    pub columns: Vec<String>,
    pub rows: usize,
    /// Files written besides the source: extracted archive members.
    pub artifacts: Vec<PathBuf>,
}

/// Loader → Parser → Reshaper → Renderer, once, top to bottom.
/// Any error aborts the document.
#[instrument(level = "info", skip_all, fields(recipe = %recipe.name))]
pub async fn run<W: Write>(
    recipe: &Recipe,
    client: &Client,
    work_dir: &Path,
    out: &mut W,
) -> Result<RunReport> {
    let start = Instant::now();
    let source = match (&recipe.source.url, &recipe.source.path) {
        (Some(url), _) => fetch::download_file(client, url, work_dir).await?,
        (None, Some(path)) => path.clone(),
        (None, None) => return Err(Error::Recipe("recipe has no source".into())),
    };
    let report = process(recipe, &source, work_dir, out)?;
    info!(elapsed = ?start.elapsed(), rows = report.rows, "document done");
    Ok(report)
}

/// Everything after the loader: parse `source`, reshape, render to `out`.
pub fn process<W: Write>(
    recipe: &Recipe,
    source: &Path,
    work_dir: &Path,
    out: &mut W,
) -> Result<RunReport> {
    let mut artifacts = Vec::new();
    let render_err = |e: std::io::Error| Error::Recipe(format!("rendering: {}", e));

    let table = match &recipe.format {
        Format::Csv {
            delimiter,
            header,
            data_skip,
        } => {
            let delimiter = delimiter.map(|c| c as u8);
            read_csv_document(source, delimiter, header.as_ref(), *data_skip)?
        }
        Format::Netcdf {
            variable,
            slice,
            convert,
        } => {
            let grid = open_grid(source)?;
            let variable =
                read_grid_document(grid.as_ref(), variable, slice.iter(), convert.as_ref())?;
            if variable.values.ndim() == 2 {
                render_grid(out, &variable)?;
            }
            variable.to_table()?
        }
        Format::Kmz { dissolve_by } => {
            let dest = work_dir.join(format!("{}_extracted", clean_name(&recipe.name)));
            let (features, extracted) = read_kmz(source, &dest)?;
            artifacts = extracted;
            let features = match dissolve_by {
                Some(attr) => features.dissolve(attr)?,
                None => features,
            };
            features.to_table(&EqualArea::wgs84())?
        }
    };

    let table = apply_steps(table, &recipe.steps)?;
    writeln!(out, "# {}", recipe.name).map_err(render_err)?;
    render_table(out, &table, recipe.max_rows).map_err(render_err)?;

    Ok(RunReport {
        name: recipe.name.clone(),
        source: source.to_path_buf(),
        columns: table.columns().to_vec(),
        rows: table.row_count(),
        artifacts,
    })
}

fn read_csv_document(
    source: &Path,
    delimiter: Option<u8>,
    header: Option<&HeaderSpec>,
    data_skip: usize,
) -> Result<Table> {
    let mut table = read_csv(source, data_skip, None, delimiter)?;
    let Some(header) = header else {
        return Ok(table);
    };

    let top = extract_header_row_with_delimiter(source, header.skip_rows, 1, delimiter)?;
    let labels = if header.rows == 2 {
        let bottom = extract_header_row_with_delimiter(source, header.skip_rows + 1, 1, delimiter)?;
        merge_headers(&top, &bottom, &header.sentinel)?
    } else {
        top
    };
    if header.unique {
        ensure_unique(&labels)?;
    }
    apply_header(&mut table, &labels)?;
    Ok(table)
}

fn read_grid_document<'a>(
    grid: &dyn GridSource,
    variable: &str,
    slice: impl Iterator<Item = (&'a String, &'a usize)>,
    convert: Option<&GridConversion>,
) -> Result<GridVariable> {
    let mut var = grid.read_variable(variable)?;
    for (dim, &idx) in slice {
        var = var.slice(dim, idx)?;
    }
    if let Some(c) = convert {
        var = var.convert_units(c.factor, c.offset, c.units.as_deref());
    }
    Ok(var)
}

/// Apply reshaping steps in order.
pub fn apply_steps(mut table: Table, steps: &[Step]) -> Result<Table> {
    for step in steps {
        table = apply_step(&table, step)?;
    }
    Ok(table)
}

fn apply_step(table: &Table, step: &Step) -> Result<Table> {
    match step {
        Step::Filter {
            column,
            equals,
            pattern,
            non_empty,
        } => {
            let regex = pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| Error::Recipe(format!("filter pattern: {}", e)))?;
            table.filter_rows(column, |v| {
                equals.as_deref().map_or(true, |e| v == e)
                    && regex.as_ref().map_or(true, |r| r.is_match(v))
                    && (!*non_empty || !v.trim().is_empty())
            })
        }
        Step::Rename { from, to } => table.rename(from, to),
        Step::Select { columns } => {
            let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
            table.select(&cols)
        }
        Step::PivotLonger {
            id_columns,
            names_to,
            values_to,
        } => {
            let ids: Vec<&str> = id_columns.iter().map(String::as_str).collect();
            table.pivot_longer(&ids, names_to, values_to)
        }
        Step::PivotWider {
            names_from,
            values_from,
        } => table.pivot_wider(names_from, values_from),
        Step::ConvertUnits {
            column,
            factor,
            offset,
        } => table.convert_units(column, *factor, *offset),
        Step::SplitLabel { column, patterns } => {
            let parser = patterns
                .iter()
                .try_fold(LabelParser::new(), |p, lp| p.with_pattern(&lp.name, &lp.pattern))?;
            split_label(table, column, &parser)
        }
    }
}

/// Append the fields parsed out of `column` as new columns, in order of
/// first appearance. A cell no pattern matches aborts the step.
fn split_label(table: &Table, column: &str, parser: &LabelParser) -> Result<Table> {
    let values = table.column_values(column)?;
    let matches = values
        .iter()
        .map(|v| parser.parse(v))
        .collect::<Result<Vec<_>>>()?;

    let mut fields: Vec<String> = Vec::new();
    for m in &matches {
        for key in m.fields.keys() {
            if !fields.contains(key) {
                fields.push(key.clone());
            }
        }
    }

    let mut columns = table.columns().to_vec();
    columns.extend(fields.iter().cloned());
    let rows = table
        .rows()
        .iter()
        .zip(&matches)
        .map(|(row, m)| {
            let mut row = row.clone();
            row.extend(fields.iter().map(|f| m.get(f).unwrap_or_default().to_string()));
            row
        })
        .collect();
    Table::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{LabelPattern, Source};
    use tempfile::NamedTempFile;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,datawalk::recipe=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn csv_file(content: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(content.as_bytes()).unwrap();
        tmp
    }

    const RESULTS: &str = "Ergebnisse;;;\n\
Gebiet;Partei;Erststimmen;Erststimmen\n\
;;Anzahl;Anteil\n\
Kiel;SPD;100;0,31\n\
Kiel;CDU;90;0,28\n\
;;;\n\
Flensburg;SPD;80;0,35\n";

    fn csv_recipe(path: &Path, steps: Vec<Step>, unique: bool) -> Recipe {
        Recipe {
            name: "kiel".into(),
            source: Source {
                url: None,
                path: Some(path.to_path_buf()),
            },
            format: Format::Csv {
                delimiter: None,
                header: Some(HeaderSpec {
                    skip_rows: 1,
                    rows: 2,
                    sentinel: "x".into(),
                    unique,
                }),
                data_skip: 3,
            },
            steps,
            max_rows: 10,
        }
    }

    #[test]
    fn csv_document_end_to_end() {
        init_test_logging();
        let src = csv_file(RESULTS);
        let work = tempfile::tempdir().unwrap();
        let recipe = csv_recipe(
            src.path(),
            vec![
                Step::Filter {
                    column: "gebiet".into(),
                    equals: None,
                    pattern: None,
                    non_empty: true,
                },
                Step::ConvertUnits {
                    column: "erststimmen_anteil".into(),
                    factor: 100.0,
                    offset: 0.0,
                },
                Step::Rename {
                    from: "erststimmen_anzahl".into(),
                    to: "stimmen".into(),
                },
            ],
            true,
        );

        let mut out = Vec::new();
        let report = process(&recipe, src.path(), work.path(), &mut out).unwrap();
        assert_eq!(
            report.columns,
            vec!["gebiet", "partei", "stimmen", "erststimmen_anteil"]
        );
        assert_eq!(report.rows, 3);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# kiel\n"));
        assert!(text.contains("Flensburg"));
        assert!(text.contains("35"));
    }

    #[test]
    fn duplicate_labels_abort_when_unique() {
        let src = csv_file("a;a\nx;x\n1;2\n");
        let mut recipe = csv_recipe(src.path(), vec![], true);
        recipe.format = Format::Csv {
            delimiter: Some(';'),
            header: Some(HeaderSpec {
                skip_rows: 0,
                rows: 2,
                sentinel: "x".into(),
                unique: true,
            }),
            data_skip: 2,
        };
        let work = tempfile::tempdir().unwrap();
        let err = process(&recipe, src.path(), work.path(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel { .. }));

        if let Format::Csv { header: Some(h), .. } = &mut recipe.format {
            h.unique = false;
        }
        let report = process(&recipe, src.path(), work.path(), &mut Vec::new()).unwrap();
        assert_eq!(report.columns, vec!["a", "a"]);
    }

    #[test]
    fn split_label_appends_fields() {
        let table = Table::new(
            vec!["label".into()],
            vec![vec!["erststimmen_anzahl".into()], vec!["gebiet".into()]],
        )
        .unwrap();
        let steps = vec![Step::SplitLabel {
            column: "label".into(),
            patterns: vec![
                LabelPattern {
                    name: "pair".into(),
                    pattern: r"(?P<vote>[a-z]+)_(?P<measure>[a-z]+)".into(),
                },
                LabelPattern {
                    name: "single".into(),
                    pattern: r"(?P<vote>[a-z]+)".into(),
                },
            ],
        }];
        let out = apply_steps(table.clone(), &steps).unwrap();
        assert_eq!(out.columns(), &["label", "measure", "vote"]);
        assert_eq!(out.rows()[0], vec!["erststimmen_anzahl", "anzahl", "erststimmen"]);
        assert_eq!(out.rows()[1], vec!["gebiet", "", "gebiet"]);

        let strict = vec![Step::SplitLabel {
            column: "label".into(),
            patterns: vec![LabelPattern {
                name: "pair".into(),
                pattern: r"(?P<vote>[a-z]+)_(?P<measure>[a-z]+)".into(),
            }],
        }];
        assert!(matches!(
            apply_steps(table, &strict),
            Err(Error::NoMatch { .. })
        ));
    }

    #[test]
    fn kmz_document_reports_only_freshly_extracted_files() {
        init_test_logging();
        let kml = r#"<kml><Document>
<Placemark><name>a</name><ExtendedData><Data name="land"><value>SH</value></Data></ExtendedData>
<Polygon><outerBoundaryIs><LinearRing><coordinates>9,54 10,54 10,55 9,55 9,54</coordinates></LinearRing></outerBoundaryIs></Polygon></Placemark>
<Placemark><name>b</name><ExtendedData><Data name="land"><value>SH</value></Data></ExtendedData>
<Polygon><outerBoundaryIs><LinearRing><coordinates>10,54 11,54 11,55 10,55 10,54</coordinates></LinearRing></outerBoundaryIs></Polygon></Placemark>
</Document></kml>"#;
        let kmz = crate::archive::tests::zip_file(&[("doc.kml", kml.as_bytes())]);
        let work = tempfile::tempdir().unwrap();
        let dest = work.path().join("lander_bund_extracted");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("earlier_run.kml"), "<kml/>").unwrap();

        let recipe = Recipe {
            name: "Länder/Bund".into(),
            source: Source {
                url: None,
                path: Some(kmz.path().to_path_buf()),
            },
            format: Format::Kmz {
                dissolve_by: Some("land".into()),
            },
            steps: vec![Step::Select {
                columns: vec!["land".into(), "geometry_type".into()],
            }],
            max_rows: 5,
        };
        let mut out = Vec::new();
        let report = process(&recipe, kmz.path(), work.path(), &mut out).unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(report.columns, vec!["land", "geometry_type"]);
        assert_eq!(
            report.artifacts,
            vec![dest.join("doc.kml")]
        );
        assert!(String::from_utf8(out).unwrap().contains("MULTIPOLYGON"));
    }

    #[tokio::test]
    async fn local_source_skips_fetch() {
        init_test_logging();
        let src = csv_file("a,b\n1,2\n");
        let work = tempfile::tempdir().unwrap();
        let recipe = Recipe {
            name: "plain".into(),
            source: Source {
                url: None,
                path: Some(src.path().to_path_buf()),
            },
            format: Format::Csv {
                delimiter: None,
                header: Some(HeaderSpec {
                    skip_rows: 0,
                    rows: 1,
                    sentinel: "x".into(),
                    unique: true,
                }),
                data_skip: 1,
            },
            steps: vec![],
            max_rows: 5,
        };
        let report = run(&recipe, &Client::new(), work.path(), &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(report.columns, vec!["a", "b"]);
        assert_eq!(report.rows, 1);
    }

    #[test]
    fn netcdf_without_support_is_source_error() {
        let work = tempfile::tempdir().unwrap();
        let recipe = Recipe {
            name: "tas".into(),
            source: Source {
                url: None,
                path: Some(PathBuf::from("missing.nc")),
            },
            format: Format::Netcdf {
                variable: "tas".into(),
                slice: Default::default(),
                convert: None,
            },
            steps: vec![],
            max_rows: 5,
        };
        let err = process(&recipe, Path::new("missing.nc"), work.path(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::SourceRead { .. }));
    }

    #[test]
    fn grid_document_slices_and_converts() {
        use crate::grid::{AttributeValue, MemoryGrid};
        use ndarray::{ArrayD, IxDyn};
        use std::collections::BTreeMap;

        let grid = MemoryGrid::new()
            .with_variable(
                "tas",
                &["time", "y", "x"],
                ArrayD::from_shape_vec(IxDyn(&[2, 1, 2]), vec![273.15, -1.0, 283.15, 293.15])
                    .unwrap(),
                BTreeMap::from([("_FillValue".to_string(), AttributeValue::Number(-1.0))]),
            )
            .unwrap();
        let slice = BTreeMap::from([("time".to_string(), 0usize)]);
        let conv = GridConversion {
            factor: 1.0,
            offset: -273.15,
            units: Some("degC".into()),
        };
        let var = read_grid_document(&grid, "tas", slice.iter(), Some(&conv)).unwrap();
        assert_eq!(var.dimensions, vec!["y", "x"]);
        assert_eq!(var.value(&[0, 0]), Some(0.0));
        assert_eq!(var.value(&[0, 1]), None);
    }
}
