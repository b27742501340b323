use chirps_power_wth::error::Result;
use chirps_power_wth::processors::{Pipeline, WthQualityControl};
use chirps_power_wth::readers::WthReader;
use chirps_power_wth::settings::RunConfig;
use chirps_power_wth::sources::ReanalysisTable;
use chirps_power_wth::utils::ProgressReporter;
use chirps_power_wth::writers::WthMerger;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::fs::{self, File};
use std::path::Path;
use tempfile::TempDir;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const LOCATIONS: &str = "ID,Latitude,Longitude,nasapid\n\
    1,14.5,-89.5,501\n\
    2,13.5,-88.5,501\n\
    3,12.5,-87.5,502\n\
    4,north,-89.5,501\n";

// 1 mm/day of rain expressed as a flux
const RAIN_FLUX: &str = "0.000011574074074074073";

/// Reanalysis rows in native units: K, kg/m2/s, m/s, W/m2
fn reanalysis_table() -> String {
    let mut text = String::from("nasapid,time,T2MDEW,T2M_MIN,T2M_MAX,RH2M,PRECTOTCORR,WS2M,ALLSKY_SFC_SW_DWN\n");
    let solar_501 = ["250", "250", "-999", "125", "125"];
    let solar_502 = ["250", "-999", "-999", "-999", "250"];
    for (cell, solar) in [("501", solar_501), ("502", solar_502)] {
        for (day, srad) in solar.iter().enumerate() {
            text.push_str(&format!(
                "{},2020-10-0{},294.15,293.15,303.15,80,{},2.5,{}\n",
                cell,
                day + 1,
                RAIN_FLUX,
                srad
            ));
        }
    }
    text
}

/// 4x3 rainfall raster at 1 degree resolution, upper-left corner at (-90, 15)
fn write_raster(path: &Path, data: &[f32; 12]) {
    let file = File::create(path).unwrap();
    let mut tiff = TiffEncoder::new(file).unwrap();
    let mut image = tiff.new_image::<colortype::Gray32Float>(4, 3).unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33550), &[1.0f64, 1.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33922), &[0.0f64, 0.0, 0.0, -90.0, 15.0, 0.0][..])
        .unwrap();
    image.write_data(&data[..]).unwrap();
}

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let base = root.path();

        fs::write(base.join("points.csv"), LOCATIONS).unwrap();
        fs::write(base.join("nasap.csv"), reanalysis_table()).unwrap();

        let rasters = base.join("chirps");
        fs::create_dir_all(&rasters).unwrap();
        let mut day1 = [1.0f32; 12];
        day1[0] = 2.0;
        day1[5] = 0.0;
        let mut day3 = [1.0f32; 12];
        day3[0] = -9999.0;
        let mut day5 = [1.0f32; 12];
        day5[0] = 4.0;
        write_raster(&rasters.join("chirps-v2.0.2020.10.01.tif"), &day1);
        write_raster(&rasters.join("chirps-v2.0.2020.10.03.tif"), &day3);
        write_raster(&rasters.join("chirps-v2.0.2020.10.05.tif"), &day5);

        Self { root }
    }

    fn path(&self, name: &str) -> String {
        self.root.path().join(name).to_string_lossy().to_string()
    }

    fn config(&self, extra: &[(&'static str, &str)]) -> RunConfig {
        let mut overrides = vec![
            ("input", Some(self.path("points.csv"))),
            ("raster_dir", Some(self.path("chirps"))),
            ("output_dir", Some(self.path("out"))),
            ("cache_dir", Some(self.path("cache"))),
            ("start", Some("2020-10-01".to_string())),
            ("end", Some("2020-10-05".to_string())),
            ("reanalysis", Some("table".to_string())),
            ("reanalysis_table", Some(self.path("nasap.csv"))),
            ("max_workers", Some("2".to_string())),
        ];
        overrides.extend(extra.iter().map(|(k, v)| (*k, Some(v.to_string()))));
        RunConfig::load(None, &overrides).unwrap()
    }

    fn source(&self) -> ReanalysisTable {
        ReanalysisTable::from_path(&self.root.path().join("nasap.csv"), "nasapid").unwrap()
    }
}

#[tokio::test]
async fn test_build_merges_rainfall_and_repairs_radiation() -> Result<()> {
    let workspace = Workspace::new();
    let pipeline = Pipeline::new(workspace.config(&[]), workspace.source());

    let report = pipeline.run(None).await?;

    assert_eq!(report.written, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(report.rejected_rows, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].location_id, "3");
    assert!(report.failed[0].error.contains("cannot be interpolated"));
    assert_eq!(report.quality.srad_missing, 5);
    assert_eq!(report.quality.srad_repaired, 2);
    assert_eq!(report.quality.unrecoverable_locations, 1);

    let out = workspace.root.path().join("out");
    assert!(!out.join("3.WTH").exists());

    let first = WthReader::new().read_file(&out.join("1.WTH"))?;
    let rain: Vec<f64> = first.records.iter().map(|r| r.rain.unwrap()).collect();
    assert_eq!(rain, vec![2.0, 1.0, 1.0, 1.0, 4.0]);
    let solar: Vec<f64> = first.records.iter().map(|r| r.srad.unwrap()).collect();
    assert_eq!(solar, vec![21.6, 21.6, 16.2, 10.8, 10.8]);
    assert_eq!(first.records[0].date, NaiveDate::from_ymd_opt(2020, 10, 1).unwrap());
    assert_eq!(first.records[0].tmax, Some(30.0));
    assert_eq!(first.records[0].wind, Some(216.0));

    assert_eq!(first.header_lines[0], "*WEATHER DATA");
    assert_eq!(
        first.header_lines[3],
        "   UFL       14.5       -89.5        -99  25.0   0.0   2.0   2.0"
    );

    // Zero raster rainfall is kept rather than replaced by the reanalysis value
    let second = WthReader::new().read_file(&out.join("2.WTH"))?;
    assert_eq!(second.records[0].rain, Some(0.0));
    assert_eq!(second.records[1].rain, Some(1.0));

    Ok(())
}

#[tokio::test]
async fn test_skip_existing_and_cache_reuse() -> Result<()> {
    let workspace = Workspace::new();
    let config = workspace.config(&[("reuse_cache", "true")]);
    Pipeline::new(config, workspace.source()).run(None).await?;

    let mut entries: Vec<String> = fs::read_dir(workspace.root.path().join("cache"))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().to_string()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].starts_with("raster_table_20201001-20201005-"));
    assert!(entries[1].starts_with("reanalysis_series_20201001-20201005-"));

    // Rasters are gone: the cached table must be used
    fs::remove_dir_all(workspace.root.path().join("chirps"))?;
    fs::create_dir_all(workspace.root.path().join("chirps"))?;
    fs::remove_file(workspace.root.path().join("out").join("2.WTH"))?;

    let config = workspace.config(&[("reuse_cache", "true"), ("skip_existing", "true")]);
    let report = Pipeline::new(config, workspace.source()).run(None).await?;

    assert_eq!(report.skipped, vec!["1".to_string()]);
    assert_eq!(report.written, vec!["2".to_string()]);
    assert_eq!(report.failed.len(), 1);

    let second = WthReader::new().read_file(&workspace.root.path().join("out").join("2.WTH"))?;
    assert_eq!(second.records[0].rain, Some(0.0));

    Ok(())
}

#[tokio::test]
async fn test_cache_is_not_shared_across_raster_directories() -> Result<()> {
    let workspace = Workspace::new();
    Pipeline::new(workspace.config(&[("reuse_cache", "true")]), workspace.source())
        .run(None)
        .await?;

    let empty = workspace.path("no-rasters");
    fs::create_dir_all(&empty)?;
    let config = workspace.config(&[("reuse_cache", "true"), ("raster_dir", empty.as_str())]);
    Pipeline::new(config, workspace.source()).run(None).await?;

    // No rasters: day 1 falls back to reanalysis rain instead of the cached 0.0
    let second = WthReader::new().read_file(&workspace.root.path().join("out").join("2.WTH"))?;
    assert_eq!(second.records[0].rain, Some(1.0));

    Ok(())
}

#[tokio::test]
async fn test_unknown_cell_fails_only_its_locations() -> Result<()> {
    let workspace = Workspace::new();
    fs::write(
        workspace.root.path().join("points.csv"),
        "ID,Latitude,Longitude,nasapid\n1,14.5,-89.5,501\n9,14.5,-89.5,999\n",
    )?;

    let progress = ProgressReporter::new_spinner("Building...", true);
    let report = Pipeline::new(workspace.config(&[]), workspace.source())
        .run(Some(&progress))
        .await?;

    assert_eq!(report.written, vec!["1".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].location_id, "9");
    assert!(report.failed[0].error.contains("999"));

    Ok(())
}

#[tokio::test]
async fn test_qc_and_merge_of_built_files() -> Result<()> {
    let workspace = Workspace::new();
    Pipeline::new(workspace.config(&[]), workspace.source())
        .run(None)
        .await?;

    let base = workspace.root.path();
    let qc_report = WthQualityControl::new(2).run(&base.join("out"), &base.join("qc"), None)?;
    assert_eq!(qc_report.written, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(qc_report.quality.srad_missing, 0);

    let merge_report = WthMerger::new().merge_directories(&base.join("out"), &base.join("qc"), &base.join("merged"))?;
    assert_eq!(merge_report.merged.len(), 2);

    let merged = WthReader::new().read_file(&base.join("merged").join("1.WTH"))?;
    assert_eq!(merged.records.len(), 10);
    assert_eq!(merged.records[0], merged.records[5]);

    Ok(())
}
