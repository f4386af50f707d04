use chrono::{Duration, NaiveDate};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use stock_forecast::{BatchPipeline, Forecaster, PipelineConfig, ProductId};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    stock_forecast::logging::init_tracing("info", false);

    println!("Stock Forecast: Basic Forecasting Example");
    println!("=========================================\n");

    let workspace = tempfile::tempdir()?;
    let raw_path = workspace.path().join("transactions.csv");

    println!("Creating sample transactions...");
    let rows = write_sample_transactions(&raw_path)?;
    println!("Wrote {} transaction rows\n", rows);

    let mut config = PipelineConfig::default().with_data_dir(workspace.path().join("data"));
    config.training.forest.n_trees = 50;

    println!("Running pipeline...");
    let pipeline = BatchPipeline::new(config.clone())?;
    let job = pipeline.spawn(raw_path, |stage| println!("  {}...", stage))?;
    let report = job.join()?;

    println!(
        "\nTrained {} products, skipped {}",
        report.training.trained_count(),
        report.training.skipped_count()
    );
    for (product, rmse) in &report.rmse {
        println!("  EAN {} - RMSE: {:.4}", product, rmse);
    }

    let forecaster = Forecaster::new(config.forecast)?;
    for raw_id in ["5901234123457", "4006381333931", "999"] {
        let product: ProductId = raw_id.parse()?;
        println!("\nForecast for {}:", product);
        match forecaster.forecast_latest(&product, &pipeline.artifacts())?.found() {
            Some(result) => {
                for (i, point) in result.forecast.iter().enumerate() {
                    println!("  Week {} ({}): {} units", i + 1, point.week_start, point.units);
                }
            }
            None => println!("  unknown product"),
        }
    }

    Ok(())
}

/// Two products with a seasonal weekly pattern over one year
fn write_sample_transactions(path: &Path) -> std::io::Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "product_id,quantity,creation_timestamp")?;

    let first_day = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut rows = 0;
    for day in 0..364 {
        let date = first_day + Duration::days(day);
        let week = (day / 7) as f64;
        let stamp = date.format("%b %d, %Y, 09:30 AM");

        let a = 5.0 + 3.0 * (week / 4.0).sin();
        writeln!(writer, "5901234123457.0,{:.0},\"{}\"", a.max(0.0), stamp)?;
        rows += 1;

        if day % 3 == 0 {
            let b = 2.0 + (week % 5.0);
            writeln!(writer, "4006381333931,{:.0},\"{}\"", b, stamp)?;
            rows += 1;
        }
    }

    writer.flush()?;
    Ok(rows)
}
