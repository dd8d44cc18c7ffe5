use cursor_budget_engine::prelude::*;
use std::env;

fn format_limit(limit: Option<f64>) -> String {
    match limit {
        Some(limit) => format!("${:.2}", limit),
        None => "not set".to_string(),
    }
}

fn main() -> Result<()> {
    let store_path = default_store_path();
    let mut monitor = UsageMonitor::new(JsonFileStore::open(&store_path)?);

    let args: Vec<String> = env::args().collect();

    if args.len() >= 2 {
        let file_path = shellexpand::tilde(&args[1]).into_owned();
        println!("Loading usage export from: {}", file_path);
        monitor.load_file(&file_path)?;
    } else {
        println!("Restoring saved records from: {}", store_path.display());
        if monitor.restore() == 0 {
            eprintln!("No saved records found.");
            eprintln!();
            eprintln!("Usage: {} [path_to_usage_export.csv]", args[0]);
            std::process::exit(1);
        }
    }

    println!("Loaded {} records", monitor.entry_count());

    let now = Utc::now();
    let settings = monitor.settings();
    let metrics = monitor.budget_metrics(now);

    println!("\n--- Settings ---");
    println!("Billing period day: {}", settings.billing_period_day());
    println!("Monthly cost limit: {}", format_limit(settings.monthly_cost_limit()));

    println!("\n--- Budget ---");
    println!(
        "Billing period: ${:.2} of {} ({:.1}%)",
        metrics.monthly_usage(),
        format_limit(metrics.monthly_limit()),
        metrics.monthly_percentage()
    );
    println!(
        "Work week:      ${:.2} of {} ({:.1}%)",
        metrics.weekly_usage(),
        format_limit(metrics.weekly_limit()),
        metrics.weekly_percentage()
    );
    println!(
        "Work day:       ${:.2} of {} ({:.1}%)",
        metrics.daily_usage(),
        format_limit(metrics.daily_limit()),
        metrics.daily_percentage()
    );

    let filters = monitor.default_filters(now);
    let summary = monitor.cost_summary(&filters);

    println!("\n--- Current Period ---");
    println!("Records: {}", summary.record_count());
    println!("Total cost: ${:.2}", summary.total_cost());
    println!("On-Demand cost: ${:.2}", summary.on_demand_cost());

    println!("\n--- Daily Cost ---");
    for point in monitor.daily_series(&filters) {
        println!(
            "{}: ${:>8.2}  (cumulative ${:.2})",
            point.day(),
            point.daily_cost(),
            point.cumulative_cost()
        );
    }

    println!("\n--- Model Breakdown ---");
    for model in monitor.model_breakdown(&filters) {
        println!(
            "{}: {} requests, {} tokens, ${:.2}",
            model.model(),
            model.record_count(),
            model.tokens().total_tokens(),
            model.cost()
        );
    }

    Ok(())
}
