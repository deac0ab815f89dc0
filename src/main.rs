use cip_planner::api::{csrf_token_from_cookie, ApiClient, Message};
use cip_planner::export::{export_filename, write_csv};
use cip_planner::{Action, Planner, PlannerProps};
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};

const USAGE: &str =
    "usage: cip-planner <snapshot.json> [--portfolio <id>] [--export] [--save <base-url>]";

struct Args {
    snapshot: String,
    portfolio_id: Option<u64>,
    export: bool,
    save_url: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, Box<dyn Error>> {
    let snapshot = args.next().ok_or(USAGE)?;
    let mut parsed = Args {
        snapshot,
        portfolio_id: None,
        export: false,
        save_url: None,
    };

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--portfolio" => {
                let id = args.next().ok_or("--portfolio requires an id")?;
                parsed.portfolio_id = Some(id.parse()?);
            }
            "--export" => parsed.export = true,
            "--save" => parsed.save_url = Some(args.next().ok_or("--save requires a base url")?),
            other => return Err(format!("unknown argument '{other}'\n{USAGE}").into()),
        }
    }
    Ok(parsed)
}

/// Terminal stand-in for the browser confirm dialog.
fn terminal_confirm(message: &str) -> bool {
    eprint!("{message} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    answer.trim().eq_ignore_ascii_case("y")
}

fn print_totals(planner: &Planner) {
    let portfolio = planner.portfolio();
    let name = if portfolio.name.is_empty() { "(unnamed)" } else { &portfolio.name };
    println!("Portfolio: {name}");
    println!("  phases: {}", portfolio.items.len());
    println!("  remaining candidates: {}", planner.remaining().len());
    println!("  total budget impact: {:.2}", portfolio.totals.budget_impact);

    if !portfolio.totals.estimated_cost_by_year.is_empty() {
        println!("  estimated cost by year:");
        for (year, cost) in &portfolio.totals.estimated_cost_by_year {
            println!("    {year}: {cost:.2}");
        }
    }
    if !portfolio.totals.funded_amount_by_year.is_empty() {
        println!("  funded amount by year:");
        for (year, amount) in &portfolio.totals.funded_amount_by_year {
            println!("    {year}: {amount:.2}");
        }
    }
    for (year, zones) in &portfolio.totals.zone_cost_by_year {
        let breakdown = zones
            .iter()
            .map(|(zone, cost)| format!("{zone}={:.0}", cost))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  zone costs {year}: {breakdown}");
    }
}

async fn save(planner: &mut Planner, base_url: &str) -> Result<(), Box<dyn Error>> {
    let cookies = std::env::var("CIP_COOKIE")
        .map_err(|_| "set CIP_COOKIE to the session cookie string to save")?;
    let token = csrf_token_from_cookie(&cookies).ok_or("no csrftoken in CIP_COOKIE")?;
    let client = ApiClient::new(base_url, &token)?;

    planner.apply(Action::SaveStarted)?;
    match client.save_portfolio(planner.portfolio(), planner.user()).await {
        Ok(record) => {
            let id = record.id;
            planner.apply(Action::SaveSucceeded { record })?;
            println!("Saved portfolio {id}");
        }
        Err(error) => {
            planner.apply(Action::SaveFailed)?;
            let message = Message::failure("An error occurred saving the portfolio.", &error);
            eprintln!("{}", message.text);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let snapshot = fs::read_to_string(&args.snapshot)
        .map_err(|e| format!("failed to read snapshot '{}': {e}", args.snapshot))?;
    let props = PlannerProps::from_json(&snapshot)?;
    let mut planner = Planner::from_props(props, Box::new(terminal_confirm));

    if let Some(id) = args.portfolio_id {
        planner.apply(Action::SelectPortfolio { id })?;
    }

    print_totals(&planner);

    if args.export {
        let filename = export_filename(
            &planner.portfolio().name,
            chrono::Local::now().date_naive(),
        );
        let file = fs::File::create(&filename)?;
        write_csv(planner.portfolio(), file)?;
        println!("Exported {} rows to {filename}", planner.portfolio().items.len());
    }

    if let Some(base_url) = &args.save_url {
        save(&mut planner, base_url).await?;
    }

    Ok(())
}
