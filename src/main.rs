use anyhow::Context;
use clap::{Parser, Subcommand};
use geotax::config::{Config, ConfigError, ENV_IPAPI_URL, ENV_NOMINATIM_URL};
use geotax::flow::ResolutionFlow;
use geotax::location::{Coordinate, FixedLocator, IpLocator, Locator, NominatimClient};
use geotax::{rate_percent_field, EstimateForm, RateTable};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// geotax: sales tax estimator with location-based rate pre-fill.
///
/// Statewide 2024 rates only; local sales taxes are not included.
///
/// Examples:
///   geotax estimate --price 100 --rate 7.25
///   geotax locate --lat 45.5152 --lon -122.6784 --price 100
///   geotax locate --auto --price 59.99
///   geotax rates "New York"
///   geotax serve --port 8080
#[derive(Parser)]
#[command(name = "geotax", version, about, long_about = None)]
struct Cli {
    /// Nominatim base URL for reverse geocoding.
    #[arg(long, global = true, env = ENV_NOMINATIM_URL)]
    nominatim_url: Option<String>,

    /// IP geolocation endpoint used by `locate --auto`.
    #[arg(long, global = true, env = ENV_IPAPI_URL)]
    ipapi_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute tax and total from a price and a rate percent.
    Estimate {
        /// Price (lenient: unparseable input counts as 0).
        #[arg(long, allow_hyphen_values = true)]
        price: String,

        /// Tax rate in percent, e.g. 7.25.
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        rate: String,
    },

    /// Detect the region and pre-fill its statewide rate.
    Locate {
        /// Latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true, requires = "lon", conflicts_with = "auto")]
        lat: Option<f64>,

        /// Longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true, requires = "lat", conflicts_with = "auto")]
        lon: Option<f64>,

        /// Auto-detect position via IP geolocation.
        #[arg(long, short = 'a')]
        auto: bool,

        /// Price to estimate.
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        price: String,

        /// Starting rate percent, kept when no rate can be determined.
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        rate: String,
    },

    /// List the rate table, or look up one region (exact name).
    Rates {
        region: Option<String>,
    },

    /// Serve the HTTP JSON API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Estimate { price, rate } => {
            let mut form = EstimateForm::new(price, rate);
            let est = form.recompute();
            eprint!("{}", form.render());
            println!("{}", serde_json::to_string_pretty(&est)?);
        }

        Command::Locate { lat, lon, auto, price, rate } => {
            let table = RateTable::statewide();
            let geocoder = NominatimClient::new(&config.nominatim_url, &config.user_agent);

            let locator: Option<Box<dyn Locator>> = match (lat, lon) {
                (Some(lat), Some(lon)) => {
                    let at = Coordinate::new(lat, lon).context("invalid coordinates")?;
                    Some(Box::new(FixedLocator(at)))
                }
                _ if auto => Some(Box::new(IpLocator::new(&config.ipapi_url, &config.user_agent))),
                _ => None,
            };

            let mut form = EstimateForm::new(price, rate);
            let outcome = ResolutionFlow::new(&table, &geocoder).run(locator.as_deref(), &mut form);

            eprint!("{}", form.render());
            let result = json!({ "outcome": outcome, "form": form });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Rates { region } => {
            let table = RateTable::statewide();
            match region {
                Some(region) => match table.lookup(&region) {
                    Some(rate) => {
                        eprintln!("  {}: {} %", region, rate_percent_field(rate));
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&json!({
                                "region": region,
                                "rate": rate,
                                "rate_percent": rate_percent_field(rate),
                            }))?
                        );
                    }
                    None => {
                        eprintln!(
                            "  No statewide rate for '{}' (names are exact, e.g. \"New York\").",
                            region
                        );
                        std::process::exit(1);
                    }
                },
                None => {
                    if let Some(year) = table.effective_year() {
                        eprintln!("  Statewide sales tax rates effective {}", year);
                    }
                    for (region, rate) in table.iter() {
                        eprintln!("  {:<22} {:>7} %", region, rate_percent_field(rate));
                    }
                    println!("{}", serde_json::to_string_pretty(&table.entries())?);
                }
            }
        }

        Command::Serve { host, port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(geotax::server::start(&host, port, &config))?;
        }
    }

    Ok(())
}

/// Environment first, then explicit flags on top.
fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = Config::from_env()?;
    if let Some(url) = &cli.nominatim_url {
        config.nominatim_url = geotax::config::validate_url(ENV_NOMINATIM_URL, url)?;
    }
    if let Some(url) = &cli.ipapi_url {
        config.ipapi_url = geotax::config::validate_url(ENV_IPAPI_URL, url)?;
    }
    Ok(config)
}
