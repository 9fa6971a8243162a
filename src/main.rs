use cab_compare::config::Settings;
use cab_compare::logging::init_logging;
use cab_compare::server;
use clap::Parser;
use std::path::PathBuf;

/// Cab Compare — ride fare estimator
///
/// Estimates RedTaxi, Ola and Uber fares for a pickup/drop pair given as
/// free-text addresses. Prints the estimate as JSON, or serves it over HTTP.
///
/// Examples:
///   cab-compare "Chennai Central" "Chennai Airport"
///   cab-compare --offline Chennai Salem
///   cab-compare --serve --port 5000
#[derive(Parser)]
#[command(name = "cab-compare", version, about, long_about = None)]
struct Cli {
    /// Pickup address.
    #[arg(index = 1, required_unless_present = "serve")]
    pickup: Option<String>,

    /// Drop address.
    #[arg(index = 2, required_unless_present = "serve")]
    drop: Option<String>,

    /// Run the HTTP server instead of a one-shot estimate.
    #[arg(long)]
    serve: bool,

    /// Settings file (JSON). Defaults to <config dir>/cab-compare/config.json.
    #[arg(long, env = "CAB_COMPARE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "CAB_COMPARE_HOST")]
    host: Option<String>,

    #[arg(long, env = "CAB_COMPARE_PORT")]
    port: Option<u16>,

    /// Offline mode: built-in gazetteer and great-circle routes only.
    #[arg(long)]
    offline: bool,

    /// Geocoder base URL (Nominatim-compatible).
    #[arg(long, env = "CAB_COMPARE_GEOCODER_URL")]
    geocoder_url: Option<String>,

    /// Router base URL (OSRM-compatible).
    #[arg(long, env = "CAB_COMPARE_ROUTER_URL")]
    router_url: Option<String>,

    /// IANA timezone for surge hours (e.g. Asia/Kolkata). Defaults to host time.
    #[arg(long, env = "CAB_COMPARE_TZ")]
    tz: Option<String>,

    /// Log level when RUST_LOG is unset.
    #[arg(long, env = "CAB_COMPARE_LOG")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.offline {
            settings.offline = true;
        }
        if let Some(url) = &self.geocoder_url {
            settings.geocoder_url = url.clone();
        }
        if let Some(url) = &self.router_url {
            settings.router_url = url.clone();
        }
        if let Some(tz) = &self.tz {
            settings.timezone = Some(tz.clone());
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    cli.apply(&mut settings);
    init_logging(&settings.log_level);

    if cli.serve {
        if let Err(e) = server::start(&settings).await {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let pipeline = settings.build_pipeline().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let pickup = cli.pickup.unwrap_or_default();
    let drop = cli.drop.unwrap_or_default();
    let result = tokio::task::spawn_blocking(move || pipeline.estimate(&pickup, &drop)).await;

    match result {
        Ok(Ok(estimate)) => match serde_json::to_string_pretty(&estimate.to_response()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
