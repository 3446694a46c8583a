use clap::{Parser, Subcommand};
use libwhodat::{Resolver, ResolverConfig};
use std::{
    io::{self, Write},
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use whodat::{
    config::{config_path, default_config_toml, load_config, Config, LogFormat},
    handlers::{resolve_domains, split_domains},
    logging::init_logging,
    AppState,
};

#[derive(Parser, Debug)]
#[command(name = "whodat", version)]
#[command(about = "who-dat - whois, domain age and registration length as a JSON API", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (overrides the config file)
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    /// Print the default config to stdout and exit
    #[arg(long)]
    print_default_config: bool,

    /// Write the default config to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Listen address, e.g. 0.0.0.0:8080
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Resolve a comma-separated list of domains once and print NDJSON
    Lookup {
        /// Domains to resolve (e.g. example.com,example.org)
        domains: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_default_config {
        println!("{}", default_config_toml());
        return Ok(());
    }

    if args.write_default_config {
        let Some(path) = config_path() else {
            return Err("could not determine config path".into());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, default_config_toml())?;
        println!("Default config written to: {}", path.display());
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;
    init_logging(args.log_format.unwrap_or(config.server.log_format));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args.command, config))
}

async fn run(command: Option<Command>, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = Resolver::with_config(ResolverConfig::from(&config.resolver))?;
    let request_timeout = config.server.request_timeout();

    match command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let addr = bind.unwrap_or(config.server.bind);
            let state = AppState::new(Arc::new(resolver), request_timeout);
            whodat::serve(addr, state).await?;
        }
        Command::Lookup { domains } => run_ndjson(&resolver, &domains, request_timeout).await?,
    }

    Ok(())
}

async fn run_ndjson(
    resolver: &Resolver,
    domains: &str,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let domains = split_domains(domains);

    let infos = resolve_domains(resolver, &domains, timeout).await?;

    let mut stdout = io::stdout().lock();
    for info in infos {
        serde_json::to_writer(&mut stdout, &info)?;
        writeln!(stdout)?;
    }
    stdout.flush()?;

    Ok(())
}
