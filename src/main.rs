// Main entry point for the application

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use std::io::{self, BufRead, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use udpft::client::{Client, Reply};
use udpft::common::config::{ClientConfig, ServerConfig};
use udpft::common::error::{Error, Result};
use udpft::common::types::{ListingMode, DEFAULT_PORT};
use udpft::protocol::{Command, DeleteStatus};
use udpft::server::Server;
use udpft::transfer::{TransferOutcome, TransferReport};

#[derive(Parser)]
#[command(name = "udpft")]
#[command(about = "File transfer over UDP with stop-and-wait retransmission", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a server and read commands from stdin
    Client {
        /// Server IP address
        server: IpAddr,

        /// Server port
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Directory files are downloaded to and uploaded from
        #[arg(long)]
        local_dir: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Serve a directory until a client sends `exit`
    Server {
        /// Port to listen on
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Directory to serve
        #[arg(long)]
        root: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON config file; flags given here take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// How `ls` output travels
    #[arg(long, value_enum)]
    listing: Option<ListingArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListingArg {
    /// One datagram, truncated at 200 bytes
    Datagram,
    /// Sent through the retransmission engine, no size limit
    Framed,
}

impl From<ListingArg> for ListingMode {
    fn from(arg: ListingArg) -> Self {
        match arg {
            ListingArg::Datagram => ListingMode::Datagram,
            ListingArg::Framed => ListingMode::Framed,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let result = match cli.command {
        Commands::Client { server, port, local_dir, common } => {
            run_client(SocketAddr::new(server, port), local_dir, common)
        }
        Commands::Server { port, root, common } => run_server(port, root, common),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_server(port: u16, root: Option<PathBuf>, common: CommonArgs) -> Result<()> {
    let mut config = match &common.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    config.bind_addr.set_port(port);
    if let Some(root) = root {
        config = config.with_root_dir(root);
    }
    if let Some(listing) = common.listing {
        config = config.with_listing_mode(listing.into());
    }
    if !config.root_dir.is_dir() {
        return Err(Error::Config(format!("{:?} is not a directory", config.root_dir)));
    }

    let mut server = Server::bind(config)?;
    server.run()
}

fn run_client(server_addr: SocketAddr, local_dir: Option<PathBuf>, common: CommonArgs) -> Result<()> {
    let mut config = match &common.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    config.server_addr = server_addr;
    if let Some(dir) = local_dir {
        config = config.with_local_dir(dir);
    }
    if let Some(listing) = common.listing {
        config = config.with_listing_mode(listing.into());
    }

    let mut client = Client::connect(config)?.with_progress(true);
    println!("Connected to {} (commands: get <file>, put <file>, delete <file>, ls, exit)", server_addr);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => return Ok(()),
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match client.execute(command) {
            Ok(Reply::Exit) => return Ok(()),
            Ok(reply) => print_reply(&reply),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => println!("{}", e),
        }
    }
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Downloaded { path: None, .. } => println!("File not found on server"),
        Reply::Downloaded { path: Some(path), report } => {
            println!("Downloaded {}", path.display());
            print_report(report);
        }
        Reply::Uploaded(report) if report.outcome == TransferOutcome::Absent => {
            println!("File not found")
        }
        Reply::Uploaded(report) => {
            println!("Uploaded");
            print_report(report);
        }
        Reply::Deleted(DeleteStatus::Deleted) => println!("File deleted"),
        Reply::Deleted(DeleteStatus::NotFound) => println!("File not found on server"),
        Reply::Deleted(DeleteStatus::NoPermission) => println!("Permission denied"),
        Reply::Listing(names) if names.is_empty() => println!("(empty)"),
        Reply::Listing(names) => {
            for name in names {
                println!("{}", name);
            }
        }
        Reply::Exit => {}
    }
}

fn print_report(report: &TransferReport) {
    println!(
        "  {} frames, {} bytes, {} retransmissions",
        report.frames, report.bytes, report.retransmissions
    );
    if let Some(digest) = &report.digest {
        println!("  blake3: {}", digest);
    }
}
