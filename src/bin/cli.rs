//! TinySQL CLI Client
//!
//! Reads `;`-terminated statements from stdin and sends them to the server.

use std::io;

use clap::Parser;
use tinysql::client::{parse_statement, read_statement, Statement};
use tinysql::{Client, ClientConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// TinySQL CLI
#[derive(Parser, Debug)]
#[command(name = "tinysql-cli")]
#[command(about = "Interactive client for the TinySQL server")]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short = 'P', long, default_value = "4000")]
    port: u16,

    /// User to connect as
    #[arg(short = 'U', long, default_value = "root")]
    user: String,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let args = Args::parse();

    let config = match ClientConfig::builder()
        .server_addr(format!("{}:{}", args.host, args.port))
        .user(&args.user)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let client = match Client::connect(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    eprintln!("successfully connected to server");

    std::process::exit(run(client));
}

/// Statement loop; returns the process exit code
fn run(mut client: Client) -> i32 {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        let raw = match read_statement(&mut input) {
            Ok(Some(raw)) => raw,
            // End of input behaves like `exit;`
            Ok(None) => return exit(client),
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match parse_statement(&raw) {
            None => continue,
            Some(Statement::Exit) => return exit(client),
            Some(Statement::Query(text)) => match client.query(&text) {
                Ok(reply) => println!("{}", String::from_utf8_lossy(&reply)),
                Err(e) if e.is_stream_broken() => {
                    eprintln!("{}", e);
                    return 1;
                }
                Err(e) => eprintln!("{}", e),
            },
        }
    }
}

fn exit(client: Client) -> i32 {
    match client.exit() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}
