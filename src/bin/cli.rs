//! kvwire CLI Client
//!
//! Command-line interface for talking to a kvwire-compatible server.

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use kvwire::{Client, Config};
use tracing_subscriber::{fmt, EnvFilter};

/// kvwire CLI
#[derive(Parser, Debug)]
#[command(name = "kvwire-cli")]
#[command(about = "CLI for kvwire key-value servers")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "7379")]
    port: i32,

    /// Session identity (random when omitted)
    #[arg(long)]
    id: Option<String>,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "5000")]
    connect_timeout_ms: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single command and print the response
    Exec {
        /// Command name followed by its arguments
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },

    /// Open the watch stream, issue a command, then print every push
    Watch {
        /// Command name followed by its arguments
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,kvwire=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut builder = Config::builder().connect_timeout_ms(args.connect_timeout_ms);
    if let Some(id) = &args.id {
        builder = builder.session_id(id);
    }

    let client = match Client::connect(&args.host, args.port, builder.build()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    let code = match args.command {
        Some(Commands::Exec { words }) => exec(&client, &words.join(" ")),
        Some(Commands::Watch { words }) => watch(&client, &words.join(" ")),
        None => repl(&client),
    };

    client.close();
    std::process::exit(code);
}

/// Send one command line, print the response, map errors to exit code 1
fn exec(client: &Client, line: &str) -> i32 {
    let response = client.send_text(line);
    println!("{}", response);
    i32::from(response.is_error())
}

fn watch(client: &Client, line: &str) -> i32 {
    let queue = match client.watch() {
        Ok(queue) => queue,
        Err(e) => {
            tracing::error!("Failed to open watch stream: {}", e);
            return 1;
        }
    };

    if exec(client, line) != 0 {
        return 1;
    }

    loop {
        match queue.recv() {
            Ok(response) => println!("{}", response),
            Err(e) => {
                tracing::error!("{}", e);
                return 1;
            }
        }
    }
}

/// Read command lines from stdin until EOF or `quit`
fn repl(client: &Client) -> i32 {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}> ", client.endpoint());
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                return 1;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return 0;
        }

        println!("{}", client.send_text(line));
    }
}
