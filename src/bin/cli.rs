//! FUQLdb CLI Client
//!
//! Command-line interface for interacting with FUQLdb.
//!
//! Opens a session, then sends either the command given on the command line
//! or every line read from stdin.

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

use clap::Parser;
use fuqldb::protocol::{read_response, write_frame, Response};
use fuqldb::session::SessionId;
use fuqldb::{FuqlError, Result};

/// FUQLdb CLI
#[derive(Parser, Debug)]
#[command(name = "fuqldb-cli")]
#[command(about = "CLI for the FUQLdb data store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8008")]
    server: String,

    /// Command to run, e.g. `tell database to present`; omit for a prompt
    command: Vec<String>,
}

/// One server connection with its session
struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    session: SessionId,
}

impl Client {
    fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let mut writer = stream.try_clone()?;
        let mut reader = BufReader::new(stream);

        write_frame(&mut writer, None, "")?;
        let response = read_response(&mut reader)?;
        let session = match (response.is_ok(), response.payload.as_deref()) {
            (true, Some(id)) => id.parse()?,
            _ => {
                return Err(FuqlError::Protocol(format!(
                    "could not open a session: {}",
                    response
                )))
            }
        };

        Ok(Self {
            reader,
            writer,
            session,
        })
    }

    fn send(&mut self, command: &str) -> Result<Response> {
        write_frame(&mut self.writer, Some(&self.session), command)?;
        read_response(&mut self.reader)
    }
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    if !args.command.is_empty() {
        let code = match client.send(&args.command.join(" ")) {
            Ok(response) => {
                println!("{}", response);
                if response.is_ok() { 0 } else { 2 }
            }
            Err(e) => {
                eprintln!("{}", e);
                1
            }
        };
        std::process::exit(code);
    }

    if let Err(e) = repl(&mut client) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn repl(client: &mut Client) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "fuql> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return Ok(());
        }
        println!("{}", client.send(line)?);
    }
}
