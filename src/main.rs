use clap::Parser;
use opencl_ls::diagnostics::DiagnosticsEngine;
use opencl_ls::logging::{LogConfig, init_logging};
use opencl_ls::opencl::{self, SystemClApi};
use opencl_ls::server::LspServer;
use serde_json::json;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// CLI arguments for the OpenCL language server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the available OpenCL devices as JSON and exit
    #[arg(long)]
    clinfo: bool,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log file path (overrides OCLS_LOG_FILE env var)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// Enumerate devices and print the report clients use to pick a deviceID
fn print_clinfo() -> ExitCode {
    match opencl::enumerate(&SystemClApi::new()) {
        Ok(devices) => {
            println!("{}", json!({ "devices": devices }));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Failed to enumerate OpenCL devices: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Pump stdin bytes through the server until `exit` or end of stream
fn serve(mut server: LspServer) -> ExitCode {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut buffer = [0u8; 4096];

    info!("OpenCL language server ready, reading from stdin");
    loop {
        let read = match input.read(&mut buffer) {
            Ok(0) => {
                info!("Input stream closed without an exit notification");
                return ExitCode::FAILURE;
            }
            Ok(read) => read,
            Err(err) => {
                error!("Failed to read from stdin: {}", err);
                return ExitCode::FAILURE;
            }
        };

        for &byte in &buffer[..read] {
            server.consume(byte);
            if server.is_ready() {
                server.reset();
                if let Some(code) = server.exit_code() {
                    return if code == 0 {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    };
                }
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_config = LogConfig::resolve(args.log_level, args.log_file);
    if let Err(err) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    if args.clinfo {
        return print_clinfo();
    }

    let mut engine = DiagnosticsEngine::new(Box::new(SystemClApi::new()));
    engine.select_device(0);

    let mut server = LspServer::new(engine);
    server.register_output(|bytes| {
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();
        if let Err(err) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
            error!("Failed to write to stdout: {}", err);
        }
    });

    serve(server)
}
