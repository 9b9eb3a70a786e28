use std::{
    cell::RefCell,
    io::{self, BufReader},
    rc::Rc,
};

use anyhow::Result;
use clap::Parser;
use server_api::ApiContext;
use shared::messages::{Locale, MessageCatalog};
use storage::Storage;
use tracing::info;

mod app;
mod console;

use app::{build_router, Session};
use console::{Console, ConsoleSelector};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/admin.db")]
    database_url: String,
    /// Message language (`en`, `es`).
    #[arg(long, default_value = "en")]
    language: Locale,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = Rc::new(
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?,
    );
    let storage = runtime.block_on(Storage::new(&cli.database_url))?;
    info!(database_url = %cli.database_url, "database opened");

    let console = Rc::new(RefCell::new(Console::new(
        Box::new(BufReader::new(io::stdin())),
        Box::new(io::stdout()),
        MessageCatalog::embedded()?,
        cli.language,
    )));
    let session = Session::new(runtime, ApiContext::new(storage), console.clone());
    let mut router = build_router(&session)?;
    router.run(&mut ConsoleSelector::new(console));
    Ok(())
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
