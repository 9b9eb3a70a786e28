use std::{
    cell::RefCell,
    fmt,
    io::{BufRead, Write},
    rc::Rc,
};

use anyhow::{bail, Context};
use menu::{Menu, MenuId, MenuSelector, Selection};
use server_api::ServiceError;
use shared::{
    error::MessageArg,
    messages::{Locale, MessageCatalog},
};
use tracing::info;

/// Line-oriented terminal I/O plus the catalog used to render messages.
pub struct Console {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
    catalog: MessageCatalog,
    locale: Locale,
}

impl Console {
    pub fn new(
        input: Box<dyn BufRead>,
        output: Box<dyn Write>,
        catalog: MessageCatalog,
        locale: Locale,
    ) -> Self {
        Self {
            input,
            output,
            catalog,
            locale,
        }
    }

    pub fn say(&mut self, line: impl fmt::Display) -> anyhow::Result<()> {
        writeln!(self.output, "{line}").context("failed to write to console")
    }

    pub fn read_line(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read from console")?;
        if read == 0 {
            bail!("console input closed");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Prompts with the localized label for `label_key`.
    pub fn prompt(&mut self, label_key: &str) -> anyhow::Result<String> {
        let label = self.catalog.message(label_key, &[], self.locale);
        write!(self.output, "{label}: ").context("failed to write to console")?;
        self.output.flush().context("failed to flush console")?;
        self.read_line()
    }

    pub fn message(&self, key: &str, args: &[MessageArg]) -> String {
        self.catalog.message(key, args, self.locale)
    }

    /// Prints a rejection's messages; unexpected failures are handed back.
    pub fn show_failure<D>(&mut self, err: ServiceError<D>) -> anyhow::Result<()> {
        match err {
            ServiceError::Rejected(rejection) => {
                for message in self.catalog.localize(&rejection.errors, Locale::English) {
                    info!(code = ?rejection.code, %message, "request rejected");
                }
                for message in self.catalog.localize(&rejection.errors, self.locale) {
                    self.say(message)?;
                }
                Ok(())
            }
            ServiceError::Unexpected(err) => Err(err),
        }
    }
}

/// Numbered menu driven by console input: `1..n` enters a child, `0` goes
/// back, `q` exits.
pub struct ConsoleSelector {
    console: Rc<RefCell<Console>>,
}

impl ConsoleSelector {
    pub fn new(console: Rc<RefCell<Console>>) -> Self {
        Self { console }
    }

    fn print_menu(console: &mut Console, menu: &Menu, current: MenuId) -> anyhow::Result<()> {
        console.say("")?;
        console.say(format!("== {} ==", menu.description(current)))?;
        for (index, child) in menu.children(current).iter().enumerate() {
            console.say(format!("{}) {}", index + 1, menu.description(*child)))?;
        }
        if menu.parent(current).is_some() {
            console.say("0) Back")?;
        }
        console.say("q) Exit")
    }

    fn choose(&mut self, menu: &Menu, current: MenuId) -> anyhow::Result<Selection> {
        let mut console = self.console.borrow_mut();
        Self::print_menu(&mut console, menu, current)?;
        loop {
            let raw = console.read_line()?;
            match raw.trim() {
                "q" | "Q" => return Ok(Selection::Exit),
                "0" if menu.parent(current).is_some() => return Ok(Selection::Back),
                choice => {
                    let children = menu.children(current);
                    let picked = choice
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|index| children.get(index));
                    match picked {
                        Some(child) => return Ok(Selection::Enter(*child)),
                        None => console.say(format!("Invalid choice '{choice}'"))?,
                    }
                }
            }
        }
    }
}

impl MenuSelector for ConsoleSelector {
    fn select(&mut self, menu: &Menu, current: MenuId) -> Selection {
        self.choose(menu, current).unwrap_or_else(|err| {
            info!(error = %err, "leaving menu");
            Selection::Exit
        })
    }
}
