//! Terminal output. Reports are markdown; with colour enabled they go
//! through termimad, otherwise they are printed as they are.

use anyhow::Result;
use termimad::{
    crossterm::style::{Attribute, Color, Stylize},
    MadSkin,
};

/// How a single line of report markdown is styled.
#[derive(Debug, PartialEq, Eq)]
enum LineKind {
    Header,
    Success,
    Error,
    Text,
}

fn classify(line: &str) -> LineKind {
    if line.starts_with('#') {
        LineKind::Header
    } else if line.starts_with("Success:") {
        LineKind::Success
    } else if line.starts_with("Error:") {
        LineKind::Error
    } else {
        LineKind::Text
    }
}

pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.inline_code.set_fg(Color::Cyan);

        Self { rich_enabled, skin }
    }

    pub fn render(&self, markdown: &str) -> Result<()> {
        if !self.rich_enabled {
            print!("{markdown}");
            return Ok(());
        }
        for line in markdown.lines() {
            match classify(line) {
                LineKind::Header => println!("{}", line.with(Color::Blue)),
                LineKind::Success => println!("{}", line.with(Color::Green)),
                LineKind::Error => println!("{}", line.with(Color::Red).attribute(Attribute::Bold)),
                LineKind::Text => {
                    self.skin.print_inline(line);
                    println!();
                }
            }
        }
        Ok(())
    }
}
