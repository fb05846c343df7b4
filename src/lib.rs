pub mod component;
pub mod config;
pub mod error;
pub mod init;
pub mod menu;
pub mod signal;
pub mod tools;

pub use error::{Result, SlicerError};

use console::{Term, style};

pub fn pause(term: &Term) -> anyhow::Result<()> {
    println!("\n{}", style("按 Enter 繼續...").dim());
    term.read_line()?;
    Ok(())
}
