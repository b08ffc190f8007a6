use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputStyle {
    Plain,
    Rich,
}

fn current_output_style() -> OutputStyle {
    if io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

fn status_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Green.into()))
        .effects(Effects::BOLD)
}

fn error_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Red.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub fn print_status(status: &str, message: &str) {
    let label = format!("{status:>12}");
    match current_output_style() {
        OutputStyle::Plain => println!("{label} {message}"),
        OutputStyle::Rich => println!("{} {message}", colorize(status_style(), &label)),
    }
}

pub fn print_error(context: &str, message: &str) {
    let label = format!("{:>12}", "error");
    match current_output_style() {
        OutputStyle::Plain => eprintln!("{label} {context}: {message}"),
        OutputStyle::Rich => {
            eprintln!("{} {context}: {message}", colorize(error_style(), &label));
        }
    }
}

pub fn progress(total: u64, label: &str) -> ProgressBar {
    if current_output_style() == OutputStyle::Plain {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total.max(1));
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.cyan.bold} {msg:<12} [{bar:20.cyan/blue}] {pos:>3}/{len:3}")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.set_message(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Asks a yes/no question on stdout and reads the answer from stdin.
/// Anything but an explicit yes declines.
pub fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}
