use crossterm::style::{Attribute, Color, Stylize};
use itertools::Itertools;

/// Minimal helper for consistent CLI output.
pub fn step(message: impl AsRef<str>) {
    eprintln!("{} {}", "==>".bold().cyan(), message.as_ref());
}

/// Print a detail line associated with the latest step.
pub fn detail(message: impl AsRef<str>) {
    eprintln!("    {}", message.as_ref());
}

/// Report a failure that was discarded.
pub fn warning(message: impl AsRef<str>) {
    eprintln!("{} {}", "warning:".bold().yellow(), message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    eprintln!("{} {}", "error:".bold().red(), message.as_ref());
}

/// Insert a blank line to visually separate sections.
pub fn blank_line() {
    eprintln!();
}

/// Render a program and its arguments as a copy-pasteable shell line.
#[must_use]
pub fn format_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(AsRef::as_ref))
        .map(shell_words::quote)
        .join(" ")
}

/// Styled variant of [`format_command`] for terminal display.
#[must_use]
pub fn highlight_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let rest = args
        .iter()
        .map(|arg| shell_words::quote(arg.as_ref()))
        .join(" ");
    format!(
        "{} {}",
        shell_words::quote(program).into_owned().bold().green(),
        rest.with(Color::Yellow).attribute(Attribute::Dim)
    )
}
