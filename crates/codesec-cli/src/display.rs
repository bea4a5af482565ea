use colored::Colorize;

/// Phase banner; GitHub's log viewer renders the ANSI styling.
pub fn banner(text: &str) {
    println!("{}", text.bold().cyan());
}

/// One-line outcome summary at the end of a phase.
pub fn outcome(text: &str) {
    println!("{}", text.green());
}
