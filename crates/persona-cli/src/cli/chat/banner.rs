//! Welcome banner display for chat sessions.

use console::style;

use persona_types::persona::Persona;

/// Print the welcome banner at the start of a chat session.
pub fn print_welcome_banner(persona: &Persona, model: &str, restored: usize) {
    println!();
    println!(
        "  {} {}",
        style("*").cyan(),
        style(&persona.name).cyan().bold()
    );
    if !persona.signature.is_empty() {
        println!("  {}", style(&persona.signature).dim());
    }
    println!();
    println!("  {}  {}", style("Model:").bold(), style(model).dim());
    println!("  {}  {}", style("Scope:").bold(), style(persona.scope).dim());
    if restored > 0 {
        println!(
            "  {}  {}",
            style("History:").bold(),
            style(format!("{restored} earlier messages")).dim()
        );
    }
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
