//! Interactive terminal prompt for unknown parts.

use console::{style, Term};
use tracing::warn;

use invaudit_core::error::DiscoveryError;
use invaudit_core::invoice::rules::parse_amount;
use invaudit_core::{Decision, DiscoveryChannel, DiscoveryContext};

/// Empty answers in a row before the prompt gives up.
const MAX_EMPTY_ANSWERS: usize = 3;

/// Whether unknown parts can be prompted for.
///
/// Without a terminal on stderr nobody can answer, so a requested prompt
/// falls back to skipping.
pub fn can_prompt(requested: bool) -> bool {
    if requested && !Term::stderr().is_term() {
        warn!("No terminal attached, unknown parts will be skipped");
        return false;
    }
    requested
}

/// Asks the user on the terminal what to do with each unknown part.
///
/// Prompts go to stderr so report output on stdout stays clean.
pub struct TerminalPrompt {
    term: Term,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    fn show(&self, ctx: &DiscoveryContext) -> std::io::Result<()> {
        self.term.write_line("")?;
        self.term.write_line(&format!(
            "{} Unknown part on {}",
            style("?").yellow().bold(),
            ctx.invoice.label()
        ))?;
        self.term
            .write_line(&format!("  Item code:   {}", style(&ctx.item_code).bold()))?;
        self.term
            .write_line(&format!("  Description: {}", ctx.description))?;
        self.term
            .write_line(&format!("  Charge type: {}", ctx.charge_type))?;
        self.term.write_line(&format!(
            "  Billed:      {} x {}",
            ctx.quantity, ctx.discovered_price
        ))?;
        self.term
            .write_line(&format!("  Key:         {}", style(&ctx.key).dim()))?;
        self.term.write_line(&format!(
            "  [{}]dd at billed price, add with other [{}]rice, [{}]kip, skip [{}]ll, [{}]uit",
            style("a").cyan(),
            style("p").cyan(),
            style("s").cyan(),
            style("A").cyan(),
            style("q").cyan()
        ))
    }

    fn ask(&self, question: &str) -> std::io::Result<String> {
        self.term.write_str(question)?;
        Ok(self.term.read_line()?.trim().to_string())
    }

    fn ask_price(&self) -> std::io::Result<Option<Decision>> {
        let input = self.ask("Authorized price: ")?;
        match parse_amount(&input) {
            Some(price) if !price.is_sign_negative() => Ok(Some(Decision::AddWithPrice(price))),
            Some(_) => {
                self.term
                    .write_line(&format!("{} Price cannot be negative", style("✗").red()))?;
                Ok(None)
            }
            None => {
                self.term
                    .write_line(&format!("{} Not a price: '{}'", style("✗").red(), input))?;
                Ok(None)
            }
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryChannel for TerminalPrompt {
    fn present(&mut self, ctx: &DiscoveryContext) -> Result<Decision, DiscoveryError> {
        let channel_error = |e: std::io::Error| DiscoveryError::Channel(e.to_string());

        self.show(ctx).map_err(channel_error)?;

        let mut empty_answers = 0;
        loop {
            let choice = self.ask("Choice [a/p/s/A/q]: ").map_err(channel_error)?;
            let decision = match choice.as_str() {
                // Closed stdin reads as an empty line
                "" => {
                    empty_answers += 1;
                    if empty_answers >= MAX_EMPTY_ANSWERS {
                        return Err(DiscoveryError::Channel(
                            "no answer from terminal".to_string(),
                        ));
                    }
                    None
                }
                "a" => Some(Decision::AddDiscoveredPrice),
                "p" => self.ask_price().map_err(channel_error)?,
                "s" => Some(Decision::Skip),
                "A" => Some(Decision::SkipAll),
                "q" => Some(Decision::Abort),
                other => {
                    self.term
                        .write_line(&format!("{} Unknown choice '{}'", style("✗").red(), other))
                        .map_err(channel_error)?;
                    None
                }
            };

            if let Some(decision) = decision {
                return Ok(decision);
            }
            if !choice.is_empty() {
                empty_answers = 0;
            }
        }
    }
}
