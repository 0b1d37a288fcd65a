//! The `vlmeval prompts` command: list the prompt catalogue.

use clap::Args;
use vlmeval_core::{PromptKind, PromptTemplate};

/// Arguments for the `prompts` command.
#[derive(Args, Debug)]
pub struct PromptsArgs {
    /// Print each template in full instead of a one-line preview
    #[arg(long)]
    pub full: bool,
}

pub async fn execute(args: PromptsArgs) -> anyhow::Result<()> {
    for kind in PromptKind::ALL {
        let template = PromptTemplate::named(kind);
        let marker = if kind == PromptKind::default() {
            " (default)"
        } else {
            ""
        };
        if args.full {
            println!("== {}{marker} ==\n{}\n", template.id, template.text);
        } else {
            println!("  {:<16}{}{marker}", template.id, template.preview(70));
        }
    }
    Ok(())
}
